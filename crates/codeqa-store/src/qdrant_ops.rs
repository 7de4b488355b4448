//! Qdrant-backed [`VectorStore`].

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, value::Kind, vectors_config,
};

use crate::vector_store::{
    Metric, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, rank_scored,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Payload field holding the caller's id; Qdrant itself only accepts UUID or integer ids.
pub const KEY_FIELD: &str = "_key";

const ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6c, 0x1f, 0x3b, 0x52, 0x8e, 0x0a, 0x4d, 0x27, 0x9b, 0x43, 0x15, 0xe2, 0x7a, 0xc8, 0x90, 0x04,
]);

/// Deterministic Qdrant point id for an arbitrary string key.
#[must_use]
pub fn point_id_for(key: &str) -> String {
    uuid::Uuid::new_v5(&ID_NAMESPACE, key.as_bytes()).to_string()
}

/// Thin wrapper over [`Qdrant`] client encapsulating common collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, api_key: Option<String>) -> QdrantResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Vector size and raw distance of a single-vector collection, `None` if
    /// the collection uses named vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn vector_params(&self, collection: &str) -> QdrantResult<Option<(u64, i32)>> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(Box::new)?;
        let params = info
            .result
            .and_then(|i| i.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        Ok(match params {
            Some(vectors_config::Config::Params(p)) => Some((p.size, p.distance)),
            _ => None,
        })
    }

    /// Create a collection with the given size and distance.
    ///
    /// # Errors
    ///
    /// Returns an error if collection creation fails.
    pub async fn create_collection(
        &self,
        collection: &str,
        vector_size: u64,
        metric: Metric,
    ) -> QdrantResult<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, distance_of(metric))),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Upsert points into a collection, waiting for the write to be applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<PointStruct>,
    ) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Search for similar vectors, returning scored points with payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search_points(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    /// Exact number of points in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count_points(&self, collection: &str) -> QdrantResult<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Box::new)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// Convert a JSON value to a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if deserialization fails.
    pub fn json_to_payload(
        value: serde_json::Value,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn distance_of(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::Dot => Distance::Dot,
        Metric::Euclid => Distance::Euclid,
    }
}

fn connection_err(e: &qdrant_client::QdrantError) -> VectorStoreError {
    VectorStoreError::Connection(e.to_string())
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
        metric: Metric,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), VectorStoreError>> + Send + '_>,
    > {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| connection_err(&e))?;

            if !exists {
                tracing::info!(%collection, vector_size, %metric, "creating Qdrant collection");
                return self
                    .create_collection(&collection, vector_size, metric)
                    .await
                    .map_err(|e| VectorStoreError::Collection(e.to_string()));
            }

            let params = self
                .vector_params(&collection)
                .await
                .map_err(|e| connection_err(&e))?;
            match params {
                Some((size, distance))
                    if size == vector_size && distance == distance_of(metric) as i32 =>
                {
                    Ok(())
                }
                Some((size, distance)) => Err(VectorStoreError::Mismatch {
                    detail: format!(
                        "has size {size} / distance {distance}, requested {vector_size} / {metric}"
                    ),
                    collection,
                }),
                None => Err(VectorStoreError::Mismatch {
                    detail: "uses named vectors".into(),
                    collection,
                }),
            }
        })
    }

    fn collection_exists(
        &self,
        collection: &str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<bool, VectorStoreError>> + Send + '_>,
    > {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| connection_err(&e))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), VectorStoreError>> + Send + '_>,
    > {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(vector_point_to_qdrant)
                .collect::<Result<Vec<_>, _>>()?;
            self.upsert_points(&collection, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<ScoredVectorPoint>, VectorStoreError>>
                + Send
                + '_,
        >,
    > {
        let collection = collection.to_owned();
        Box::pin(async move {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let results = self
                .search_points(&collection, vector, limit.saturating_add(1))
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(rank_hits(results, limit))
        })
    }

    fn count(
        &self,
        collection: &str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<u64, VectorStoreError>> + Send + '_>,
    > {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.count_points(&collection)
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))
        })
    }
}

fn vector_point_to_qdrant(p: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let mut payload: serde_json::Map<String, serde_json::Value> = p.payload.into_iter().collect();
    payload.insert(KEY_FIELD.into(), serde_json::Value::String(p.id.clone()));
    let payload = QdrantOps::json_to_payload(serde_json::Value::Object(payload))
        .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(point_id_for(&p.id), p.vector, payload))
}

/// Hits are fetched one past `limit` so a tie at the cut is settled by id
/// rather than by server order.
fn rank_hits(points: Vec<ScoredPoint>, limit: u64) -> Vec<ScoredVectorPoint> {
    let mut scored: Vec<_> = points.into_iter().map(scored_point_to_vector).collect();
    rank_scored(&mut scored, usize::try_from(limit).unwrap_or(usize::MAX));
    scored
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let mut payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match payload.remove(KEY_FIELD) {
        Some(serde_json::Value::String(key)) => key,
        _ => match point.id.and_then(|pid| pid.point_id_options) {
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        },
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::PointId;

    use super::*;

    #[test]
    fn new_valid_url() {
        let ops = QdrantOps::new("http://localhost:6334", None);
        assert!(ops.is_ok());
    }

    #[test]
    fn new_with_api_key() {
        let ops = QdrantOps::new("http://localhost:6334", Some("secret".into()));
        assert!(ops.is_ok());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334", None).unwrap();
        let dbg = format!("{ops:?}");
        assert!(dbg.contains("QdrantOps"));
    }

    #[test]
    fn point_id_is_deterministic_uuid() {
        let a = point_id_for("abc");
        let b = point_id_for("abc");
        let c = point_id_for("abd");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn vector_point_conversion_stores_key() {
        let point = VectorPoint {
            id: "snippet-1".into(),
            vector: vec![0.1, 0.2],
            payload: HashMap::from([("code".into(), serde_json::json!("def foo(): pass"))]),
        };
        let converted = vector_point_to_qdrant(point).unwrap();
        assert_eq!(
            converted.payload.get(KEY_FIELD).and_then(|v| v.as_str()),
            Some(&"snippet-1".to_string())
        );
        assert!(converted.payload.contains_key("code"));
    }

    #[test]
    fn scored_point_recovers_key() {
        let payload = QdrantOps::json_to_payload(serde_json::json!({
            "_key": "snippet-1",
            "code": "def foo(): pass",
            "line": 3,
        }))
        .unwrap();
        let point = ScoredPoint {
            id: Some(PointId::from(point_id_for("snippet-1"))),
            payload,
            score: 0.75,
            ..Default::default()
        };
        let converted = scored_point_to_vector(point);
        assert_eq!(converted.id, "snippet-1");
        assert!(!converted.payload.contains_key(KEY_FIELD));
        assert_eq!(converted.payload["code"], "def foo(): pass");
        assert_eq!(converted.payload["line"], 3);
    }

    #[test]
    fn tie_at_limit_keeps_smaller_id() {
        let hit = |key: &str, score: f32| ScoredPoint {
            id: Some(PointId::from(point_id_for(key))),
            payload: QdrantOps::json_to_payload(serde_json::json!({ "_key": key })).unwrap(),
            score,
            ..Default::default()
        };
        // Server order puts "b" inside the cut and "a" one past it.
        let ranked = rank_hits(vec![hit("top", 0.9), hit("b", 0.5), hit("a", 0.5)], 2);
        let ids: Vec<_> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["top", "a"]);
    }

    #[test]
    fn json_to_payload_empty() {
        let result = QdrantOps::json_to_payload(serde_json::json!({}));
        assert!(result.unwrap().is_empty());
    }
}
