//! `codeqa` CLI: index a code corpus, serve the HTTP gateway, or ask one question.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use codeqa_core::AppBuilder;
use codeqa_core::bootstrap::resolve_config_path;
use codeqa_gateway::GatewayServer;
use codeqa_rag::{Answer, IndexReport, RequestScope};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "codeqa", version)]
#[command(about = "Retrieval-augmented assistant for questions about code")]
struct Cli {
    /// Config file (defaults to $CODEQA_CONFIG, then config/default.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed corpus items and upsert them into the vector index
    Index {
        /// JSON Lines corpus (overrides indexer.corpus_path)
        #[arg(long, value_name = "PATH")]
        corpus: Option<PathBuf>,

        /// Maximum number of items to index (0 indexes everything)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run the HTTP gateway
    Serve,
    /// Answer a single question and exit
    Ask {
        query: String,

        /// Also print the retrieved snippets with their scores
        #[arg(long)]
        show_context: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let app = AppBuilder::from_path(&config_path)
        .await
        .with_context(|| format!("failed to initialise from {}", config_path.display()))?;

    match cli.command {
        Command::Index { corpus, limit } => run_index(&app, corpus, limit).await,
        Command::Serve => run_serve(&app).await,
        Command::Ask {
            query,
            show_context,
        } => run_ask(&app, &query, show_context).await,
    }
}

async fn run_index(
    app: &AppBuilder,
    corpus: Option<PathBuf>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let indexer = app.build_indexer();
    let source = app.build_corpus(corpus.as_deref());
    let limit = limit.or(app.config().indexer.limit).filter(|&n| n > 0);

    let scope = RequestScope::new();
    cancel_on_ctrl_c(&scope);

    tracing::info!(corpus = %source.path().display(), "indexing corpus");
    let report = indexer.load_and_index(&scope, &source, limit).await?;
    print_report(&report);

    if scope.is_cancelled() {
        bail!("indexing interrupted");
    }
    if report.indexed == 0 && !report.failures.is_empty() {
        bail!("no items were indexed");
    }
    Ok(())
}

async fn run_serve(app: &AppBuilder) -> anyhow::Result<()> {
    app.ensure_index(&RequestScope::new()).await?;

    let gw = &app.config().gateway;
    let token = app
        .config()
        .secrets
        .gateway_token
        .as_ref()
        .map(|s| s.expose().to_owned());
    if token.is_none() {
        tracing::warn!("CODEQA_GATEWAY_TOKEN not set, /query accepts unauthenticated requests");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(
        &gw.bind,
        gw.port,
        Arc::new(app.build_assistant()),
        shutdown_rx,
    )
    .with_auth(token)
    .with_max_body_size(gw.max_body_size)
    .with_request_timeout(app.request_timeout())
    .serve()
    .await?;
    Ok(())
}

async fn run_ask(app: &AppBuilder, query: &str, show_context: bool) -> anyhow::Result<()> {
    let assistant = app.build_assistant();
    let scope = app.request_scope();
    cancel_on_ctrl_c(&scope);
    app.ensure_index(&scope).await?;

    if show_context {
        let answer = assistant.answer_with_context(&scope, query).await?;
        print_context(&answer);
        println!("{}", answer.response);
    } else {
        println!("{}", assistant.answer(&scope, query).await?);
    }
    Ok(())
}

fn cancel_on_ctrl_c(scope: &RequestScope) {
    let token = scope.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling in-flight calls");
            token.cancel();
        }
    });
}

fn print_report(report: &IndexReport) {
    println!(
        "indexed {}/{} items in {} ms",
        report.indexed, report.items_seen, report.duration_ms
    );
    for failure in &report.failures {
        println!(
            "  #{} {}: {}",
            failure.position,
            failure.id.as_deref().unwrap_or("-"),
            failure.error
        );
    }
}

fn print_context(answer: &Answer) {
    for hit in &answer.context {
        let label = hit
            .metadata
            .get("func_name")
            .or_else(|| hit.metadata.get("path"))
            .map_or("", String::as_str);
        println!("[{:.3}] {} {label}", hit.score, short_id(&hit.id));
    }
    println!();
}

fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
