//! AskForge Agent server
//!
//! Wires configuration, the semantic index, the lexical snapshot and the
//! language model into one agent loop and serves it over HTTP.

use askforge_agent::{build_retriever, create_router, AgentLoop, AppState, PromptedGeneration};
use askforge_common::{
    config::AppConfig,
    db::DbPool,
    embeddings::create_embedder,
    llm::create_language_model,
    metrics::{self, AGENT_LATENCY_BUCKETS, METRICS_PREFIX},
};
use askforge_search::{InMemoryIndex, PgVectorIndex, SemanticIndex};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    config.validate()?;
    let config = Arc::new(config);

    // Initialize tracing
    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting AskForge agent v{}",
        askforge_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_agent_duration_seconds", METRICS_PREFIX)),
                AGENT_LATENCY_BUCKETS,
            )?
            .install()?;
        info!(%addr, "Prometheus exporter listening");
    }

    // Open the semantic index
    let embedder = create_embedder(&config.embedding)?;
    let collection = config.retrieval.collection.clone();
    let (index, db): (Arc<dyn SemanticIndex>, Option<Arc<DbPool>>) =
        match config.database.url.as_deref() {
            Some(_) => {
                info!("Connecting to database...");
                let db = Arc::new(DbPool::new(&config.database).await?);
                let index = PgVectorIndex::new(db.clone(), embedder, collection);
                index.ensure_schema().await?;
                let index: Arc<dyn SemanticIndex> = Arc::new(index);
                (index, Some(db))
            }
            None => {
                warn!("database.url not set, using an in-memory index");
                let index: Arc<dyn SemanticIndex> = Arc::new(InMemoryIndex::new(collection, embedder));
                (index, None)
            }
        };

    // Load configured chunks, snapshot the corpus for lexical ranking
    let retriever = Arc::new(build_retriever(index, &config.retrieval).await?);
    if retriever.corpus_size() == 0 {
        warn!(
            collection = retriever.collection(),
            "Collection is empty, every question will get NO_CONTEXT"
        );
    }

    let model = create_language_model(&config.llm)?;
    info!(model = model.model_name(), "Language model ready");
    let generation = Arc::new(PromptedGeneration::new(model, &config.llm));
    let agent = Arc::new(AgentLoop::new(
        retriever.clone(),
        generation,
        &config.retrieval,
    ));

    let state = AppState {
        config: config.clone(),
        agent,
        retriever,
        db,
    };
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
