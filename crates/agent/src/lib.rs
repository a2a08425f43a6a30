//! AskForge Agent
//!
//! Answers questions over a fixed document collection:
//! - Hybrid retrieval of supporting chunks
//! - Answer synthesis, self-evaluation and one-shot repair
//! - HTTP surface exposing the loop

pub mod agent;
pub mod evaluation;
pub mod generation;
pub mod handlers;
pub mod prompts;
pub mod startup;

pub use agent::{Action, AgentAnswer, AgentLoop};
pub use evaluation::Evaluation;
pub use generation::{Generation, PromptedGeneration};
pub use startup::build_retriever;

use askforge_common::{config::AppConfig, db::DbPool};
use askforge_search::HybridRetriever;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<AgentLoop>,
    pub retriever: Arc<HybridRetriever>,
    /// Present only when the semantic index lives in Postgres
    pub db: Option<Arc<DbPool>>,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new().route("/ask", post(handlers::ask::ask));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}
