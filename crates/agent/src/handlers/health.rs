//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub collection: String,
    pub chunk_count: usize,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness check: healthy whenever the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: askforge_common::VERSION.to_string(),
    })
}

/// Readiness check: database reachability and the loaded corpus
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let database = match &state.db {
        None => CheckResult {
            status: "in_memory".to_string(),
            latency_ms: None,
            error: None,
        },
        Some(db) => {
            let start = std::time::Instant::now();
            match db.ping().await {
                Ok(()) => CheckResult {
                    status: "up".to_string(),
                    latency_ms: Some(start.elapsed().as_millis() as u64),
                    error: None,
                },
                Err(e) => CheckResult {
                    status: "down".to_string(),
                    latency_ms: None,
                    error: Some(e.to_string()),
                },
            }
        }
    };

    let all_healthy = database.status != "down";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        collection: state.retriever.collection().to_string(),
        chunk_count: state.retriever.corpus_size(),
        checks: HealthChecks { database },
    })
}
