//! Question answering handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::agent::{Action, AgentAnswer};
use crate::evaluation::Evaluation;
use crate::AppState;
use askforge_common::{
    errors::{AppError, Result},
    metrics::RequestMetrics,
};

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

/// Ask response
#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub evaluation: Option<Evaluation>,
    pub actions: Vec<Action>,
}

/// Run one question through the agent loop
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let metrics = RequestMetrics::start("POST", "/v1/ask");

    if let Err(e) = request.validate() {
        metrics.finish(400);
        return Err(AppError::Validation {
            message: e.to_string(),
            field: Some("question".to_string()),
        });
    }

    let deadline = state.config.request_timeout();
    let result = match tokio::time::timeout(deadline, state.agent.answer(&request.question)).await {
        Ok(result) => result,
        Err(_) => {
            let err = AppError::Internal {
                message: format!("question timed out after {}s", deadline.as_secs()),
            };
            tracing::error!(error = %err, "Agent loop exceeded request timeout");
            AgentAnswer::failed(&err)
        }
    };
    metrics.finish(200);

    Ok(Json(AskResponse {
        question: request.question,
        answer: result.answer,
        evaluation: result.evaluation,
        actions: result.actions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_router, AgentLoop, Generation, PromptedGeneration};
    use askforge_common::config::AppConfig;
    use askforge_common::embeddings::MockEmbedder;
    use askforge_common::llm::EchoModel;
    use askforge_common::Chunk;
    use askforge_search::{HybridRetriever, InMemoryIndex, SemanticIndex};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use async_trait::async_trait;
    use axum::Router;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app(texts: &[&str]) -> Router {
        let config = AppConfig::default();
        let generation = Arc::new(PromptedGeneration::new(
            Arc::new(EchoModel::default()),
            &config.llm,
        ));
        app_with(config, generation, texts).await
    }

    async fn app_with(config: AppConfig, generation: Arc<dyn Generation>, texts: &[&str]) -> Router {
        let config = Arc::new(config);
        let index = Arc::new(InMemoryIndex::new(
            config.retrieval.collection.clone(),
            Arc::new(MockEmbedder::new(128)),
        ));
        let chunks: Vec<Chunk> = texts.iter().map(|t| Chunk::new(*t, "guide.pdf")).collect();
        index.insert(&chunks).await.unwrap();

        let retriever = Arc::new(HybridRetriever::from_index(index).await.unwrap());
        let agent = Arc::new(AgentLoop::new(
            retriever.clone(),
            generation,
            &config.retrieval,
        ));

        create_router(AppState {
            config,
            agent,
            retriever,
            db: None,
        })
    }

    fn ask_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ask_accepts_grounded_answer() {
        let app = app(&["The license server listens on port 27000."]).await;
        let response = app
            .oneshot(ask_request(serde_json::json!({"question": "Which port does the license server use?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: AskResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.answer, "The license server listens on port 27000.");
        assert_eq!(body.actions, vec![Action::AnswerAccepted]);
        assert_eq!(body.evaluation.map(|e| e.faithfulness), Some(5));
    }

    #[tokio::test]
    async fn test_ask_without_corpus_reports_no_context() {
        let response = app(&[])
            .await
            .oneshot(ask_request(serde_json::json!({"question": "Anything?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "I don't know.");
        assert_eq!(body["evaluation"], serde_json::Value::Null);
        assert_eq!(body["actions"], serde_json::json!(["NO_CONTEXT"]));
    }

    #[tokio::test]
    async fn test_ask_rejects_invalid_questions() {
        for question in [String::new(), "x".repeat(2001)] {
            let response = app(&["some text"])
                .await
                .oneshot(ask_request(serde_json::json!({ "question": question })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    /// Generation that answers only after a delay
    struct SlowGeneration {
        delay: Duration,
    }

    #[async_trait]
    impl Generation for SlowGeneration {
        async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok("late answer".to_string())
        }

        async fn score(&self, _question: &str, _context: &str, _answer: &str) -> Result<String> {
            Ok(r#"{"relevance": 5, "faithfulness": 5, "clarity": 5}"#.to_string())
        }

        async fn rewrite(&self, answer: &str) -> Result<String> {
            Ok(answer.to_string())
        }
    }

    #[tokio::test]
    async fn test_slow_agent_becomes_agent_error() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;
        let generation = Arc::new(SlowGeneration {
            delay: Duration::from_millis(1500),
        });

        let response = app_with(config, generation, &["The license server listens on port 27000."])
            .await
            .oneshot(ask_request(serde_json::json!({"question": "Which port?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: AskResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.actions, vec![Action::AgentError]);
        assert_eq!(body.evaluation, None);
        assert!(body.answer.starts_with("An internal error occurred: "));
        assert!(body.answer.contains("timed out"));
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app(&["first", "second"]).await;

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["collection"], "askforge");
        assert_eq!(body["chunk_count"], 2);
        assert_eq!(body["checks"]["database"]["status"], "in_memory");
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let response = app(&["text"])
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
