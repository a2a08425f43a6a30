//! Prompted generation: answer, score and rewrite
//!
//! Each call is one stateless completion against the configured language
//! model. Failures surface as `AppError::Generation` and are never retried.

use crate::prompts;
use askforge_common::config::LlmConfig;
use askforge_common::errors::{AppError, Result};
use askforge_common::llm::{CompletionRequest, LanguageModel};
use askforge_common::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The three language-model calls the agent makes
#[async_trait]
pub trait Generation: Send + Sync {
    /// Answer `question` from `context`
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// Score `answer`, returning the evaluator's raw reply
    async fn score(&self, question: &str, context: &str, answer: &str) -> Result<String>;

    /// Rewrite `answer` for clarity
    async fn rewrite(&self, answer: &str) -> Result<String>;
}

/// Generation over a single language model with per-call token budgets
pub struct PromptedGeneration {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    answer_max_tokens: u32,
    evaluation_max_tokens: u32,
    rewrite_max_tokens: u32,
}

impl PromptedGeneration {
    pub fn new(model: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self {
            model,
            temperature: config.temperature,
            answer_max_tokens: config.answer_max_tokens,
            evaluation_max_tokens: config.evaluation_max_tokens,
            rewrite_max_tokens: config.rewrite_max_tokens,
        }
    }

    async fn call(&self, name: &'static str, prompt: String, max_tokens: u32) -> Result<String> {
        let request = CompletionRequest::new(prompt, max_tokens).with_temperature(self.temperature);
        let start = Instant::now();

        let result = self.model.complete(&request).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), name, result.is_ok());

        match result {
            Ok(text) => {
                debug!(
                    call = name,
                    model = self.model.model_name(),
                    chars = text.len(),
                    "Completion finished"
                );
                Ok(text)
            }
            Err(AppError::Generation { message }) => Err(AppError::Generation {
                message: format!("{} call failed: {}", name, message),
            }),
            Err(other) => Err(AppError::generation(format!("{} call failed: {}", name, other))),
        }
    }
}

#[async_trait]
impl Generation for PromptedGeneration {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.call(
            "answer",
            prompts::answer_prompt(question, context),
            self.answer_max_tokens,
        )
        .await
    }

    async fn score(&self, question: &str, context: &str, answer: &str) -> Result<String> {
        self.call(
            "evaluate",
            prompts::evaluation_prompt(question, context, answer),
            self.evaluation_max_tokens,
        )
        .await
    }

    async fn rewrite(&self, answer: &str) -> Result<String> {
        self.call(
            "rewrite",
            prompts::rewrite_prompt(answer),
            self.rewrite_max_tokens,
        )
        .await
    }
}
