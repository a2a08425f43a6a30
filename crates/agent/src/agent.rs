//! Self-evaluating answer loop
//!
//! One pass per question: retrieve, generate, score, then at most one
//! extra retrieval round and at most one rewrite. The loop is the single
//! recovery boundary: every failure below it becomes an `AGENT_ERROR`
//! answer instead of an error.

use crate::evaluation::Evaluation;
use crate::generation::Generation;
use askforge_common::config::RetrievalConfig;
use askforge_common::errors::{AppError, Result};
use askforge_common::{join_context, metrics};
use askforge_search::Retriever;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Answer returned whenever the loop declines to answer
pub const ABSTAIN_ANSWER: &str = "I don't know.";

/// At or below this faithfulness the answer is suppressed
pub const FAITHFULNESS_FLOOR: u8 = 3;

/// At or below this relevance the context is widened
pub const RELEVANCE_FLOOR: u8 = 2;

/// At or below this clarity the answer is rewritten
pub const CLARITY_FLOOR: u8 = 2;

/// Remediation steps recorded for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    NoContext,
    Abstain,
    RetrieveMore,
    Rewrite,
    AnswerAccepted,
    AgentError,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoContext => "NO_CONTEXT",
            Action::Abstain => "ABSTAIN",
            Action::RetrieveMore => "RETRIEVE_MORE",
            Action::Rewrite => "REWRITE",
            Action::AnswerAccepted => "ANSWER_ACCEPTED",
            Action::AgentError => "AGENT_ERROR",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,
    pub evaluation: Option<Evaluation>,
    pub actions: Vec<Action>,
}

impl AgentAnswer {
    fn no_context() -> Self {
        Self {
            answer: ABSTAIN_ANSWER.to_string(),
            evaluation: None,
            actions: vec![Action::NoContext],
        }
    }

    /// Answer reported when the loop could not finish
    pub fn failed(err: &AppError) -> Self {
        Self {
            answer: format!("An internal error occurred: {}", err),
            evaluation: None,
            actions: vec![Action::AgentError],
        }
    }
}

/// The answer loop over injected retrieval and generation handles
pub struct AgentLoop {
    retriever: Arc<dyn Retriever>,
    generation: Arc<dyn Generation>,
    initial_k: usize,
    expanded_k: usize,
}

impl AgentLoop {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generation: Arc<dyn Generation>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            generation,
            initial_k: config.initial_k,
            expanded_k: config.expanded_k,
        }
    }

    /// Answer a question. Never fails: errors come back as `AGENT_ERROR`.
    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> AgentAnswer {
        let start = Instant::now();

        let result = match self.try_answer(question).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, code = ?e.code(), "Agent loop failed");
                AgentAnswer::failed(&e)
            }
        };

        let actions: Vec<&str> = result.actions.iter().map(Action::as_str).collect();
        metrics::record_agent_query(start.elapsed().as_secs_f64(), &actions);
        info!(
            actions = ?actions,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Agent query finished"
        );

        result
    }

    async fn try_answer(&self, question: &str) -> Result<AgentAnswer> {
        if question.trim().is_empty() {
            return Err(AppError::Validation {
                message: "question must not be empty".to_string(),
                field: Some("question".to_string()),
            });
        }

        let docs = self.retriever.retrieve(question, self.initial_k).await?;
        if docs.is_empty() {
            warn!("No context retrieved");
            return Ok(AgentAnswer::no_context());
        }

        let context = join_context(&docs);
        let mut answer = self.generation.generate(question, &context).await?;

        let raw = self.generation.score(question, &context, &answer).await?;
        let evaluation = Evaluation::parse(&raw)?;
        info!(
            relevance = evaluation.relevance,
            faithfulness = evaluation.faithfulness,
            clarity = evaluation.clarity,
            "Answer scored"
        );

        if evaluation.faithfulness <= FAITHFULNESS_FLOOR {
            warn!(faithfulness = evaluation.faithfulness, "Unfaithful answer, abstaining");
            return Ok(AgentAnswer {
                answer: ABSTAIN_ANSWER.to_string(),
                evaluation: Some(evaluation),
                actions: vec![Action::Abstain],
            });
        }

        let mut actions = Vec::new();

        if evaluation.relevance <= RELEVANCE_FLOOR {
            warn!(
                relevance = evaluation.relevance,
                k = self.expanded_k,
                "Low relevance, retrieving more context"
            );
            actions.push(Action::RetrieveMore);
            let docs = self.retriever.retrieve(question, self.expanded_k).await?;
            let context = join_context(&docs);
            answer = self.generation.generate(question, &context).await?;
        }

        if evaluation.clarity <= CLARITY_FLOOR {
            warn!(clarity = evaluation.clarity, "Low clarity, rewriting answer");
            actions.push(Action::Rewrite);
            answer = self.generation.rewrite(&answer).await?;
        }

        if actions.is_empty() {
            info!("Answer accepted");
            actions.push(Action::AnswerAccepted);
        }

        Ok(AgentAnswer {
            answer,
            evaluation: Some(evaluation),
            actions,
        })
    }
}
