use std::collections::BTreeSet;

use async_trait::async_trait;
use onb_core::domain::RawCitation;
use onb_core::error::AppError;
use serde::{Deserialize, Serialize};

/// What an answer provider hands back for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnswer {
    pub answer_text: String,
    pub citations: Vec<RawCitation>,
    /// Seconds spent producing the answer.
    pub processing_time: f64,
    pub confidence_score: f64,
}

/// Produces a grounded answer for a question. Latency is unspecified; the
/// coordinator never assumes a fixed delay.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn ask(
        &self,
        question: &str,
        ready_source_ids: &BTreeSet<String>,
    ) -> Result<ProviderAnswer, AppError>;
}
