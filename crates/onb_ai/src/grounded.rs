use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use onb_core::config::OllamaConfig;
use onb_core::domain::{CitationPosition, RawCitation};
use onb_core::error::AppError;

use crate::evidence::{select_excerpts, Excerpt, SourceLibrary};
use crate::guardrails::{cited_excerpt_numbers, enforce_answer_text};
use crate::llm::Llm;
use crate::prompts;
use crate::provider::{AnswerProvider, ProviderAnswer};

const QUOTE_MAX_CHARS: usize = 280;

/// Answers from the text of ready sources using a blocking [`Llm`].
///
/// Ready sources are split into numbered excerpts; the model answers with
/// `[n]` markers and each cited excerpt becomes a citation. Markers the model
/// invents are left in the text (they render unresolved).
pub struct GroundedAnswerProvider<L> {
    llm: Arc<L>,
    library: Arc<SourceLibrary>,
    model: String,
    max_excerpt_chars: usize,
    max_excerpts: usize,
}

impl<L: Llm + 'static> GroundedAnswerProvider<L> {
    pub fn new(llm: L, library: Arc<SourceLibrary>, config: &OllamaConfig) -> Self {
        Self {
            llm: Arc::new(llm),
            library,
            model: config.model.clone(),
            max_excerpt_chars: config.max_excerpt_chars,
            max_excerpts: config.max_excerpts,
        }
    }
}

fn quote_of(text: &str) -> String {
    let t = text.trim();
    if t.chars().count() <= QUOTE_MAX_CHARS {
        return t.to_string();
    }
    let mut s: String = t.chars().take(QUOTE_MAX_CHARS).collect();
    s.push_str("...");
    s
}

fn citation_for(excerpt: &Excerpt) -> RawCitation {
    RawCitation {
        number: excerpt.number,
        source_id: excerpt.source_id.clone(),
        source_title: excerpt.source_title.clone(),
        page_number: None,
        quote: quote_of(&excerpt.text),
        relevance_score: excerpt.score,
        position: Some(CitationPosition {
            start: excerpt.start,
            end: excerpt.end,
        }),
    }
}

#[async_trait]
impl<L: Llm + 'static> AnswerProvider for GroundedAnswerProvider<L> {
    async fn ask(
        &self,
        question: &str,
        ready_source_ids: &BTreeSet<String>,
    ) -> Result<ProviderAnswer, AppError> {
        let started = Instant::now();

        let docs = self.library.documents(ready_source_ids);
        let excerpts = select_excerpts(&docs, question, self.max_excerpt_chars, self.max_excerpts);
        let prompt = prompts::answer_prompt(question, &prompts::excerpt_blocks(&excerpts));
        tracing::debug!(
            documents = docs.len(),
            excerpts = excerpts.len(),
            model = %self.model,
            "asking model"
        );

        let llm = Arc::clone(&self.llm);
        let model = self.model.clone();
        let output = tokio::task::spawn_blocking(move || llm.generate(&model, &prompt))
            .await
            .map_err(|e| {
                AppError::new("AI_ANSWER_FAILED", "Answer task did not complete")
                    .with_details(e.to_string())
            })??;
        enforce_answer_text(&output)?;

        let citations: Vec<RawCitation> = cited_excerpt_numbers(&output, excerpts.len())
            .into_iter()
            .map(|n| citation_for(&excerpts[(n - 1) as usize]))
            .collect();
        if citations.is_empty() && !excerpts.is_empty() {
            tracing::warn!("model answer cites no excerpts");
        }

        let confidence_score = if citations.is_empty() {
            0.0
        } else {
            citations.iter().map(|c| c.relevance_score).sum::<f64>() / citations.len() as f64
        };
        let processing_time = (started.elapsed().as_secs_f64() * 10.0).round() / 10.0;

        Ok(ProviderAnswer {
            answer_text: output,
            citations,
            processing_time,
            confidence_score,
        })
    }
}
