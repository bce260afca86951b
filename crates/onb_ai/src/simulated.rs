use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use onb_core::domain::{CitationPosition, RawCitation};
use onb_core::error::AppError;
use onb_core::sources::{Source, SourceRegistry};

use crate::provider::{AnswerProvider, ProviderAnswer};

/// Offline stand-in for a model: answers every question with the same
/// canned, two-citation response built from the first ready sources.
pub struct SimulatedAnswerProvider {
    registry: Arc<dyn SourceRegistry>,
    delay: Option<Duration>,
}

impl SimulatedAnswerProvider {
    pub fn new(registry: Arc<dyn SourceRegistry>) -> Self {
        Self {
            registry,
            delay: None,
        }
    }

    /// Wait `delay` before answering, to exercise in-flight UI states.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

fn canned_citation(
    number: u32,
    source: Option<&Source>,
    fallback_title: &str,
    quote: &str,
    relevance_score: f64,
    position: CitationPosition,
) -> RawCitation {
    RawCitation {
        number,
        source_id: source
            .map(|s| s.id.clone())
            .unwrap_or_else(|| format!("source-{number}")),
        source_title: source
            .map(|s| s.title.clone())
            .unwrap_or_else(|| fallback_title.to_string()),
        page_number: None,
        quote: quote.to_string(),
        relevance_score,
        position: Some(position),
    }
}

#[async_trait]
impl AnswerProvider for SimulatedAnswerProvider {
    async fn ask(
        &self,
        _question: &str,
        ready_source_ids: &BTreeSet<String>,
    ) -> Result<ProviderAnswer, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let sources = self.registry.sources();
        let ready: Vec<&Source> = sources
            .iter()
            .filter(|s| ready_source_ids.contains(&s.id))
            .collect();

        let answer_text = format!(
            "Based on your {} sources, here's what I found: This is a simulated AI response with citations [1] [2]. \
             The information shows interesting patterns across your research materials.",
            ready.len()
        );

        let citations = vec![
            canned_citation(
                1,
                ready.first().copied(),
                "First Source",
                "This is a relevant quote from the first source that supports the AI response.",
                0.95,
                CitationPosition { start: 65, end: 78 },
            ),
            canned_citation(
                2,
                ready.get(1).copied(),
                "Second Source",
                "Another important quote that adds context to the discussion.",
                0.87,
                CitationPosition { start: 79, end: 82 },
            ),
        ];

        Ok(ProviderAnswer {
            answer_text,
            citations,
            processing_time: 1.2,
            confidence_score: 0.89,
        })
    }
}
