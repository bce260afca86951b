use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::citations::ParsedSegment;
use crate::domain::{Citation, Message, MessageId};
use crate::error::AppError;
use crate::transcript::TranscriptStore;

/// Lazily built `(message, number) -> citation` lookup for on-demand previews.
///
/// A message's table is built on its first lookup and never changes after
/// that, since messages are immutable once appended. Call [`invalidate`]
/// whenever the backing transcript is cleared.
///
/// [`invalidate`]: CitationPreviewIndex::invalidate
#[derive(Debug, Default)]
pub struct CitationPreviewIndex {
    by_message: HashMap<MessageId, HashMap<u32, Citation>>,
}

impl CitationPreviewIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(
        &mut self,
        store: &TranscriptStore,
        message_id: &MessageId,
        number: u32,
    ) -> Result<&Citation, AppError> {
        if !self.by_message.contains_key(message_id) {
            let message = store.get(message_id).ok_or_else(|| {
                AppError::new("PREVIEW_MESSAGE_NOT_FOUND", "Message not found in transcript")
                    .with_details(format!("message_id={message_id}"))
            })?;
            self.by_message
                .insert(message_id.clone(), build_table(message));
        }

        self.by_message
            .get(message_id)
            .and_then(|table| table.get(&number))
            .ok_or_else(|| {
                AppError::new("PREVIEW_CITATION_NOT_FOUND", "Citation not found for message")
                    .with_details(format!("message_id={message_id}; number={number}"))
            })
    }

    pub fn invalidate(&mut self) {
        self.by_message.clear();
    }

    pub fn indexed_messages(&self) -> usize {
        self.by_message.len()
    }
}

// First citation wins on duplicate numbers, same as the resolver.
fn build_table(message: &Message) -> HashMap<u32, Citation> {
    let mut table = HashMap::with_capacity(message.citations.len());
    for c in message.citations.iter() {
        table.entry(c.number).or_insert_with(|| c.clone());
    }
    table
}

/// Display data for a citation preview card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationPreview {
    pub number: u32,
    pub source_id: String,
    pub source_title: String,
    pub page_number: Option<u32>,
    pub quote: String,
    pub relevance_score: f64,
    pub relevance_pct: u8,
    pub label: String,
}

impl CitationPreview {
    pub fn from_citation(citation: &Citation) -> Self {
        Self {
            number: citation.number,
            source_id: citation.source_id.clone(),
            source_title: citation.source_title.clone(),
            page_number: citation.page_number,
            quote: citation.quote.clone(),
            relevance_score: citation.relevance_score,
            relevance_pct: percent(citation.relevance_score),
            label: citation_label(citation.number, Some(citation)),
        }
    }
}

/// Accessible label for a citation chip.
pub fn citation_label(number: u32, citation: Option<&Citation>) -> String {
    match citation {
        Some(c) => format!("Citation {number}: {}", c.source_title),
        None => format!("Citation {number}: Source not found"),
    }
}

pub fn segment_label(segment: &ParsedSegment) -> Option<String> {
    match segment {
        ParsedSegment::Text { .. } => None,
        ParsedSegment::ResolvedCitation { number, citation } => {
            Some(citation_label(*number, Some(citation)))
        }
        ParsedSegment::UnresolvedCitation { number } => Some(citation_label(*number, None)),
    }
}

/// "1.2s • 89% confidence" under an answer; `None` without a processing time.
pub fn answer_footer(message: &Message) -> Option<String> {
    let processing_time = message.processing_time?;
    let confidence = percent(message.confidence_score.unwrap_or(0.0));
    Some(format!("{processing_time}s • {confidence}% confidence"))
}

fn percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}
