use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque message identifier, assigned by the transcript store at append time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub(crate) fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Character offsets into the *source* content a citation was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationPosition {
    pub start: usize,
    pub end: usize,
}

/// Grounding reference attached to one assistant message.
///
/// Invariants (enforced by the transcript store on append):
/// - `number >= 1` and unique within the owning message in practice; when a
///   number repeats, the first occurrence in list order wins everywhere.
/// - `relevance_score` is finite and within `[0, 1]`.
/// - `number` appears as a `[n]` marker in the owning message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub number: u32,
    pub source_id: String,
    pub source_title: String,
    pub page_number: Option<u32>,
    pub quote: String,
    pub relevance_score: f64,
    pub position: Option<CitationPosition>,
}

/// Citation exactly as an answer provider returned it. Nothing about it has
/// been checked yet; see `validate::normalize_citations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCitation {
    pub number: u32,
    pub source_id: String,
    pub source_title: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    pub quote: String,
    pub relevance_score: f64,
    #[serde(default)]
    pub position: Option<CitationPosition>,
}

impl From<RawCitation> for Citation {
    fn from(raw: RawCitation) -> Self {
        Self {
            number: raw.number,
            source_id: raw.source_id,
            source_title: raw.source_title,
            page_number: raw.page_number,
            quote: raw.quote,
            relevance_score: raw.relevance_score,
            position: raw.position,
        }
    }
}

/// One turn in the transcript. Created once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub citations: Vec<Citation>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub processing_time: Option<f64>,
    pub confidence_score: Option<f64>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// A message that has not been appended yet; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub citations: Vec<Citation>,
    pub processing_time: Option<f64>,
    pub confidence_score: Option<f64>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
            processing_time: None,
            confidence_score: None,
        }
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations,
            processing_time: None,
            confidence_score: None,
        }
    }

    pub fn with_metrics(mut self, processing_time: Option<f64>, confidence_score: Option<f64>) -> Self {
        self.processing_time = processing_time;
        self.confidence_score = confidence_score;
        self
    }
}

/// Non-fatal data problem found while cleaning provider output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
