use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Url,
    Youtube,
    Audio,
    Document,
    Text,
}

impl SourceType {
    /// Plural noun used in chat copy ("PDFs, websites").
    pub fn plural_noun(&self) -> &'static str {
        match self {
            SourceType::Pdf => "PDFs",
            SourceType::Url => "websites",
            SourceType::Youtube => "videos",
            SourceType::Audio => "audio files",
            SourceType::Document => "documents",
            SourceType::Text => "sources",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Processing,
    Ready,
    Error,
}

/// Finalized source record as handed over by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub status: SourceStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub word_count: Option<u64>,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_type: SourceType,
        status: SourceStatus,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_type,
            status,
            created_at: None,
            word_count: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SourceStatus::Ready
    }
}

/// Supplies the sources of the active notebook.
pub trait SourceRegistry: Send + Sync {
    fn sources(&self) -> Vec<Source>;
}

/// Ids of the sources eligible for grounding; processing and errored sources
/// are left out.
pub fn ready_source_ids(sources: &[Source]) -> BTreeSet<String> {
    sources
        .iter()
        .filter(|s| s.is_ready())
        .map(|s| s.id.clone())
        .collect()
}

/// Registry kept in memory, updated as ingestion progresses.
#[derive(Debug, Default)]
pub struct InMemorySourceRegistry {
    sources: RwLock<Vec<Source>>,
}

impl InMemorySourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources: RwLock::new(sources),
        }
    }

    /// Insert a source, or replace the one with the same id in place.
    pub fn upsert(&self, source: Source) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source,
            None => sources.push(source),
        }
    }

    pub fn set_status(&self, source_id: &str, status: SourceStatus) -> Result<(), AppError> {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        let source = sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| {
                AppError::new("SOURCE_NOT_FOUND", "Source not found")
                    .with_details(format!("source_id={source_id}"))
            })?;
        source.status = status;
        Ok(())
    }
}

impl SourceRegistry for InMemorySourceRegistry {
    fn sources(&self) -> Vec<Source> {
        self.sources.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn ready_count_phrase(n: usize) -> String {
    if n == 1 {
        "1 source".to_string()
    } else {
        format!("{n} sources")
    }
}

/// Placeholder of the question input, e.g. "Ask 3 sources...".
pub fn input_placeholder(sources: &[Source]) -> String {
    let ready = sources.iter().filter(|s| s.is_ready()).count();
    format!("Ask {}...", ready_count_phrase(ready))
}

/// Greeting shown while the transcript is empty.
pub fn welcome_message(sources: &[Source]) -> String {
    let ready: Vec<&Source> = sources.iter().filter(|s| s.is_ready()).collect();
    if ready.is_empty() {
        return "Upload sources to start getting AI-powered insights from your documents."
            .to_string();
    }

    // Kinds in first-seen order.
    let mut kinds: Vec<SourceType> = Vec::new();
    for s in ready.iter() {
        if !kinds.contains(&s.source_type) {
            kinds.push(s.source_type);
        }
    }
    let kinds = kinds
        .iter()
        .map(|k| k.plural_noun())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "I can help you analyze your {} ({kinds}). Ask me anything about your research!",
        ready_count_phrase(ready.len())
    )
}

pub fn suggested_questions(sources: &[Source]) -> Vec<String> {
    if !sources.iter().any(|s| s.is_ready()) {
        return Vec::new();
    }
    [
        "What are the main themes across all sources?",
        "Can you summarize the key findings?",
        "What questions do these sources answer?",
        "Are there any conflicting viewpoints?",
    ]
    .iter()
    .map(|q| q.to_string())
    .collect()
}
