use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Full text of one ingested source, as the grounded provider sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_id: String,
    pub title: String,
    pub text: String,
}

/// Text of the sources the ingestion pipeline has finished with.
#[derive(Debug, Default)]
pub struct SourceLibrary {
    docs: RwLock<BTreeMap<String, SourceDocument>>,
}

impl SourceLibrary {
    pub fn new(docs: Vec<SourceDocument>) -> Self {
        let lib = Self::default();
        for d in docs {
            lib.insert(d);
        }
        lib
    }

    pub fn insert(&self, doc: SourceDocument) {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.insert(doc.source_id.clone(), doc);
    }

    /// Documents for `ids`, in id order. Unknown ids are skipped.
    pub fn documents(&self, ids: &BTreeSet<String>) -> Vec<SourceDocument> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        ids.iter().filter_map(|id| docs.get(id).cloned()).collect()
    }
}

/// A numbered passage offered to the model. `number` is what the model writes
/// as `[n]`; `start`/`end` are char offsets into the normalized source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Excerpt {
    pub number: u32,
    pub source_id: String,
    pub source_title: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

pub(crate) fn normalize_text(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

// Byte ranges of non-blank paragraphs, trimmed.
fn paragraph_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for piece in text.split("\n\n") {
        let lead = piece.len() - piece.trim_start().len();
        let trail = piece.len() - piece.trim_end().len();
        if lead < piece.len() {
            out.push((offset + lead, offset + piece.len() - trail));
        }
        offset += piece.len() + 2;
    }
    out
}

/// Group paragraphs into byte ranges of at most `max_chars` bytes. A single
/// paragraph longer than that becomes its own range.
fn chunk_ranges(text: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for (start, end) in paragraph_ranges(text) {
        current = match current {
            Some((cs, ce)) if end - cs > max_chars => {
                out.push((cs, ce));
                Some((start, end))
            }
            Some((cs, _)) => Some((cs, end)),
            None => Some((start, end)),
        };
    }
    if let Some(last) = current {
        out.push(last);
    }
    out
}

fn terms(s: &str) -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Share of the question's terms (3+ chars) that occur in `text`, in [0, 1].
pub fn lexical_relevance(question: &str, text: &str) -> f64 {
    let q = terms(question);
    if q.is_empty() {
        return 0.0;
    }
    let t = terms(text);
    let hits = q.iter().filter(|w| t.contains(*w)).count();
    hits as f64 / q.len() as f64
}

/// Chunk `docs`, score every chunk against `question` and keep the best
/// `max_excerpts`, numbered from 1 in rank order. Ties keep document order.
pub fn select_excerpts(
    docs: &[SourceDocument],
    question: &str,
    max_chars: usize,
    max_excerpts: usize,
) -> Vec<Excerpt> {
    let mut candidates: Vec<Excerpt> = Vec::new();
    for doc in docs {
        let text = normalize_text(&doc.text);
        for (start, end) in chunk_ranges(&text, max_chars) {
            let body = &text[start..end];
            candidates.push(Excerpt {
                number: 0,
                source_id: doc.source_id.clone(),
                source_title: doc.title.clone(),
                text: body.to_string(),
                start: text[..start].chars().count(),
                end: text[..end].chars().count(),
                score: lexical_relevance(question, body),
            });
        }
    }

    // Stable sort keeps document/paragraph order among equal scores.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(max_excerpts);
    for (i, ex) in candidates.iter_mut().enumerate() {
        ex.number = (i + 1) as u32;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_skip_blank_runs() {
        let text = "one\n\n\n\n  two  \n\nthree";
        let got: Vec<&str> = paragraph_ranges(text)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(got, vec!["one", "two", "three"]);
    }

    #[test]
    fn chunks_merge_until_limit() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        let got: Vec<&str> = chunk_ranges(text, 10)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(got, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn relevance_is_share_of_question_terms() {
        assert_eq!(lexical_relevance("solar wind speed", "The solar wind is fast"), 2.0 / 3.0);
        assert_eq!(lexical_relevance("a an", "anything"), 0.0);
    }

    #[test]
    fn excerpts_are_ranked_and_offsets_count_chars() {
        let docs = vec![SourceDocument {
            source_id: "s1".to_string(),
            title: "Notes".to_string(),
            text: "Café intro.\r\n\r\nSolar wind facts here.".to_string(),
        }];
        let ex = select_excerpts(&docs, "solar wind", 12, 5);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].number, 1);
        assert_eq!(ex[0].text, "Solar wind facts here.");
        // "Café intro.\n\n" is 13 chars (14 bytes).
        assert_eq!(ex[0].start, 13);
        assert_eq!(ex[1].text, "Café intro.");
    }
}
