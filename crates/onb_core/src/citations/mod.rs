use std::collections::BTreeSet;
use std::ops::Range;

use serde::Serialize;

use crate::domain::Citation;

/// A `[n]` token found in answer text. `span` is the byte range of the whole
/// token, brackets included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub number: u32,
    pub span: Range<usize>,
}

/// Renderable piece of an assistant answer.
///
/// Concatenating `Text` contents and writing `[n]` for every citation segment
/// reproduces the content the segments were parsed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedSegment {
    Text { text: String },
    ResolvedCitation { number: u32, citation: Citation },
    UnresolvedCitation { number: u32 },
}

impl ParsedSegment {
    pub fn number(&self) -> Option<u32> {
        match self {
            ParsedSegment::Text { .. } => None,
            ParsedSegment::ResolvedCitation { number, .. }
            | ParsedSegment::UnresolvedCitation { number } => Some(*number),
        }
    }

    pub fn is_citation(&self) -> bool {
        self.number().is_some()
    }
}

/// Scan `content` left to right for non-overlapping `[digits]` markers.
///
/// A digit run too large for `u32` is still a marker and saturates to
/// `u32::MAX`. An opening bracket without a closing one (`"see [12"`) is text.
pub fn scan_markers(content: &str) -> Vec<Marker> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let digits_start = i + 1;
            let mut j = digits_start;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > digits_start && bytes.get(j) == Some(&b']') {
                // Brackets and digits are ASCII, so these are char boundaries.
                let number = content[digits_start..j].parse::<u32>().unwrap_or(u32::MAX);
                out.push(Marker {
                    number,
                    span: i..j + 1,
                });
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Distinct marker numbers present in `content`.
pub fn marker_numbers(content: &str) -> BTreeSet<u32> {
    scan_markers(content).into_iter().map(|m| m.number).collect()
}

/// Split answer text into text and citation segments.
///
/// Every marker yields exactly one citation segment. A marker whose number has
/// no citation becomes `UnresolvedCitation` rather than being dropped. When
/// several citations share a number, the first one in `citations` order is
/// used.
pub fn resolve(content: &str, citations: &[Citation]) -> Vec<ParsedSegment> {
    let mut segments = Vec::new();
    let mut last = 0usize;

    for marker in scan_markers(content) {
        if marker.span.start > last {
            segments.push(ParsedSegment::Text {
                text: content[last..marker.span.start].to_string(),
            });
        }
        let segment = match citations.iter().find(|c| c.number == marker.number) {
            Some(citation) => ParsedSegment::ResolvedCitation {
                number: marker.number,
                citation: citation.clone(),
            },
            None => ParsedSegment::UnresolvedCitation {
                number: marker.number,
            },
        };
        segments.push(segment);
        last = marker.span.end;
    }

    if last < content.len() {
        segments.push(ParsedSegment::Text {
            text: content[last..].to_string(),
        });
    }

    segments
}

/// Inverse of [`resolve`] for canonical markers.
pub fn reconstruct(segments: &[ParsedSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            ParsedSegment::Text { text } => out.push_str(text),
            ParsedSegment::ResolvedCitation { number, .. }
            | ParsedSegment::UnresolvedCitation { number } => {
                out.push('[');
                out.push_str(&number.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Marker numbers that did not resolve, in textual order.
pub fn unresolved_numbers(segments: &[ParsedSegment]) -> Vec<u32> {
    segments
        .iter()
        .filter_map(|s| match s {
            ParsedSegment::UnresolvedCitation { number } => Some(*number),
            _ => None,
        })
        .collect()
}
