use std::collections::BTreeSet;

use crate::citations::marker_numbers;
use crate::domain::{Citation, NewMessage, RawCitation, Role, ValidationWarning};
use crate::error::AppError;

/// Check a message against the transcript rules before it is appended:
/// - user messages carry no citations and no answer metrics;
/// - every citation number is >= 1 and anchored to a `[n]` marker in content;
/// - every relevance score is finite and within [0, 1].
pub fn validate_new_message(msg: &NewMessage) -> Result<(), AppError> {
    if msg.role == Role::User {
        if !msg.citations.is_empty() {
            return Err(AppError::new(
                "TRANSCRIPT_ROLE_INVALID",
                "User messages cannot carry citations",
            )
            .with_details(format!("citations={}", msg.citations.len())));
        }
        if msg.processing_time.is_some() || msg.confidence_score.is_some() {
            return Err(AppError::new(
                "TRANSCRIPT_ROLE_INVALID",
                "User messages cannot carry answer metrics",
            ));
        }
        return Ok(());
    }

    let anchors = marker_numbers(&msg.content);
    for c in msg.citations.iter() {
        validate_citation(c)?;
        if !anchors.contains(&c.number) {
            return Err(AppError::new(
                "TRANSCRIPT_CITATION_UNANCHORED",
                "Citation number has no matching marker in message content",
            )
            .with_details(format!("number={}; source_id={}", c.number, c.source_id)));
        }
    }
    Ok(())
}

fn validate_citation(c: &Citation) -> Result<(), AppError> {
    if c.number == 0 {
        return Err(AppError::new(
            "TRANSCRIPT_CITATION_INVALID",
            "Citation numbers start at 1",
        )
        .with_details(format!("source_id={}", c.source_id)));
    }
    if !c.relevance_score.is_finite() || !(0.0..=1.0).contains(&c.relevance_score) {
        return Err(AppError::new(
            "TRANSCRIPT_CITATION_INVALID",
            "Citation relevance must be within [0, 1]",
        )
        .with_details(format!("number={}; relevance={}", c.number, c.relevance_score)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCitations {
    pub citations: Vec<Citation>,
    pub warnings: Vec<ValidationWarning>,
}

/// Clean provider citations so the result always passes [`validate_new_message`]
/// for `content`. Problems are reported as warnings, never as errors:
/// - number 0, non-finite relevance, or no `[n]` marker in content: dropped;
/// - a number already seen earlier in the list: dropped (first one wins);
/// - finite relevance outside [0, 1]: clamped.
///
/// Input order is preserved for the citations that survive.
pub fn normalize_citations(content: &str, raw: Vec<RawCitation>) -> NormalizedCitations {
    let anchors = marker_numbers(content);
    let mut seen: BTreeSet<u32> = BTreeSet::new();
    let mut citations = Vec::with_capacity(raw.len());
    let mut warnings = Vec::new();

    for rc in raw {
        if rc.number == 0 {
            warnings.push(
                ValidationWarning::new("CITATION_NUMBER_INVALID", "Dropped citation numbered 0")
                    .with_details(format!("source_id={}", rc.source_id)),
            );
            continue;
        }
        if !anchors.contains(&rc.number) {
            warnings.push(
                ValidationWarning::new(
                    "CITATION_UNANCHORED",
                    format!("Dropped citation {} with no marker in the answer", rc.number),
                )
                .with_details(format!("source_id={}", rc.source_id)),
            );
            continue;
        }
        if !rc.relevance_score.is_finite() {
            warnings.push(
                ValidationWarning::new(
                    "CITATION_RELEVANCE_INVALID",
                    format!("Dropped citation {} with non-finite relevance", rc.number),
                )
                .with_details(format!("relevance={}", rc.relevance_score)),
            );
            continue;
        }
        if !seen.insert(rc.number) {
            warnings.push(
                ValidationWarning::new(
                    "CITATION_DUPLICATE",
                    format!("Dropped duplicate citation {}", rc.number),
                )
                .with_details(format!("source_id={}", rc.source_id)),
            );
            continue;
        }

        let mut citation = Citation::from(rc);
        if !(0.0..=1.0).contains(&citation.relevance_score) {
            let clamped = citation.relevance_score.clamp(0.0, 1.0);
            warnings.push(
                ValidationWarning::new(
                    "CITATION_RELEVANCE_CLAMPED",
                    format!("Clamped relevance of citation {}", citation.number),
                )
                .with_details(format!("from={}; to={clamped}", citation.relevance_score)),
            );
            citation.relevance_score = clamped;
        }
        citations.push(citation);
    }

    NormalizedCitations { citations, warnings }
}

/// Split `citations` into those an assistant message with `content` may carry
/// and those [`validate_new_message`] would reject, keeping input order.
pub fn split_storable_citations(
    content: &str,
    citations: Vec<Citation>,
) -> (Vec<Citation>, Vec<Citation>) {
    let anchors = marker_numbers(content);
    citations
        .into_iter()
        .partition(|c| validate_citation(c).is_ok() && anchors.contains(&c.number))
}
