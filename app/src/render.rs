use std::collections::BTreeSet;

use onb_core::citations::ParsedSegment;
use onb_core::domain::Message;
use onb_core::preview::{answer_footer, segment_label};

/// Inline text of an answer. Unresolved markers get a trailing `?` so they
/// read as inert.
pub fn inline_text(segments: &[ParsedSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            ParsedSegment::Text { text } => out.push_str(text),
            ParsedSegment::ResolvedCitation { number, .. } => out.push_str(&format!("[{number}]")),
            ParsedSegment::UnresolvedCitation { number } => out.push_str(&format!("[{number}?]")),
        }
    }
    out
}

/// One label line per distinct citation number, in order of first use.
pub fn citation_lines(segments: &[ParsedSegment]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    segments
        .iter()
        .filter(|s| s.number().is_some_and(|n| seen.insert(n)))
        .filter_map(segment_label)
        .map(|label| format!("  {label}"))
        .collect()
}

/// Full terminal rendering of an assistant message.
pub fn assistant_block(message: &Message, segments: &[ParsedSegment]) -> String {
    let mut lines = vec![inline_text(segments)];
    lines.extend(citation_lines(segments));
    if let Some(footer) = answer_footer(message) {
        lines.push(format!("  ({footer})"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use onb_core::citations::resolve;
    use onb_core::domain::Citation;
    use pretty_assertions::assert_eq;

    fn cite(number: u32, title: &str) -> Citation {
        Citation {
            number,
            source_id: format!("s{number}"),
            source_title: title.to_string(),
            page_number: None,
            quote: "q".to_string(),
            relevance_score: 0.9,
            position: None,
        }
    }

    #[test]
    fn unresolved_markers_are_flagged() {
        let segs = resolve("A [1] B [2] C [1]", &[cite(1, "Paper")]);
        assert_eq!(inline_text(&segs), "A [1] B [2?] C [1]");
        assert_eq!(
            citation_lines(&segs),
            vec![
                "  Citation 1: Paper".to_string(),
                "  Citation 2: Source not found".to_string()
            ]
        );
    }

    #[test]
    fn plain_text_has_no_labels() {
        let segs = resolve("nothing cited", &[]);
        assert_eq!(inline_text(&segs), "nothing cited");
        assert!(citation_lines(&segs).is_empty());
    }
}
