use onb_core::citations::{reconstruct, resolve, scan_markers, unresolved_numbers, ParsedSegment};
use onb_core::domain::Citation;
use pretty_assertions::assert_eq;

fn citation(number: u32, source_id: &str) -> Citation {
    Citation {
        number,
        source_id: source_id.to_string(),
        source_title: format!("Title of {source_id}"),
        page_number: None,
        quote: format!("quote from {source_id}"),
        relevance_score: 0.9,
        position: None,
    }
}

fn text(s: &str) -> ParsedSegment {
    ParsedSegment::Text {
        text: s.to_string(),
    }
}

#[test]
fn two_resolved_markers_split_at_marker_boundaries() {
    let c1 = citation(1, "a");
    let c2 = citation(2, "b");
    let segments = resolve("Result A [1] and B [2].", &[c1.clone(), c2.clone()]);
    assert_eq!(
        segments,
        vec![
            text("Result A "),
            ParsedSegment::ResolvedCitation {
                number: 1,
                citation: c1
            },
            text(" and B "),
            ParsedSegment::ResolvedCitation {
                number: 2,
                citation: c2
            },
            text("."),
        ]
    );
}

#[test]
fn marker_without_citation_stays_visible_as_unresolved() {
    let segments = resolve("See [5].", &[]);
    assert_eq!(
        segments,
        vec![
            text("See "),
            ParsedSegment::UnresolvedCitation { number: 5 },
            text("."),
        ]
    );
    assert_eq!(unresolved_numbers(&segments), vec![5]);
}

#[test]
fn adjacent_markers_are_independent() {
    let segments = resolve("[1][2]", &[citation(2, "b")]);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0], ParsedSegment::UnresolvedCitation { number: 1 });
    assert_eq!(segments[1].number(), Some(2));
    assert!(matches!(segments[1], ParsedSegment::ResolvedCitation { .. }));
}

#[test]
fn duplicate_numbers_resolve_to_first_in_list_order() {
    let first = citation(3, "first");
    let second = citation(3, "second");
    let segments = resolve("x [3] y [3]", &[first.clone(), second]);
    for seg in segments.iter().filter(|s| s.is_citation()) {
        match seg {
            ParsedSegment::ResolvedCitation { citation, .. } => {
                assert_eq!(citation, &first);
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }
}

#[test]
fn trailing_unclosed_marker_is_plain_text() {
    let segments = resolve("Pending [12", &[citation(12, "a")]);
    assert_eq!(segments, vec![text("Pending [12")]);
}

#[test]
fn non_numeric_brackets_are_plain_text() {
    let content = "array[i] and [a] and [] and [1.5]";
    let segments = resolve(content, &[citation(1, "a")]);
    assert_eq!(segments, vec![text(content)]);
}

#[test]
fn empty_content_yields_no_segments() {
    assert!(resolve("", &[citation(1, "a")]).is_empty());
}

#[test]
fn whitespace_and_newlines_are_preserved_exactly() {
    let content = "  line one [1]\n\n\tline two  ";
    let segments = resolve(content, &[]);
    assert_eq!(segments[0], text("  line one "));
    assert_eq!(segments[2], text("\n\n\tline two  "));
}

#[test]
fn unicode_text_around_markers_is_untouched() {
    let content = "Résumé 🚀 [1] — 数据 [2]…";
    let segments = resolve(content, &[citation(1, "a")]);
    assert_eq!(segments[0], text("Résumé 🚀 "));
    assert_eq!(segments[2], text(" — 数据 "));
    assert_eq!(segments[3], ParsedSegment::UnresolvedCitation { number: 2 });
    assert_eq!(segments[4], text("…"));
}

#[test]
fn resolve_is_repeatable() {
    let citations = vec![citation(1, "a"), citation(4, "d")];
    let content = "A [1] B [2] C [4]";
    assert_eq!(resolve(content, &citations), resolve(content, &citations));
}

#[test]
fn segments_round_trip_and_every_marker_yields_one_segment() {
    let corpus = [
        "",
        "plain text only",
        "[1]",
        "[1][2][3]",
        "start [10] middle [2] end",
        "[[1]] nested",
        "edge [ 1 ] spaced, [7]",
        "unicode ✓ [3] ünïcödé [0]",
        "dangling [5",
        "multi\nline [1]\n[2]\n",
    ];
    let citations = vec![citation(1, "a"), citation(2, "b"), citation(10, "j")];

    for content in corpus {
        let segments = resolve(content, &citations);
        assert_eq!(reconstruct(&segments), content, "round trip failed for {content:?}");

        let markers = scan_markers(content);
        let citation_segments: Vec<u32> = segments.iter().filter_map(|s| s.number()).collect();
        let marker_numbers: Vec<u32> = markers.iter().map(|m| m.number).collect();
        assert_eq!(citation_segments, marker_numbers, "totality failed for {content:?}");

        // No two text segments in a row: text is never split without a marker.
        for pair in segments.windows(2) {
            assert!(
                pair[0].is_citation() || pair[1].is_citation(),
                "adjacent text segments for {content:?}"
            );
        }
    }
}

#[test]
fn zero_marker_is_rendered_unresolved() {
    let segments = resolve("x [0]", &[citation(1, "a")]);
    assert_eq!(segments[1], ParsedSegment::UnresolvedCitation { number: 0 });
}

#[test]
fn oversized_marker_renders_as_unresolved_citation() {
    let segments = resolve("big [4294967296] end", &[citation(1, "a")]);
    assert_eq!(
        segments,
        vec![
            text("big "),
            ParsedSegment::UnresolvedCitation { number: u32::MAX },
            text(" end"),
        ]
    );
    assert_eq!(unresolved_numbers(&segments), vec![u32::MAX]);
}

#[test]
fn leading_zeros_resolve_but_reconstruct_canonically() {
    let segments = resolve("see [01].", &[citation(1, "a")]);
    assert_eq!(segments[1].number(), Some(1));
    assert!(matches!(segments[1], ParsedSegment::ResolvedCitation { number: 1, .. }));
    // Only canonical markers round-trip byte for byte.
    assert_eq!(reconstruct(&segments), "see [1].");
}
