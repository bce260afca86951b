use std::collections::BTreeSet;

use onb_core::citations::marker_numbers;
use onb_core::domain::{Citation, NewMessage, Role};
use onb_core::transcript::TranscriptStore;
use pretty_assertions::assert_eq;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn citation(number: u32) -> Citation {
    Citation {
        number,
        source_id: format!("src-{number}"),
        source_title: format!("Source {number}"),
        page_number: Some(number),
        quote: "supporting quote".to_string(),
        relevance_score: 0.8,
        position: None,
    }
}

fn ts(s: &str) -> OffsetDateTime {
    OffsetDateTime::parse(s, &Rfc3339).expect("parse ts")
}

#[test]
fn append_preserves_insertion_order_and_assigns_unique_ids() {
    let mut store = TranscriptStore::new();
    let q = store.append(NewMessage::user("What is new?")).expect("user");
    let a = store
        .append(NewMessage::assistant("Two things [1].", vec![citation(1)]))
        .expect("assistant");

    assert_ne!(q, a);
    let roles: Vec<Role> = store.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(store.get(&a).map(|m| m.citations.len()), Some(1));
    assert_eq!(store.last().map(|m| m.id.clone()), Some(a));
    assert_eq!(store.len(), 2);
}

#[test]
fn unanchored_citation_is_rejected_and_transcript_unchanged() {
    let mut store = TranscriptStore::new();
    store.append(NewMessage::user("q")).expect("user");

    let err = store
        .append(NewMessage::assistant("Only [1] here.", vec![citation(1), citation(2)]))
        .expect_err("should error");
    assert_eq!(err.code, "TRANSCRIPT_CITATION_UNANCHORED");
    assert_eq!(store.len(), 1);
}

#[test]
fn out_of_range_relevance_is_rejected() {
    let mut store = TranscriptStore::new();
    let mut c = citation(1);
    c.relevance_score = 1.5;
    let err = store
        .append(NewMessage::assistant("x [1]", vec![c]))
        .expect_err("should error");
    assert_eq!(err.code, "TRANSCRIPT_CITATION_INVALID");
}

#[test]
fn accepted_assistant_messages_are_always_anchored() {
    let mut store = TranscriptStore::new();
    let attempts = vec![
        ("A [1] B [2]", vec![citation(1), citation(2)]),
        ("none", vec![citation(1)]),
        ("[3] only", vec![citation(3)]),
        ("[4]", vec![citation(4), citation(5)]),
        ("no citations at all [9]", vec![]),
    ];
    for (content, citations) in attempts {
        let _ = store.append(NewMessage::assistant(content, citations));
    }

    assert_eq!(store.len(), 3);
    for m in store.messages() {
        let anchors: BTreeSet<u32> = marker_numbers(&m.content);
        for c in m.citations.iter() {
            assert!(anchors.contains(&c.number), "unanchored {} in {:?}", c.number, m.content);
        }
    }
}

#[test]
fn snapshot_is_a_defensive_copy() {
    let mut store = TranscriptStore::new();
    store.append(NewMessage::user("original")).expect("user");

    let mut snap = store.snapshot();
    snap[0].content.push_str(" mutated");
    snap.clear();

    assert_eq!(store.len(), 1);
    assert_eq!(store.messages()[0].content, "original");
}

#[test]
fn timestamps_never_go_backwards() {
    let mut store = TranscriptStore::new();
    store
        .append_at(NewMessage::user("first"), ts("2026-03-01T10:00:05Z"))
        .expect("first");
    store
        .append_at(NewMessage::assistant("second", vec![]), ts("2026-03-01T10:00:01Z"))
        .expect("second");
    store
        .append_at(NewMessage::user("third"), ts("2026-03-01T10:00:09Z"))
        .expect("third");

    let times: Vec<OffsetDateTime> = store.messages().iter().map(|m| m.timestamp).collect();
    assert_eq!(
        times,
        vec![
            ts("2026-03-01T10:00:05Z"),
            ts("2026-03-01T10:00:05Z"),
            ts("2026-03-01T10:00:09Z"),
        ]
    );
}

#[test]
fn clear_empties_and_ids_stay_unique_afterwards() {
    let mut store = TranscriptStore::new();
    let before = store
        .append_at(NewMessage::user("same"), ts("2026-03-01T10:00:00Z"))
        .expect("before");
    store.clear();
    assert!(store.is_empty());

    let after = store
        .append_at(NewMessage::user("same"), ts("2026-03-01T10:00:00Z"))
        .expect("after");
    assert_ne!(before, after);
    assert_eq!(store.len(), 1);
}

#[test]
fn message_serializes_with_rfc3339_timestamp() {
    let mut store = TranscriptStore::new();
    store
        .append_at(
            NewMessage::assistant("Answer [1]", vec![citation(1)]).with_metrics(Some(1.2), Some(0.89)),
            ts("2026-03-01T10:00:00Z"),
        )
        .expect("append");

    let v = serde_json::to_value(&store.messages()[0]).expect("json");
    assert_eq!(v["role"], "assistant");
    assert_eq!(v["timestamp"], "2026-03-01T10:00:00Z");
    assert_eq!(v["processing_time"], 1.2);
    assert_eq!(v["citations"][0]["number"], 1);
    assert!(v["id"].as_str().unwrap_or_default().starts_with("msg-"));
}
