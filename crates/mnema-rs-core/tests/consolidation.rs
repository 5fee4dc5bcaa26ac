//! Store and consolidation loop integration tests with stub collaborators.

use mnema_rs_config::{ConsolidationConfig, MnemaConfig};
use mnema_rs_core::{
    ConsolidateParams, MemoryError, MemoryStore, ProposalOracle, SectionKind, record,
    tokens::estimate_tokens,
};
use mnema_rs_test_utils::{
    FailingDispatchQueue, FailingReformatOracle, FailingTokenCounter, FixedReformatOracle,
    MemoryBlobStore, NeverConvergingOracle, RecordingDispatchQueue, RecordingTokenCounter,
    ScriptedProposalOracle, SlowProposalOracle,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const CONTEXT: &str = "user-1";

fn store_with(blobs: Arc<MemoryBlobStore>, proposals: Arc<dyn ProposalOracle>) -> MemoryStore {
    MemoryStore::new(
        MnemaConfig::default(),
        blobs,
        proposals,
        Arc::new(FixedReformatOracle::empty()),
    )
}

/// A full cycle: normalize, apply a proposal batch, enforce, persist.
#[tokio::test]
async fn consolidate_applies_proposals_and_persists() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.seed(
        CONTEXT,
        SectionKind::UserFacts,
        "3|2024-01-01T00:00:00Z|works at Initech\n[P2] prefers tea",
    );
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![
        Ok(Some(json!([
            {"type": "add", "newtext": "has a cat named Pixel", "priority": 2},
            {"type": "change", "pattern": r"works at (\w+)", "newtext": "used to work at $1"},
            {"type": "delete", "pattern": "prefers tea"},
        ]))),
        Ok(None),
    ]));
    let store = store_with(blobs.clone(), oracle.clone());

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 3);
    assert_eq!(oracle.calls(), 2);
    assert_eq!(
        blobs.get(CONTEXT, SectionKind::UserFacts),
        Some(outcome.blob.clone())
    );

    let (records, raw) = record::split_records(&outcome.blob);
    assert_eq!(raw.len(), 0);
    let contents: Vec<_> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["has a cat named Pixel", "used to work at Initech"]
    );
    assert_eq!(records[0].priority, 2);
    assert_eq!(records[1].priority, 3);
}

/// The loop must terminate at the cap even when the oracle never
/// signals convergence.
#[tokio::test]
async fn loop_terminates_at_the_iteration_cap() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(NeverConvergingOracle::new(json!([
        {"type": "add", "newtext": "one more thing"},
    ])));
    let store = store_with(blobs, oracle.clone());

    let outcome = store
        .consolidate(ConsolidateParams {
            max_iterations: Some(3),
            ..ConsolidateParams::new(CONTEXT, SectionKind::UserFacts)
        })
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 3);
    assert_eq!(oracle.calls(), 3);
}

/// A payload that is not a JSON array discards the batch and stops.
#[tokio::test]
async fn non_array_proposal_stops_the_loop() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![Ok(Some(
        json!({"do": "everything"}),
    ))]));
    let store = store_with(blobs.clone(), oracle.clone());

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 0);
    assert_eq!(outcome.blob, "");
    assert_eq!(blobs.get(CONTEXT, SectionKind::UserFacts), None);
}

/// A batch whose entries are all malformed counts as convergence.
#[tokio::test]
async fn empty_filtered_batch_counts_as_convergence() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![Ok(Some(json!([
        {"type": "merge", "pattern": "a"},
        {"type": "change", "newtext": "missing pattern"},
    ])))]));
    let store = store_with(blobs, oracle.clone());

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 0);
    assert_eq!(oracle.calls(), 1);
}

/// An oracle transport failure stops the loop at the last persisted
/// state instead of erroring.
#[tokio::test]
async fn oracle_failure_keeps_the_last_persisted_state() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![
        Ok(Some(json!([{"type": "add", "newtext": "first fact"}]))),
        Err("oracle unreachable".to_string()),
    ]));
    let store = store_with(blobs.clone(), oracle.clone());

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 1);
    assert!(outcome.blob.contains("first fact"));
    assert_eq!(
        blobs.get(CONTEXT, SectionKind::UserFacts),
        Some(outcome.blob.clone())
    );
}

/// A failed persist stops the loop without reporting unpersisted work.
#[tokio::test]
async fn persist_failure_stops_without_corrupting_state() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.set_fail_writes(true);
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![Ok(Some(
        json!([{"type": "add", "newtext": "never lands"}]),
    ))]));
    let store = store_with(blobs.clone(), oracle);

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 0);
    assert_eq!(outcome.blob, "");
    assert_eq!(blobs.get(CONTEXT, SectionKind::UserFacts), None);
}

/// Cancellation is honored at the iteration checkpoint, before any
/// oracle call.
#[tokio::test]
async fn cancellation_stops_before_the_first_proposal() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![Ok(Some(
        json!([{"type": "add", "newtext": "unseen"}]),
    ))]));
    let store = store_with(blobs, oracle.clone());

    let cancel = Arc::new(AtomicBool::new(true));
    let outcome = store
        .consolidate(ConsolidateParams {
            cancel: Some(cancel),
            ..ConsolidateParams::new(CONTEXT, SectionKind::UserFacts)
        })
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 0);
    assert_eq!(oracle.calls(), 0);
}

/// A proposal oracle that outlives its deadline terminates the loop
/// cleanly.
#[tokio::test]
async fn proposal_timeout_stops_the_loop() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let config = MnemaConfig::builder()
        .consolidation(ConsolidationConfig {
            oracle_timeout_secs: 0,
            ..ConsolidationConfig::default()
        })
        .build();
    let store = MemoryStore::new(
        config,
        blobs,
        Arc::new(SlowProposalOracle::new(Duration::from_secs(30))),
        Arc::new(FixedReformatOracle::empty()),
    );

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.modifications, 0);
}

/// Configuration errors are rejected before any read or write.
#[tokio::test]
async fn missing_context_or_section_is_rejected_up_front() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(Vec::new()));
    let store = store_with(blobs, oracle.clone());

    let result = store
        .consolidate(ConsolidateParams::new("  ", SectionKind::UserFacts))
        .await;
    assert!(matches!(result, Err(MemoryError::MissingContext)));

    let result = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::All))
        .await;
    assert!(matches!(result, Err(MemoryError::MissingSection)));

    let result = store.save_section(CONTEXT, SectionKind::All, "").await;
    assert!(matches!(result, Err(MemoryError::MissingSection)));

    assert_eq!(oracle.calls(), 0);
}

/// Saving a section enforces the dedup invariant on every store cycle.
#[tokio::test]
async fn save_section_deduplicates_identical_records() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with(blobs.clone(), Arc::new(ScriptedProposalOracle::new(Vec::new())));

    store
        .save_section(
            CONTEXT,
            SectionKind::UserFacts,
            "1|2024-01-01T00:00:00Z|likes coffee\n1|2024-01-01T00:00:00Z|likes coffee",
        )
        .await
        .expect("save");

    assert_eq!(
        blobs.get(CONTEXT, SectionKind::UserFacts),
        Some("1|2024-01-01T00:00:00Z|likes coffee".to_string())
    );
}

/// The budget invariant holds through the public enforcement API, and
/// the two-phase trim keeps exact-count calls bounded.
#[tokio::test]
async fn enforce_budget_meets_the_ceiling_with_bounded_counting() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let counter = Arc::new(RecordingTokenCounter::new());
    let store = store_with(blobs, Arc::new(ScriptedProposalOracle::new(Vec::new())))
        .with_token_counter(counter.clone());

    let blob = (1..=5)
        .map(|priority| format!("{priority}|2024-01-01T00:00:0{priority}Z|fact number {priority}"))
        .collect::<Vec<_>>()
        .join("\n");
    let ceiling = 20;
    let enforced = store
        .enforce_budget(&blob, ceiling, false)
        .await
        .expect("enforce");

    assert!(enforced.is_empty() || estimate_tokens(&enforced) <= ceiling);
    // one call per exact-phase drop plus the final accepting count
    assert!(counter.calls() <= 6, "calls={}", counter.calls());

    let again = store
        .enforce_budget(&enforced, ceiling, false)
        .await
        .expect("enforce twice");
    assert_eq!(again, enforced);
}

/// The aggregate view joins every concrete section for reads only.
#[tokio::test]
async fn aggregate_view_joins_concrete_sections() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with(blobs, Arc::new(ScriptedProposalOracle::new(Vec::new())));

    store
        .save_section(CONTEXT, SectionKind::UserFacts, "2|2024-01-01T00:00:00Z|likes jazz")
        .await
        .expect("save facts");
    store
        .save_section(CONTEXT, SectionKind::Topics, "3|2024-01-02T00:00:00Z|rust release")
        .await
        .expect("save topics");

    let all = store
        .read_section(CONTEXT, SectionKind::All)
        .await
        .expect("read all");
    assert!(all.contains("likes jazz"));
    assert!(all.contains("rust release"));
}

/// A reformat failure during normalize drops only the raw lines; the
/// loop proceeds with the valid records.
#[tokio::test]
async fn reformat_failure_does_not_block_consolidation() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.seed(
        CONTEXT,
        SectionKind::UserFacts,
        "3|2024-01-01T00:00:00Z|keeps this\ncompletely freeform line",
    );
    let store = MemoryStore::new(
        MnemaConfig::default(),
        blobs,
        Arc::new(ScriptedProposalOracle::new(Vec::new())),
        Arc::new(FailingReformatOracle::new("reformatter unreachable")),
    );

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.blob, "3|2024-01-01T00:00:00Z|keeps this");
}

/// A token-counter transport failure stops the loop at the last
/// persisted state instead of erroring.
#[tokio::test]
async fn token_counter_failure_stops_the_loop_cleanly() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let oracle = Arc::new(ScriptedProposalOracle::new(vec![Ok(Some(
        json!([{"type": "add", "newtext": "never enforced"}]),
    ))]));
    let store = store_with(blobs.clone(), oracle)
        .with_token_counter(Arc::new(FailingTokenCounter::new("counter unreachable")));

    let outcome = store
        .consolidate(ConsolidateParams::new(CONTEXT, SectionKind::UserFacts))
        .await
        .expect("consolidate");

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.modifications, 0);
    assert_eq!(blobs.get(CONTEXT, SectionKind::UserFacts), None);
}

/// Every successful persist announces the section to the dispatch
/// queue, and announcement failures never fail the persist.
#[tokio::test]
async fn persists_announce_to_the_dispatch_queue() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let dispatch = Arc::new(RecordingDispatchQueue::new());
    let store = store_with(blobs.clone(), Arc::new(ScriptedProposalOracle::new(Vec::new())))
        .with_dispatch_queue(dispatch.clone());

    store
        .save_section(CONTEXT, SectionKind::UserFacts, "2|2024-01-01T00:00:00Z|likes jazz")
        .await
        .expect("save");
    assert_eq!(
        dispatch.announcements(),
        vec![(CONTEXT.to_string(), "user-facts".to_string())]
    );

    let failing = store_with(blobs.clone(), Arc::new(ScriptedProposalOracle::new(Vec::new())))
        .with_dispatch_queue(Arc::new(FailingDispatchQueue::new("queue offline")));
    failing
        .save_section(CONTEXT, SectionKind::Topics, "3|2024-01-02T00:00:00Z|rust release")
        .await
        .expect("save despite failing queue");
    assert!(blobs.get(CONTEXT, SectionKind::Topics).is_some());
}

/// Adding then deleting a fact restores the original record set.
#[tokio::test]
async fn add_then_delete_round_trips_the_record_set() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with(blobs, Arc::new(ScriptedProposalOracle::new(Vec::new())));

    let original = "2|2024-01-01T00:00:00Z|likes jazz\n3|2024-01-02T00:00:00Z|walks at dawn";
    let added = store.apply_modifications(
        original,
        &mnema_rs_core::modify::parse_proposal(&json!([
            {"type": "add", "newtext": "transient note"},
        ]))
        .expect("batch"),
    );
    assert!(added.contains("transient note"));

    let restored = store.apply_modifications(
        &added,
        &mnema_rs_core::modify::parse_proposal(&json!([
            {"type": "delete", "pattern": "transient note"},
        ]))
        .expect("batch"),
    );

    let (original_records, _) = record::split_records(original);
    let (restored_records, _) = record::split_records(&restored);
    let mut original_contents: Vec<_> =
        original_records.iter().map(|r| r.content.clone()).collect();
    let mut restored_contents: Vec<_> =
        restored_records.iter().map(|r| r.content.clone()).collect();
    original_contents.sort();
    restored_contents.sort();
    assert_eq!(restored_contents, original_contents);
}
