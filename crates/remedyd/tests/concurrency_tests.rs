//! Store concurrency tests.
//!
//! - upsert_if_absent commits at most one record per signature under
//!   concurrent creation attempts; every caller observes the winner.
//! - apply_outcome serializes per playbook; concurrent outcomes never
//!   lose updates.

use chrono::Utc;
use remedy_common::{ExecutionResult, LearnedPlaybook, PlaybookSource, Signature};
use remedyd::store::LearnedPlaybookStore;
use std::collections::HashSet;
use std::thread;

fn candidate(signature: &str, created_by: &str) -> LearnedPlaybook {
    LearnedPlaybook {
        // Deterministic per signature, as the synthesizer guarantees.
        id: format!("lp-{}", signature.replace('|', "-")),
        anomaly_signature: Signature::new(signature),
        anomaly_type: signature.split('|').next().unwrap().to_string(),
        name: format!("proposal_by_{}", created_by),
        confidence: LearnedPlaybook::INITIAL_CONFIDENCE,
        source: PlaybookSource::LlmGenerated,
        created_at: Utc::now(),
        created_by: created_by.to_string(),
        origin_incident_id: format!("inc-{}", created_by),
        execution_count: 0,
        success_count: 0,
        failure_count: 0,
        last_execution_at: None,
        content: "{}".to_string(),
        content_ref: "learned/proposal.json".to_string(),
    }
}

// ============================================================================
// Scenario E: concurrent synthesis, one winner
// ============================================================================

#[test]
fn concurrent_upserts_commit_exactly_one_record() {
    let store = LearnedPlaybookStore::open_in_memory().unwrap();
    let sig = "replication_broken|postgres|usa";

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            let candidate = candidate(sig, &format!("worker{}", worker));
            thread::spawn(move || store.upsert_if_absent(candidate).unwrap())
        })
        .collect();

    let committed: Vec<LearnedPlaybook> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Every caller observed the same committed record.
    let ids: HashSet<_> = committed.iter().map(|pb| pb.id.clone()).collect();
    assert_eq!(ids.len(), 1);
    let created: HashSet<_> = committed.iter().map(|pb| pb.created_at).collect();
    assert_eq!(created.len(), 1);
    let names: HashSet<_> = committed.iter().map(|pb| pb.name.clone()).collect();
    assert_eq!(names.len(), 1, "losers must see the winner's payload");

    // And the store holds exactly one record for the type.
    let all = store.list_by_type("replication_broken").unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn distinct_signatures_do_not_interfere() {
    let store = LearnedPlaybookStore::open_in_memory().unwrap();

    let handles: Vec<_> = (0..6)
        .map(|region| {
            let store = store.clone();
            let sig = format!("timeout|api|region-{}", region);
            thread::spawn(move || store.upsert_if_absent(candidate(&sig, "w")).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.list_by_type("timeout").unwrap().len(), 6);
}

// ============================================================================
// Concurrent outcome application: no lost updates
// ============================================================================

#[test]
fn concurrent_successes_are_all_counted() {
    let store = LearnedPlaybookStore::open_in_memory().unwrap();
    let pb = store
        .upsert_if_absent(candidate("high_memory|cache|usa", "seed"))
        .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            let id = pb.id.clone();
            thread::spawn(move || {
                store
                    .apply_outcome(&id, ExecutionResult::Success, Utc::now())
                    .unwrap()
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let final_state = store
        .get_by_signature(&Signature::new("high_memory|cache|usa"))
        .unwrap()
        .unwrap();
    assert_eq!(final_state.execution_count, 10);
    assert_eq!(final_state.success_count, 10);
    // 0.75 + 10 * 0.05 clips at the ceiling.
    assert!((final_state.confidence - LearnedPlaybook::CONFIDENCE_CEILING).abs() < 1e-9);
}

#[test]
fn interleaved_outcomes_never_lose_updates() {
    let store = LearnedPlaybookStore::open_in_memory().unwrap();
    let pb = store
        .upsert_if_absent(candidate("ddos_detected|edge|china", "seed"))
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let store = store.clone();
        let id = pb.id.clone();
        let result = if i % 2 == 0 {
            ExecutionResult::Success
        } else {
            ExecutionResult::Failure
        };
        handles.push(thread::spawn(move || {
            store.apply_outcome(&id, result, Utc::now()).unwrap()
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let final_state = store
        .get_by_signature(&Signature::new("ddos_detected|edge|china"))
        .unwrap()
        .unwrap();
    assert_eq!(final_state.execution_count, 12);
    assert_eq!(final_state.success_count, 6);
    assert_eq!(final_state.failure_count, 6);
    assert!(final_state.confidence >= LearnedPlaybook::CONFIDENCE_FLOOR - 1e-9);
    assert!(final_state.confidence <= LearnedPlaybook::CONFIDENCE_CEILING + 1e-9);
}
