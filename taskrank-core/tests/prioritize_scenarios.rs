use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use taskrank_core::{
    EXCLUDED_SCORE, Engine, EngineError, FEATURE_NAMES, Features, FnScorer, ScoringArtifact, Task,
    TaskId, handle_request_annotated,
};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, 4)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap()
}

fn in_days(days: i64) -> String {
    (now().date() + Duration::days(days)).format("%Y-%m-%d").to_string()
}

fn canonical_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Scorer that counts its calls and returns normalized_urgency + overdue_flag.
fn counting_engine(calls: Arc<AtomicUsize>) -> Engine {
    let scorer = FnScorer::new("urgency+overdue", move |x: &Features| {
        calls.fetch_add(1, Ordering::SeqCst);
        x[3] + x[4]
    });
    Engine::new(Arc::new(scorer), canonical_names())
}

fn task(id: i64, status: &str) -> Task {
    Task::new(id)
        .with_deadline(in_days(10))
        .with_urgency_score(5.0)
        .with_normalized_urgency(0.5)
        .with_status(status)
}

#[test]
fn overdue_twin_ranks_first() {
    let engine = counting_engine(Arc::new(AtomicUsize::new(0)));
    let mut tasks = vec![task(1, "pending"), task(2, "overdue")];

    let ranked = engine.prioritize_at(&mut tasks, &[], now()).unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].id, Some(json!(2)));
    assert_eq!(ranked[0].score, Some(1.5));
    assert_eq!(ranked[1].id, Some(json!(1)));
    assert_eq!(ranked[1].score, Some(0.5));
}

#[test]
fn task_waiting_on_unfinished_dependency_is_blocked() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counting_engine(Arc::clone(&calls));
    let mut tasks = vec![task(3, "pending").with_dependencies([42])];

    let ranked = engine.prioritize_at(&mut tasks, &[], now()).unwrap();

    assert!(ranked.is_empty());
    assert_eq!(tasks[0].status_str(), Some("blocked"));
    assert_eq!(tasks[0].score, Some(EXCLUDED_SCORE));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn mixed_batch_scores_only_ready_tasks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counting_engine(Arc::clone(&calls));
    let mut tasks = vec![
        task(1, "pending").with_dependencies([100]),
        task(2, "pending").with_dependencies([101]),
        task(3, "overdue"),
        task(4, "pending").with_dependencies([101, 102]),
    ];

    let ranked = engine
        .prioritize_at(&mut tasks, &[TaskId::Int(101), TaskId::Int(102)], now())
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let ids: Vec<_> = ranked.iter().map(Task::label).collect();
    assert_eq!(ids, vec!["3", "2", "4"]);
    assert!(tasks[0].is_blocked());
}

#[test]
fn repeated_calls_are_identical() {
    let engine = counting_engine(Arc::new(AtomicUsize::new(0)));
    let input = vec![
        task(1, "pending").with_normalized_urgency(0.3),
        task(2, "overdue"),
        task(3, "pending").with_dependencies([1]),
        task(4, "pending").with_normalized_urgency(0.3),
    ];

    let mut first_batch = input.clone();
    let mut second_batch = input.clone();
    let first = engine.prioritize_at(&mut first_batch, &[], now()).unwrap();
    let second = engine.prioritize_at(&mut second_batch, &[], now()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_batch, second_batch);
}

#[test]
fn unavailable_scorer_gives_no_partial_result() {
    let engine = Engine::unavailable("artifact missing");
    let mut tasks = vec![task(1, "pending"), task(2, "overdue")];
    let before = tasks.clone();

    let err = engine.prioritize_at(&mut tasks, &[], now()).unwrap_err();

    assert!(matches!(err, EngineError::ScorerUnavailable(ref r) if r == "artifact missing"));
    assert_eq!(tasks, before);
}

#[test]
fn concurrent_calls_do_not_interfere() {
    let engine = Arc::new(counting_engine(Arc::new(AtomicUsize::new(0))));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut tasks = vec![
                    task(n * 10, "pending").with_normalized_urgency(0.1 * n as f64),
                    task(n * 10 + 1, "overdue"),
                ];
                engine.prioritize_at(&mut tasks, &[], now()).unwrap()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let ranked = handle.join().unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, Some(json!(n as i64 * 10 + 1)));
    }
}

#[test]
fn artifact_backed_engine_ranks_request() -> anyhow::Result<()> {
    // Feature order as it was at fitting time, not the extractor's order.
    let artifact = ScoringArtifact::from_json(
        &json!({
            "feature_names": [
                "Urgency_Score", "Days_Left", "Normalized_Urgency", "Dependency_Count", "Status_Overdue"
            ],
            "model": {
                "kind": "linear",
                "weights": [0.1, -0.05, 1.0, 0.0, 2.0],
                "bias": 1.0
            }
        })
        .to_string(),
    )?;
    let engine = Engine::from_artifact(artifact)?;
    assert_eq!(engine.feature_names()[0], "Urgency_Score");

    let body = json!({
        "tasks": [
            {
                "id": "write-docs", "deadline": in_days(20), "urgency_score": 2,
                "dependencies": [], "status": "pending", "normalized_urgency": 0.2,
                "owner": "sam"
            },
            {
                "id": "fix-prod", "deadline": in_days(1), "urgency_score": 9,
                "dependencies": ["triage"], "status": "Overdue", "normalized_urgency": 0.9
            },
            {
                "id": "release", "deadline": "not a date", "urgency_score": 4,
                "dependencies": ["fix-prod"], "status": "pending", "normalized_urgency": 0.4
            }
        ],
        "completed_task_ids": ["triage"]
    });

    let (resp, all) = handle_request_annotated(&engine, body)?;

    let ids: Vec<_> = resp.prioritized_tasks.iter().map(Task::label).collect();
    assert_eq!(ids, vec!["fix-prod", "write-docs"]);
    assert_eq!(resp.prioritized_tasks[1].extra["owner"], "sam");
    assert!(all[2].is_blocked());
    assert_eq!(resp.feature_set.len(), 5);
    Ok(())
}

fn demos_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("demos")
}

/// Demo artifact + batch shipped with the repo: one blocked task, one bad
/// feature, two ranked.
#[test]
fn demo_batch_against_demo_model() -> anyhow::Result<()> {
    let artifact = ScoringArtifact::load(demos_dir().join("model.json"))?;
    let engine = Engine::from_artifact(artifact)?;

    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(demos_dir().join("batch.json"))?)?;
    let mut request = taskrank_core::PrioritizeRequest::from_json(body)?;

    let today = NaiveDate::from_ymd_opt(2026, 10, 18)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let ranked =
        engine.prioritize_at(&mut request.tasks, &request.completed_task_ids, today)?;

    let ids: Vec<_> = ranked.iter().map(Task::label).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert!(request.tasks[2].is_blocked());
    assert!(
        request.tasks[3]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("urgency_score"))
    );
    assert_eq!(request.tasks[3].status_str(), Some("pending"));
    Ok(())
}
