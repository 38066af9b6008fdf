//! Tests for the history store (in-memory DB helper from db).

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::history::db::open_memory;
use crate::history::RunHistory;
use crate::retry::TransferError;
use crate::scheduler::RunSummary;
use crate::task::{AttemptRecord, DownloadTask, TaskSpec, TaskStatus};

fn summary() -> RunSummary {
    let mut ok = DownloadTask::from_spec(
        TaskSpec::new("ep1", "https://cdn.example/ep1.mp3", "/media/ep1.mp3"),
        3,
    );
    ok.status = TaskStatus::Completed;
    ok.attempt_count = 1;
    ok.bytes_transferred = 1000;
    ok.attempts.push(AttemptRecord {
        attempt: 1,
        started_at: SystemTime::now(),
        elapsed: Duration::from_millis(40),
        bytes_received: 1000,
        error: None,
    });

    let mut bad = DownloadTask::from_spec(
        TaskSpec::new("ep2", "https://cdn.example/ep2.mp3", PathBuf::from("/media/ep2.mp3")),
        3,
    );
    bad.status = TaskStatus::FailedTerminal;
    bad.attempt_count = 3;
    bad.bytes_transferred = 250;
    bad.last_error = Some(TransferError::Connection {
        status: Some(503),
        message: "HTTP 503".into(),
    });

    RunSummary {
        started_at: SystemTime::now(),
        total_submitted: 2,
        completed: 1,
        failed_terminal: 1,
        not_attempted: Vec::new(),
        interrupted: Vec::new(),
        total_bytes: 1250,
        elapsed_ms: 80,
        average_speed: 15_625.0,
        peak_active: 2,
        cancelled: false,
        tasks: vec![ok, bad],
    }
}

#[tokio::test]
async fn record_and_read_back_run() {
    let db = open_memory().await.unwrap();
    let run_id = db.record_run(&summary()).await.unwrap();

    let runs = db.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run_id);
    assert_eq!(runs[0].total_submitted, 2);
    assert_eq!(runs[0].completed, 1);
    assert_eq!(runs[0].failed_terminal, 1);
    assert_eq!(runs[0].total_bytes, 1250);
    assert!(!runs[0].cancelled);

    let outcomes = db.task_outcomes(run_id).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].task_id, "ep1");
    assert_eq!(outcomes[0].status, TaskStatus::Completed);
    assert_eq!(outcomes[0].bytes_received, 1000);
    assert_eq!(outcomes[0].error_kind, None);
    assert_eq!(outcomes[1].status, TaskStatus::FailedTerminal);
    assert_eq!(outcomes[1].attempts, 3);
    assert_eq!(outcomes[1].error_kind.as_deref(), Some("connection"));
    assert_eq!(outcomes[1].final_size, 250);
}

#[tokio::test]
async fn list_runs_newest_first_with_limit() {
    let db = open_memory().await.unwrap();
    let first = db.record_run(&summary()).await.unwrap();
    let mut cancelled = summary();
    cancelled.cancelled = true;
    cancelled.not_attempted = vec!["x".into()];
    let second = db.record_run(&cancelled).await.unwrap();

    let runs = db.list_runs(10).await.unwrap();
    assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), [second, first]);
    assert!(runs[0].cancelled);
    assert_eq!(runs[0].unfinished, 1);

    assert_eq!(db.list_runs(1).await.unwrap().len(), 1);
    assert!(db.get_run(first).await.unwrap().is_some());
    assert!(db.get_run(first + 100).await.unwrap().is_none());
    assert!(db.task_outcomes(first + 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn open_at_creates_file_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state dir/history.db");
    let id = {
        let db = RunHistory::open_at(&path).await.unwrap();
        db.record_run(&summary()).await.unwrap()
    };
    assert!(path.exists());
    let db = RunHistory::open_at(&path).await.unwrap();
    assert_eq!(db.list_runs(5).await.unwrap()[0].id, id);
}
