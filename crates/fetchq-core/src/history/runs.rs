//! Record and read runs.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::time::SystemTime;

use super::db::{unix_seconds, RunHistory};
use super::types::{RunId, RunRecord, TaskOutcome};
use crate::scheduler::RunSummary;
use crate::task::TaskStatus;

impl RunHistory {
    /// Store a finished run and all of its task outcomes in one transaction.
    pub async fn record_run(&self, summary: &RunSummary) -> Result<RunId> {
        let finished_at = unix_seconds(SystemTime::now());
        let unfinished = (summary.not_attempted.len() + summary.interrupted.len()) as i64;
        let mut tx = self.pool.begin().await?;

        let run_id = sqlx::query(
            r#"
            INSERT INTO runs (
                started_at, finished_at, total_submitted, completed,
                failed_terminal, unfinished, total_bytes, elapsed_ms, cancelled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(unix_seconds(summary.started_at))
        .bind(finished_at)
        .bind(summary.total_submitted as i64)
        .bind(summary.completed as i64)
        .bind(summary.failed_terminal as i64)
        .bind(unfinished)
        .bind(summary.total_bytes as i64)
        .bind(summary.elapsed_ms as i64)
        .bind(summary.cancelled)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (seq, task) in summary.tasks.iter().enumerate() {
            let (error_kind, error_message) = match &task.last_error {
                Some(e) => (Some(e.kind().as_str()), Some(e.to_string())),
                None => (None, None),
            };
            sqlx::query(
                r#"
                INSERT INTO task_outcomes (
                    run_id, seq, task_id, source_url, destination, status,
                    attempts, final_size, bytes_received, error_kind, error_message
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(run_id)
            .bind(seq as i64)
            .bind(&task.id)
            .bind(&task.source_url)
            .bind(task.destination.to_string_lossy().into_owned())
            .bind(task.status.as_str())
            .bind(i64::from(task.attempt_count))
            .bind(task.bytes_transferred as i64)
            .bind(task.bytes_received_total() as i64)
            .bind(error_kind)
            .bind(error_message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(run_id, tasks = summary.tasks.len(), "run recorded");
        Ok(run_id)
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, started_at, finished_at, total_submitted, completed,
                   failed_terminal, unfinished, total_bytes, elapsed_ms, cancelled
            FROM runs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(run_from_row).collect())
    }

    pub async fn get_run(&self, id: RunId) -> Result<Option<RunRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, started_at, finished_at, total_submitted, completed,
                   failed_terminal, unfinished, total_bytes, elapsed_ms, cancelled
            FROM runs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(run_from_row))
    }

    /// Task outcomes of one run, in submission order.
    pub async fn task_outcomes(&self, run_id: RunId) -> Result<Vec<TaskOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT task_id, source_url, destination, status, attempts,
                   final_size, bytes_received, error_kind, error_message
            FROM task_outcomes
            WHERE run_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            out.push(TaskOutcome {
                task_id: row.get("task_id"),
                source_url: row.get("source_url"),
                destination: row.get("destination"),
                status: TaskStatus::from_str(&status),
                attempts: row.get("attempts"),
                final_size: row.get("final_size"),
                bytes_received: row.get("bytes_received"),
                error_kind: row.get("error_kind"),
                error_message: row.get("error_message"),
            });
        }
        Ok(out)
    }
}

fn run_from_row(row: &SqliteRow) -> RunRecord {
    RunRecord {
        id: row.get("id"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        total_submitted: row.get("total_submitted"),
        completed: row.get("completed"),
        failed_terminal: row.get("failed_terminal"),
        unfinished: row.get("unfinished"),
        total_bytes: row.get("total_bytes"),
        elapsed_ms: row.get("elapsed_ms"),
        cancelled: row.get("cancelled"),
    }
}
