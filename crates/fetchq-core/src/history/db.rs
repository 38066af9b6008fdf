//! SQLite-backed history database.
//!
//! Handles connection and migrations. Run reads and writes live in `runs`.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Default location: `~/.local/state/fetchq/history.db`.
pub fn default_history_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.get_state_home().join("history.db"))
}

/// Handle to the run history database.
#[derive(Clone)]
pub struct RunHistory {
    pub(crate) pool: Pool<Sqlite>,
}

impl RunHistory {
    /// Open (or create) the default history database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(default_history_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open history db {}", path.display()))?;
        let db = RunHistory { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                total_submitted INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                failed_terminal INTEGER NOT NULL,
                unfinished INTEGER NOT NULL DEFAULT 0,
                total_bytes INTEGER NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                cancelled INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_outcomes (
                run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                task_id TEXT NOT NULL,
                source_url TEXT NOT NULL,
                destination TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                final_size INTEGER NOT NULL,
                bytes_received INTEGER NOT NULL,
                error_kind TEXT,
                error_message TEXT,
                PRIMARY KEY (run_id, seq)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Unix seconds for `t` (0 if before the epoch).
pub(crate) fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<RunHistory> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = RunHistory { pool };
    db.migrate().await?;
    Ok(db)
}
