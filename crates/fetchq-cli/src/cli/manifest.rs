//! Batch manifests: the list of tasks handed to `fetchq run`.
//!
//! JSON is either a bare array of tasks or `{ "tasks": [...] }`; TOML uses
//! `[[tasks]]` tables. Each task has `id`, `url` (or `source_url`), `path`
//! (or `destination`) and an optional `declared_size`.

use anyhow::{Context, Result};
use fetchq_core::TaskSpec;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Manifest {
    tasks: Vec<TaskSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonManifest {
    List(Vec<TaskSpec>),
    Wrapped(Manifest),
}

pub fn load_manifest(path: &Path) -> Result<Vec<TaskSpec>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read manifest: {}", path.display()))?;
    let is_toml = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let tasks = if is_toml {
        parse_toml(&data)
    } else {
        parse_json(&data)
    }
    .with_context(|| format!("parse manifest: {}", path.display()))?;
    if tasks.is_empty() {
        anyhow::bail!("manifest {} contains no tasks", path.display());
    }
    Ok(tasks)
}

fn parse_json(data: &str) -> Result<Vec<TaskSpec>> {
    Ok(match serde_json::from_str::<JsonManifest>(data)? {
        JsonManifest::List(tasks) => tasks,
        JsonManifest::Wrapped(m) => m.tasks,
    })
}

fn parse_toml(data: &str) -> Result<Vec<TaskSpec>> {
    Ok(toml::from_str::<Manifest>(data)?.tasks)
}
