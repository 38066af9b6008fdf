//! Tests for the run subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["fetchq", "run", "batch.json"]) {
        CliCommand::Run {
            manifest,
            concurrency,
            max_attempts,
            no_resume,
            timeout_secs,
            base_dir,
            no_history,
            json,
        } => {
            assert_eq!(manifest, Path::new("batch.json"));
            assert!(concurrency.is_none());
            assert!(max_attempts.is_none());
            assert!(!no_resume);
            assert!(timeout_secs.is_none());
            assert!(base_dir.is_none());
            assert!(!no_history);
            assert!(!json);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_all_flags() {
    match parse(&[
        "fetchq",
        "run",
        "batch.toml",
        "--concurrency",
        "6",
        "--max-attempts",
        "4",
        "--no-resume",
        "--timeout-secs",
        "120",
        "--base-dir",
        "/srv/media",
        "--no-history",
        "--json",
    ]) {
        CliCommand::Run {
            concurrency,
            max_attempts,
            no_resume,
            timeout_secs,
            base_dir,
            no_history,
            json,
            ..
        } => {
            assert_eq!(concurrency, Some(6));
            assert_eq!(max_attempts, Some(4));
            assert!(no_resume);
            assert_eq!(timeout_secs, Some(120));
            assert_eq!(base_dir.as_deref(), Some(Path::new("/srv/media")));
            assert!(no_history);
            assert!(json);
        }
        _ => panic!("expected Run with flags"),
    }
}

#[test]
fn cli_parse_run_requires_manifest() {
    assert!(Cli::try_parse_from(["fetchq", "run"]).is_err());
    assert!(Cli::try_parse_from(["fetchq", "run", "b.json", "--concurrency", "many"]).is_err());
}
