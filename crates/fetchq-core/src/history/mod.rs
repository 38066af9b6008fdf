//! Run history (SQLite via sqlx).
//!
//! One row per finished run and one row per task outcome, so past batches
//! can be listed and inspected after the process exits.

pub mod db;
mod runs;
pub mod types;

pub use db::RunHistory;
pub use types::*;

#[cfg(test)]
mod tests;
