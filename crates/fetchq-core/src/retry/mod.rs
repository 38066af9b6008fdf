//! Failure classification and retry decisions.
//!
//! Workers classify what went wrong (`TransferError`); the coordinator asks the
//! `RetryPolicy` whether the task goes back to the queue or is finished as
//! failed. Workers never retry on their own.

mod classify;
mod error;
mod policy;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::{FailureKind, TransferError};
pub use policy::{RetryDecision, RetryPolicy};
