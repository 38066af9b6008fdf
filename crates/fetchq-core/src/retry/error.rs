//! Task-local transfer errors.

use serde::Serialize;
use std::time::Duration;

/// Why one attempt of a task failed. Every variant is task-local and goes
/// through the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    /// Metadata probe failed and the fallback request got nowhere either.
    #[error("probe failed: {message}")]
    Probe { message: String },

    /// No usable response: DNS, connect, TLS, or an HTTP error status.
    #[error("connection failed: {message}")]
    Connection { status: Option<u32>, message: String },

    /// The body stopped before the expected end.
    #[error("stream interrupted after {received} bytes: {message}")]
    StreamInterrupted {
        received: u64,
        expected: Option<u64>,
        message: String,
    },

    /// Local I/O failed for this task's destination.
    #[error("filesystem: {message}")]
    Filesystem { message: String },

    #[error("attempt timed out after {}ms", limit.as_millis())]
    Timeout { limit: Duration },

    /// Remote answered a resume request with something other than the requested range.
    #[error("unsupported range response: {message}")]
    UnsupportedRange { message: String },
}

impl TransferError {
    pub fn filesystem(context: impl std::fmt::Display, err: &std::io::Error) -> Self {
        TransferError::Filesystem {
            message: format!("{}: {}", context, err),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            TransferError::Probe { .. } => FailureKind::Probe,
            TransferError::Connection { .. } => FailureKind::Connection,
            TransferError::StreamInterrupted { .. } => FailureKind::StreamInterrupted,
            TransferError::Filesystem { .. } => FailureKind::Filesystem,
            TransferError::Timeout { .. } => FailureKind::Timeout,
            TransferError::UnsupportedRange { .. } => FailureKind::UnsupportedRange,
        }
    }
}

/// Flat classification of a `TransferError`, used in events, summaries and history rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Probe,
    Connection,
    StreamInterrupted,
    Filesystem,
    Timeout,
    UnsupportedRange,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Probe => "probe",
            FailureKind::Connection => "connection",
            FailureKind::StreamInterrupted => "stream_interrupted",
            FailureKind::Filesystem => "filesystem",
            FailureKind::Timeout => "timeout",
            FailureKind::UnsupportedRange => "unsupported_range",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "probe" => Some(FailureKind::Probe),
            "connection" => Some(FailureKind::Connection),
            "stream_interrupted" => Some(FailureKind::StreamInterrupted),
            "filesystem" => Some(FailureKind::Filesystem),
            "timeout" => Some(FailureKind::Timeout),
            "unsupported_range" => Some(FailureKind::UnsupportedRange),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
