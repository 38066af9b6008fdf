//! Map libcurl errors and HTTP statuses onto `TransferError`.

use std::time::Duration;

use super::error::TransferError;

/// Classify a curl error raised during a transfer.
///
/// `received` is the number of body bytes that had arrived before the error;
/// `limit` is the per-attempt timeout that was in force.
pub fn classify_curl_error(e: &curl::Error, received: u64, limit: Duration) -> TransferError {
    if e.is_operation_timedout() {
        return TransferError::Timeout { limit };
    }
    if e.is_partial_file() {
        return TransferError::StreamInterrupted {
            received,
            expected: None,
            message: e.to_string(),
        };
    }
    let before_body = e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_ssl_connect_error()
        || e.is_send_error();
    if before_body || received == 0 {
        return TransferError::Connection {
            status: None,
            message: e.to_string(),
        };
    }
    TransferError::StreamInterrupted {
        received,
        expected: None,
        message: e.to_string(),
    }
}

/// Classify a non-2xx HTTP status.
pub fn classify_http_status(code: u32) -> TransferError {
    match code {
        416 => TransferError::UnsupportedRange {
            message: "HTTP 416 Range Not Satisfiable".into(),
        },
        _ => TransferError::Connection {
            status: Some(code),
            message: format!("HTTP {}", code),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FailureKind;

    const LIMIT: Duration = Duration::from_secs(5);

    #[test]
    fn timeout_is_timeout_regardless_of_progress() {
        let e = curl::Error::new(28);
        assert_eq!(classify_curl_error(&e, 0, LIMIT).kind(), FailureKind::Timeout);
        assert_eq!(classify_curl_error(&e, 4096, LIMIT).kind(), FailureKind::Timeout);
    }

    #[test]
    fn connect_failure_is_connection() {
        let e = curl::Error::new(7);
        assert_eq!(classify_curl_error(&e, 0, LIMIT).kind(), FailureKind::Connection);
    }

    #[test]
    fn partial_file_is_stream_interrupted() {
        let e = curl::Error::new(18);
        let err = classify_curl_error(&e, 100, LIMIT);
        assert_eq!(err.kind(), FailureKind::StreamInterrupted);
    }

    #[test]
    fn recv_error_depends_on_received_bytes() {
        let e = curl::Error::new(56);
        assert_eq!(classify_curl_error(&e, 0, LIMIT).kind(), FailureKind::Connection);
        assert_eq!(
            classify_curl_error(&e, 10, LIMIT).kind(),
            FailureKind::StreamInterrupted
        );
    }

    #[test]
    fn http_statuses() {
        assert_eq!(classify_http_status(416).kind(), FailureKind::UnsupportedRange);
        match classify_http_status(503) {
            TransferError::Connection { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(classify_http_status(404).kind(), FailureKind::Connection);
    }
}
