//! Easy2 handler for one download attempt.
//! Validates the response on the first body chunk, then streams into the sink.

use std::sync::mpsc::SyncSender;
use std::time::{Duration, Instant};

use crate::event::{ProgressSample, WorkerId, WorkerMessage};
use crate::probe::parse::{
    header_value, parse_content_range, parse_http_status, parse_unsatisfied_range, push_header_line,
};
use crate::retry::{classify_http_status, TransferError};
use crate::storage::FileSink;

/// Throttled progress emission for one attempt.
///
/// Samples go out with `try_send`; a full channel drops the sample and the
/// unsent bytes roll into the next delta.
pub(crate) struct ProgressReporter {
    tx: Option<SyncSender<WorkerMessage>>,
    worker: WorkerId,
    task_id: String,
    interval: Duration,
    last_sent_at: Instant,
    last_sent_received: u64,
}

impl ProgressReporter {
    pub(crate) fn new(
        tx: Option<SyncSender<WorkerMessage>>,
        worker: WorkerId,
        task_id: String,
        interval: Duration,
    ) -> Self {
        Self {
            tx,
            worker,
            task_id,
            interval,
            last_sent_at: Instant::now(),
            last_sent_received: 0,
        }
    }

    fn maybe_emit(&mut self, bytes_transferred: u64, received: u64, total: Option<u64>) {
        let Some(tx) = &self.tx else { return };
        let now = Instant::now();
        let window = now.duration_since(self.last_sent_at);
        if window < self.interval {
            return;
        }
        let delta = received.saturating_sub(self.last_sent_received);
        let secs = window.as_secs_f64();
        let sample = ProgressSample {
            bytes_transferred,
            bytes_delta: delta,
            total,
            bytes_per_sec: if secs > 0.0 { delta as f64 / secs } else { 0.0 },
            at: now,
        };
        let msg = WorkerMessage::Progress {
            worker: self.worker,
            task_id: self.task_id.clone(),
            sample,
        };
        if tx.try_send(msg).is_ok() {
            self.last_sent_at = now;
            self.last_sent_received = received;
        }
    }
}

/// Handler state for one attempt. Implements curl's Handler for Easy2.
pub(crate) struct TransferHandler {
    pub(super) sink: FileSink,
    pub(super) requested_start: u64,
    /// Size reported by the probe, if any.
    pub(super) probed_total: Option<u64>,
    pub(super) response_headers: Vec<String>,
    /// None = response not yet checked.
    pub(super) checked: Option<bool>,
    /// Error that made the handler abort the transfer.
    pub(super) abort: Option<TransferError>,
    pub(super) bytes_received: u64,
    pub(super) restarted: bool,
    /// A 416 reported the remote size equal to the resume offset: the
    /// destination is already complete and the body is ignored.
    pub(super) satisfied: bool,
    /// Expected final size of the destination, once known.
    pub(super) expected_total: Option<u64>,
    progress: ProgressReporter,
}

impl TransferHandler {
    pub(crate) fn new(
        sink: FileSink,
        requested_start: u64,
        probed_total: Option<u64>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            sink,
            requested_start,
            probed_total,
            response_headers: Vec::new(),
            checked: None,
            abort: None,
            bytes_received: 0,
            restarted: false,
            satisfied: false,
            expected_total: probed_total,
            progress,
        }
    }

    /// Validate status and range headers of the final response.
    ///
    /// Runs once, on the first body chunk or after an empty body. The file on
    /// disk is only changed here, once a response is accepted: a resumed
    /// request answered from byte 0 restarts the sink, and a resume the server
    /// cannot honor empties it so the next attempt starts fresh. Any other
    /// failure leaves the partial file untouched.
    pub(super) fn check_response(&mut self) -> Result<(), TransferError> {
        if let Some(ok) = self.checked {
            return match (ok, &self.abort) {
                (false, Some(e)) => Err(e.clone()),
                _ => Ok(()),
            };
        }
        let result = self.evaluate();
        self.checked = Some(result.is_ok());
        if let Err(e) = &result {
            self.abort = Some(e.clone());
        }
        result
    }

    fn evaluate(&mut self) -> Result<(), TransferError> {
        let status = parse_http_status(&self.response_headers).unwrap_or(200);
        let content_length =
            header_value(&self.response_headers, "content-length").and_then(|v| v.parse::<u64>().ok());

        match status {
            206 => {
                let range = header_value(&self.response_headers, "content-range")
                    .and_then(parse_content_range);
                let Some(range) = range else {
                    self.discard_resume();
                    return Err(TransferError::UnsupportedRange {
                        message: "206 response without a usable Content-Range".into(),
                    });
                };
                if range.start == self.requested_start {
                    self.sink
                        .discard_tail()
                        .map_err(|e| TransferError::filesystem("trim destination", &e))?;
                } else if range.start == 0 {
                    self.restart_from_zero()?;
                } else {
                    self.discard_resume();
                    return Err(TransferError::UnsupportedRange {
                        message: format!(
                            "requested offset {} but server sent range starting at {}",
                            self.requested_start, range.start
                        ),
                    });
                }
                self.expected_total = range
                    .total
                    .or_else(|| content_length.map(|n| range.start + n))
                    .or(self.probed_total);
                Ok(())
            }
            200..=299 => {
                if self.requested_start > 0 {
                    self.restart_from_zero()?;
                } else {
                    self.sink
                        .discard_tail()
                        .map_err(|e| TransferError::filesystem("trim destination", &e))?;
                }
                self.expected_total = content_length.or(self.probed_total);
                Ok(())
            }
            416 => {
                let remote_total = header_value(&self.response_headers, "content-range")
                    .and_then(parse_unsatisfied_range);
                if self.requested_start > 0 && remote_total == Some(self.requested_start) {
                    tracing::debug!(
                        path = %self.sink.path().display(),
                        size = self.requested_start,
                        "range not satisfiable at end of file; destination already complete"
                    );
                    self.satisfied = true;
                    self.expected_total = remote_total;
                    return Ok(());
                }
                self.discard_resume();
                Err(classify_http_status(416))
            }
            code => Err(classify_http_status(code)),
        }
    }

    /// The server answered a resumed request from byte 0; keep the body.
    fn restart_from_zero(&mut self) -> Result<(), TransferError> {
        tracing::debug!(
            path = %self.sink.path().display(),
            offset = self.requested_start,
            "server ignored range request; restarting from byte 0"
        );
        self.sink
            .restart()
            .map_err(|e| TransferError::filesystem("truncate for restart", &e))?;
        self.restarted = true;
        Ok(())
    }

    /// Empty the destination after a resume the server cannot serve, so the
    /// next attempt plans a full download.
    fn discard_resume(&mut self) {
        if self.requested_start == 0 {
            return;
        }
        if let Err(e) = self.sink.restart() {
            tracing::warn!(path = %self.sink.path().display(), "truncate after rejected resume failed: {}", e);
        }
    }
}

impl curl::easy::Handler for TransferHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        push_header_line(&mut self.response_headers, data);
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        if self.check_response().is_err() {
            return Ok(0);
        }
        if self.satisfied {
            return Ok(data.len());
        }
        match self.sink.write(data) {
            Ok(()) => {
                self.bytes_received += data.len() as u64;
                self.progress
                    .maybe_emit(self.sink.len(), self.bytes_received, self.expected_total);
                Ok(data.len())
            }
            Err(e) => {
                self.abort = Some(TransferError::filesystem(
                    format!("write {}", self.sink.path().display()),
                    &e,
                ));
                Ok(0)
            }
        }
    }
}
