//! Decide where an attempt starts: skip, resume at the local size, or byte 0.

use std::io;
use std::path::Path;

use crate::probe::{self, ProbeError, ProbeOptions, ProbeResult};
use crate::storage;

/// Outcome of planning one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Offset of the first byte to request (0 = full download).
    pub start_byte: u64,
    /// Destination already holds the whole remote file.
    pub skip: bool,
    /// Size of the destination before the attempt, if it exists.
    pub local_size: Option<u64>,
    /// Remote size from the probe, if reported.
    pub remote_size: Option<u64>,
    pub ranges_advertised: bool,
    /// Set when the probe failed; the attempt then runs a full GET.
    pub probe_error: Option<String>,
}

impl ResumePlan {
    pub fn is_resume(&self) -> bool {
        self.start_byte > 0
    }
}

/// Combines local file state with a metadata probe.
#[derive(Debug, Clone, Copy)]
pub struct ResumePlanner {
    probe: ProbeOptions,
    resume_enabled: bool,
}

impl ResumePlanner {
    pub fn new(probe: ProbeOptions, resume_enabled: bool) -> Self {
        Self {
            probe,
            resume_enabled,
        }
    }

    /// Probe `source_url` and inspect `destination`. Blocking.
    ///
    /// Only reading the local file can fail; probe failures are folded into
    /// the plan.
    pub fn plan(&self, destination: &Path, source_url: &str) -> io::Result<ResumePlan> {
        let local = storage::local_size(destination)?;
        let remote = probe::probe(source_url, &self.probe);
        if let Err(e) = &remote {
            tracing::debug!(url = source_url, error = %e, "probe failed; planning full download");
        }
        Ok(Self::decide(local, &remote, self.resume_enabled))
    }

    /// Pure decision over local size and probe result.
    pub fn decide(
        local: Option<u64>,
        remote: &Result<ProbeResult, ProbeError>,
        resume_enabled: bool,
    ) -> ResumePlan {
        let probe = match remote {
            Ok(p) => p,
            Err(e) => {
                return ResumePlan {
                    start_byte: 0,
                    skip: false,
                    local_size: local,
                    remote_size: None,
                    ranges_advertised: false,
                    probe_error: Some(e.to_string()),
                }
            }
        };

        let mut plan = ResumePlan {
            start_byte: 0,
            skip: false,
            local_size: local,
            remote_size: probe.content_length,
            ranges_advertised: probe.accept_ranges,
            probe_error: None,
        };

        match (local, probe.content_length) {
            (Some(l), Some(r)) if l >= r => plan.skip = true,
            (Some(l), _) if resume_enabled && l > 0 && probe.accept_ranges => plan.start_byte = l,
            _ => {}
        }
        plan
    }
}
