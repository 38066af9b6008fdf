#![allow(dead_code)]

pub mod range_server;

use fetchq_core::EngineConfig;

/// Deterministic test body of `len` bytes.
pub fn body(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Config with short timeouts and near-instant retry backoff.
pub fn fast_config(concurrency_limit: usize) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.concurrency_limit = concurrency_limit;
    cfg.connect_timeout_ms = 2_000;
    cfg.probe_timeout_ms = 2_000;
    cfg.per_attempt_timeout_ms = 10_000;
    cfg.progress_interval_ms = 10;
    cfg.retry.base_delay_ms = 10;
    cfg.retry.max_delay_ms = 50;
    cfg
}
