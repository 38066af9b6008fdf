//! `fetchq probe` – show what the server reports about a URL.

use anyhow::{Context, Result};
use fetchq_core::probe::{self, ProbeOptions};
use fetchq_core::EngineConfig;

use super::mib;

pub async fn run_probe(cfg: &EngineConfig, url: &str) -> Result<()> {
    let opts = ProbeOptions {
        connect_timeout: cfg.connect_timeout(),
        timeout: cfg.probe_timeout(),
    };
    let target = url.to_string();
    let result = tokio::task::spawn_blocking(move || probe::probe(&target, &opts))
        .await
        .context("probe task panicked")?
        .with_context(|| format!("probe {}", url))?;

    let size = result
        .content_length
        .map(|n| format!("{} bytes ({})", n, mib(n)))
        .unwrap_or_else(|| "unknown".to_string());
    println!("URL:     {}", url);
    println!("Size:    {}", size);
    println!(
        "Resume:  {}",
        if result.accept_ranges { "supported (Accept-Ranges: bytes)" } else { "not advertised" }
    );
    println!(
        "Method:  {}",
        if result.via_range_get { "ranged GET (HEAD rejected)" } else { "HEAD" }
    );
    Ok(())
}
