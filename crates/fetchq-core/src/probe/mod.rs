//! Remote metadata probe.
//!
//! Uses the curl crate (libcurl) to learn the remote size and whether the
//! server advertises `Accept-Ranges: bytes`, without transferring the body.
//! HEAD first; servers that reject HEAD get a `Range: bytes=0-0` GET instead
//! and the total is read from `Content-Range`.

pub(crate) mod parse;

use std::time::Duration;

/// Result of a metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes, if the server reported one.
    pub content_length: Option<u64>,
    /// True if the server advertised byte-range support.
    pub accept_ranges: bool,
    /// True if the size came from the ranged-GET fallback rather than HEAD.
    pub via_range_get: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Transport(String),
    #[error("probe returned HTTP {0}")]
    Status(u32),
}

/// Timeouts applied to probe requests.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Probes `url` for size and range support. Follows redirects.
/// Blocks the current thread; call from a worker thread or `spawn_blocking`.
pub fn probe(url: &str, opts: &ProbeOptions) -> Result<ProbeResult, ProbeError> {
    match head(url, opts) {
        Ok(result) => Ok(result),
        Err(ProbeError::Status(code)) => {
            tracing::debug!(url, status = code, "HEAD rejected, falling back to ranged GET probe");
            range_get(url, opts)
        }
        Err(e) => Err(e),
    }
}

fn new_easy(url: &str, opts: &ProbeOptions) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.timeout)?;
    Ok(easy)
}

fn head(url: &str, opts: &ProbeOptions) -> Result<ProbeResult, ProbeError> {
    let transport = |e: curl::Error| ProbeError::Transport(e.to_string());
    let mut headers: Vec<String> = Vec::new();

    let mut easy = new_easy(url, opts).map_err(transport)?;
    easy.nobody(true).map_err(transport)?;
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                parse::push_header_line(&mut headers, data);
                true
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }

    let code = easy.response_code().map_err(transport)?;
    if !(200..300).contains(&code) {
        return Err(ProbeError::Status(code));
    }
    Ok(parse::parse_headers(&headers))
}

fn range_get(url: &str, opts: &ProbeOptions) -> Result<ProbeResult, ProbeError> {
    let transport = |e: curl::Error| ProbeError::Transport(e.to_string());
    let mut headers: Vec<String> = Vec::new();

    let mut easy = new_easy(url, opts).map_err(transport)?;
    easy.range("0-0").map_err(transport)?;
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                parse::push_header_line(&mut headers, data);
                true
            })
            .map_err(transport)?;
        // Only headers matter; stop as soon as a body shows up (a server that
        // ignores Range would otherwise stream the whole file).
        transfer
            .write_function(|_data| Ok(0))
            .map_err(transport)?;
        transfer.perform()
    };
    if let Err(e) = perform_result {
        if !e.is_write_error() {
            return Err(transport(e));
        }
    }

    let code = easy.response_code().map_err(transport)?;
    match code {
        206 => {
            let total = parse::header_value(&headers, "content-range")
                .and_then(parse::parse_content_range)
                .and_then(|r| r.total);
            Ok(ProbeResult {
                content_length: total,
                accept_ranges: true,
                via_range_get: true,
            })
        }
        200..=299 => {
            let mut result = parse::parse_headers(&headers);
            result.accept_ranges = false;
            result.via_range_get = true;
            Ok(result)
        }
        _ => Err(ProbeError::Status(code)),
    }
}
