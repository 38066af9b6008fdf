//! Parse HTTP response header lines.

use super::ProbeResult;

/// Append one raw header line from curl, starting a fresh block on each
/// status line so only the final response of a redirect chain is kept.
pub(crate) fn push_header_line(lines: &mut Vec<String>, data: &[u8]) {
    if let Ok(s) = std::str::from_utf8(data) {
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            lines.clear();
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
}

/// Status code from the first `HTTP/x y reason` line.
pub(crate) fn parse_http_status(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

/// Value of the last header named `name` (case-insensitive).
pub(crate) fn header_value<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines
        .iter()
        .filter_map(|l| l.split_once(':'))
        .filter(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
        .last()
}

/// Parsed `Content-Range: bytes start-end/total` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// `None` when the server sent `*` for the total.
    pub total: Option<u64>,
}

pub(crate) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.trim().split_once('-')?;
    Some(ContentRange {
        start: start.trim().parse().ok()?,
        end: end.trim().parse().ok()?,
        total: total.trim().parse().ok(),
    })
}

/// Total from the `bytes */total` form sent with 416 responses.
pub(crate) fn parse_unsatisfied_range(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    rest.strip_prefix("*/")?.trim().parse().ok()
}

/// Parse collected header lines into a `ProbeResult`.
pub(crate) fn parse_headers(lines: &[String]) -> ProbeResult {
    let content_length = header_value(lines, "content-length").and_then(|v| v.parse::<u64>().ok());
    let accept_ranges = header_value(lines, "accept-ranges")
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    ProbeResult {
        content_length,
        accept_ranges,
        via_range_get: false,
    }
}
