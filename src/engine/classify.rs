use crate::domain::ErrorKind;
use std::error::Error as StdError;

const CORS_INDICATORS: [&str; 4] = ["cors", "cross-origin", "failed to fetch", "access-control"];
const NETWORK_INDICATORS: [&str; 4] = ["network", "dns", "refused", "unreachable"];

/// Maps a failed request to exactly one error category. Total and
/// deterministic: every failure gets a category, nothing panics.
pub fn classify_failure(err: &reqwest::Error, aborted: bool) -> ErrorKind {
    if aborted {
        return ErrorKind::Aborted;
    }
    if err.is_timeout() {
        return ErrorKind::Timeout;
    }

    let message = full_message(err);
    match matched_indicator(&message) {
        Some(kind) => kind,
        None if err.is_connect() => ErrorKind::Network,
        // Browsers deliberately obscure the real cause of most blocked
        // cross-origin requests, so opaque transport failures bucket as
        // CORS. Keep this approximate; it models that opacity.
        None => ErrorKind::Cors,
    }
}

/// Status-family classification for a completed response. 2xx/3xx is not
/// an error.
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    if (400..500).contains(&status) {
        Some(ErrorKind::Http4xx)
    } else if status >= 500 {
        Some(ErrorKind::Http5xx)
    } else {
        None
    }
}

/// Substring heuristic over a lowercased failure message.
pub fn classify_message(message: &str) -> ErrorKind {
    matched_indicator(&message.to_ascii_lowercase()).unwrap_or(ErrorKind::Cors)
}

fn matched_indicator(message: &str) -> Option<ErrorKind> {
    if CORS_INDICATORS.iter().any(|needle| message.contains(needle)) {
        return Some(ErrorKind::Cors);
    }
    if NETWORK_INDICATORS
        .iter()
        .any(|needle| message.contains(needle))
    {
        return Some(ErrorKind::Network);
    }
    None
}

// reqwest nests the interesting part ("connection refused", "dns error")
// inside the source chain, so flatten the whole chain before matching.
fn full_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string().to_ascii_lowercase();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push(' ');
        message.push_str(&cause.to_string().to_ascii_lowercase());
        source = cause.source();
    }
    message
}
