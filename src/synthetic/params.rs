//! Query-string coercion for synthetic-behavior parameters.
//!
//! # Responsibilities
//! - Parse `sleep`/`stress` durations, `status` codes and integer knobs
//! - Substitute fixed defaults for malformed input
//!
//! # Design Decisions
//! - Coercion is infallible: a debug server must stay maximally permissive
//! - Only the first value of a repeated key is honored
//! - A key without a value (`?echo`) still counts as present

use std::borrow::Cow;
use std::time::Duration;

use axum::http::StatusCode;

/// Delay used when a `sleep` or `stress` value cannot be parsed.
pub const FALLBACK_DURATION: Duration = Duration::from_secs(1);

/// Seconds between stream chunks when `interval` is absent or malformed.
pub const DEFAULT_STREAM_INTERVAL_SECS: i64 = 1;

/// Stream chunk count when `count` is absent.
pub const DEFAULT_STREAM_COUNT: i64 = 5;

/// Stream chunk count when `count` is present but malformed.
pub const MALFORMED_STREAM_COUNT: i64 = 1;

/// Parse a duration expression such as `5s`, `200ms` or `1m 30s`.
///
/// A leading sign is accepted; negative durations clamp to zero. Falls back
/// to one second on malformed input. A bare `0` is zero.
pub fn parse_duration(raw: &str) -> Duration {
    let (negative, magnitude) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let parsed = if magnitude == "0" {
        Ok(Duration::ZERO)
    } else {
        humantime::parse_duration(magnitude)
    };
    match parsed {
        Ok(_) if negative => Duration::ZERO,
        Ok(duration) => duration,
        Err(_) => FALLBACK_DURATION,
    }
}

/// Parse a forced response status, falling back to 200.
pub fn parse_status(raw: &str) -> StatusCode {
    raw.parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK)
}

/// Parse a decimal integer, falling back to the call-site default.
pub fn parse_int_or(raw: &str, default: i64) -> i64 {
    raw.parse().unwrap_or(default)
}

/// Request-scoped synthetic-behavior settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticParams {
    /// Delay applied before any other processing.
    pub sleep: Option<Duration>,
    /// Status code used by every route that honors it.
    pub status: StatusCode,
    /// Busy-wait worker count; 0 means one per available processor.
    pub cores: usize,
    /// How long to run the load generator, when requested.
    pub stress: Option<Duration>,
    /// Include the request body in the response instead of draining it.
    pub echo: bool,
    /// Delay before each stream chunk.
    pub stream_interval: Duration,
    /// Number of stream chunks.
    pub stream_count: usize,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            sleep: None,
            status: StatusCode::OK,
            cores: 0,
            stress: None,
            echo: false,
            stream_interval: Duration::from_secs(DEFAULT_STREAM_INTERVAL_SECS as u64),
            stream_count: DEFAULT_STREAM_COUNT as usize,
        }
    }
}

impl SyntheticParams {
    /// Derive the synthetic parameters from a raw (still encoded) query string.
    pub fn from_query(query: Option<&str>) -> Self {
        let pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).collect())
            .unwrap_or_default();
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k.as_ref() == key)
                .map(|(_, v)| v.as_ref())
        };

        let mut params = Self::default();

        params.sleep = first("sleep").map(parse_duration);
        if let Some(raw) = first("status") {
            params.status = parse_status(raw);
        }
        if let Some(raw) = first("cores") {
            // Negative counts are treated like any other malformed value.
            params.cores = usize::try_from(parse_int_or(raw, 0)).unwrap_or(0);
        }
        params.stress = first("stress").map(parse_duration);
        params.echo = first("echo").is_some();

        if let Some(raw) = first("interval") {
            let secs = parse_int_or(raw, DEFAULT_STREAM_INTERVAL_SECS);
            params.stream_interval = Duration::from_secs(u64::try_from(secs).unwrap_or(0));
        }
        if let Some(raw) = first("count") {
            let count = parse_int_or(raw, MALFORMED_STREAM_COUNT);
            params.stream_count = usize::try_from(count).unwrap_or(0);
        }

        params
    }
}
