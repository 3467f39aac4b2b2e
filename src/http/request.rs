//! Request introspection.
//!
//! # Responsibilities
//! - Generate a unique request ID for log correlation
//! - Capture the metadata echoed back to the client (method, host, URI,
//!   protocol, content length, close flag, remote address)
//! - Collect headers under their canonical MIME names
//!
//! # Design Decisions
//! - Metadata is captured once from the request head; the body is handled
//!   separately so it can be echoed, dumped or drained
//! - The Host header is reported as `Host`, not in the header list
//! - Headers are kept in a `BTreeMap`, so iteration is byte-wise sorted

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri, Version};
use uuid::Uuid;

/// Response header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random (v4) request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything the introspection responses report about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub host: String,
    pub request_uri: String,
    pub proto: &'static str,
    /// Declared body length; -1 when unknown (chunked).
    pub content_length: i64,
    pub close: bool,
    pub remote_addr: String,
    /// Canonical header name → values in arrival order.
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestInfo {
    /// Capture the introspection data from a request head.
    pub fn from_parts(parts: &Parts) -> Self {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            host: request_host(&parts.headers, &parts.uri),
            request_uri: request_uri(&parts.uri),
            proto: proto_name(parts.version),
            content_length: content_length(&parts.headers),
            close: wants_close(&parts.headers, parts.version),
            remote_addr,
            headers: collect_headers(&parts.headers),
        }
    }

    /// Header values joined the way the plain-text report prints them.
    pub fn joined_headers(&self) -> impl Iterator<Item = (&str, String)> {
        self.headers
            .iter()
            .map(|(name, values)| (name.as_str(), values.join(", ")))
    }
}

/// Host the client addressed: the Host header, else the URI authority.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Path and query exactly as requested.
pub fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Protocol name in `HTTP/major.minor` form.
pub fn proto_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Canonical MIME form of a header name: `x-forwarded-for` → `X-Forwarded-For`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn content_length(headers: &HeaderMap) -> i64 {
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        return length;
    }
    if headers.contains_key(header::TRANSFER_ENCODING) {
        -1
    } else {
        0
    }
}

fn wants_close(headers: &HeaderMap, version: Version) -> bool {
    let has_token = |token: &str| {
        headers.get_all(header::CONNECTION).iter().any(|v| {
            v.to_str()
                .map(|s| s.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                .unwrap_or(false)
        })
    };

    if has_token("close") {
        return true;
    }
    version <= Version::HTTP_10 && !has_token("keep-alive")
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if name == header::HOST {
            continue;
        }
        collected
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}
