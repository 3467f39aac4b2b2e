//! Introspection response rendering.
//!
//! # Responsibilities
//! - Render the request report as plain text or JSON
//! - Stamp each report with a fresh UUID and the server time
//! - Apply the body policy: echo, dump to stdout (debug) or drain
//!
//! # Design Decisions
//! - Plain-text headers are listed in byte-wise sorted order
//! - JSON is a typed serde structure, never an ad hoc value tree
//! - Unechoed bodies are always drained, whatever the method or format,
//!   so a keep-alive connection is never left with unread bytes
//! - Body errors are logged; the status is already decided and stays

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Local;
use futures_util::{future, stream, Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::http::request::RequestInfo;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// What to do with the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// Return the body to the client (POST only).
    Echo,
    /// Print the body to stdout, then discard it (POST only; drains otherwise).
    Dump,
    /// Read and discard.
    Drain,
}

impl BodyPolicy {
    pub fn select(echo: bool, debug: bool, method: &Method) -> Self {
        if echo {
            BodyPolicy::Echo
        } else if debug && method == Method::POST {
            BodyPolicy::Dump
        } else {
            BodyPolicy::Drain
        }
    }
}

/// Server-generated section of a report.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub uuid: Uuid,
    pub time: String,
}

impl Generated {
    pub fn now() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            time: Local::now().format("%Y-%m-%d %H:%M:%S%.9f %z").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRequest<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub proto: &'a str,
    #[serde(rename = "content-length")]
    pub content_length: i64,
    #[serde(rename = "remote-addr")]
    pub remote_addr: &'a str,
    pub close: bool,
}

/// JSON form of the introspection report.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub request: JsonRequest<'a>,
    pub headers: &'a BTreeMap<String, Vec<String>>,
    pub generated: Generated,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl<'a> JsonReport<'a> {
    pub fn new(info: &'a RequestInfo, generated: Generated, body: Option<String>) -> Self {
        Self {
            request: JsonRequest {
                method: info.method.as_str(),
                uri: &info.request_uri,
                proto: info.proto,
                content_length: info.content_length,
                remote_addr: &info.remote_addr,
                close: info.close,
            },
            headers: &info.headers,
            generated,
            body,
        }
    }
}

/// The `[Request]` block.
pub fn request_section(info: &RequestInfo) -> String {
    format!(
        "\n[Request]\nMethod: {}\nHost: {}\nRequestURI: {}\nProto: {}\nContent-Length: {}\nClose: {}\nRemoteAddr: {}\n",
        info.method,
        info.host,
        info.request_uri,
        info.proto,
        info.content_length,
        info.close,
        info.remote_addr,
    )
}

/// The `[Received Headers]` block, sorted by header name.
pub fn headers_section(info: &RequestInfo) -> String {
    let mut out = String::from("\n[Received Headers]\n");
    for (name, value) in info.joined_headers() {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    out
}

/// The `[Server Generated]` block.
pub fn generated_section(generated: &Generated) -> String {
    format!(
        "\n[Server Generated]\nuuid: {}\ntime: {}\n",
        generated.uuid, generated.time
    )
}

/// Full plain-text report without the body section.
pub fn render_plain(info: &RequestInfo, generated: &Generated) -> String {
    let mut out = request_section(info);
    out.push_str(&headers_section(info));
    out.push_str(&generated_section(generated));
    out
}

/// Plain-text introspection response.
pub async fn plain_response(
    info: &RequestInfo,
    body: Body,
    status: StatusCode,
    policy: BodyPolicy,
) -> Response {
    let mut report = render_plain(info, &Generated::now());

    let body = match policy {
        BodyPolicy::Echo if info.method == Method::POST => {
            report.push_str("\n[Received Body]\n");
            let head = stream::once(future::ready(Ok::<Bytes, Infallible>(Bytes::from(report))));
            Body::from_stream(head.chain(echo_stream(body)))
        }
        BodyPolicy::Echo => {
            drain(body).await;
            report.push_str("\n[Received Body]\n");
            Body::from(report)
        }
        BodyPolicy::Dump => {
            dump(Some(info), body).await;
            Body::from(report)
        }
        BodyPolicy::Drain => {
            drain(body).await;
            Body::from(report)
        }
    };

    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

/// JSON introspection response.
pub async fn json_response(
    info: &RequestInfo,
    body: Body,
    status: StatusCode,
    policy: BodyPolicy,
) -> Response {
    let echoed = match policy {
        BodyPolicy::Echo if info.method == Method::POST => {
            match axum::body::to_bytes(body, usize::MAX).await {
                Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read request body");
                    None
                }
            }
        }
        BodyPolicy::Dump => {
            dump(None, body).await;
            None
        }
        BodyPolicy::Echo | BodyPolicy::Drain => {
            drain(body).await;
            None
        }
    };

    let report = JsonReport::new(info, Generated::now(), echoed);
    let encoded = match serde_json::to_vec(&report) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode JSON report");
            Vec::new()
        }
    };

    (status, [(header::CONTENT_TYPE, APPLICATION_JSON)], encoded).into_response()
}

/// Pass the request body through, ending quietly on the first read error.
fn echo_stream(body: Body) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    body.into_data_stream().scan((), |_, chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(Ok(bytes)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to copy request body");
                None
            }
        })
    })
}

/// Read the body to the end and discard it. Returns the number of bytes read.
pub async fn drain(body: Body) -> u64 {
    let mut total = 0u64;
    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => total += bytes.len() as u64,
            Err(e) => {
                tracing::error!(error = %e, "Failed to drain request body");
                break;
            }
        }
    }
    total
}

/// Debug mode: print headers (plain format only) and the body to stdout.
async fn dump(info: Option<&RequestInfo>, body: Body) {
    let mut out = tokio::io::stdout();
    let mut head = String::new();
    if let Some(info) = info {
        head.push_str("----- BEGIN HEADERS -----\n");
        for (name, value) in info.joined_headers() {
            head.push_str(&format!("{}: {}\n", name, value));
        }
        head.push_str("----- END HEADERS -----\n");
    }
    head.push_str("----- BEGIN BODY -----\n");

    let result: std::io::Result<()> = async move {
        out.write_all(head.as_bytes()).await?;
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => out.write_all(&bytes).await?,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read request body");
                    break;
                }
            }
        }
        out.write_all(b"\n----- END BODY -----\n").await?;
        out.flush().await
    }
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to dump request body");
    }
}
