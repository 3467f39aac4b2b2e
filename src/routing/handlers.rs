//! Request handlers.
//!
//! # Responsibilities
//! - Apply the synthetic knobs in order: sleep, status, cores, stress
//! - Dispatch to the matched route
//! - Serve hostname, environment and streaming responses
//!
//! # Design Decisions
//! - Every route drains a body it does not echo
//! - `/hostname` failures answer 500 regardless of a forced status
//! - `/env` always answers 200
//! - Stream chunks come from a detached producer, so the configured
//!   schedule runs to completion even if the client disconnects

use std::convert::Infallible;
use std::ffi::OsString;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{Local, SecondsFormat};
use futures_util::stream;
use tokio::sync::mpsc;

use crate::http::request::RequestInfo;
use crate::http::response::{
    drain, headers_section, json_response, plain_response, request_section, BodyPolicy, TEXT_PLAIN,
};
use crate::http::server::AppState;
use crate::routing::Route;
use crate::synthetic::{generate_load, SyntheticParams};

/// Environment variable names containing any of these get their value masked.
pub const SENSITIVE_MARKERS: [&str; 3] = ["SECRET", "SESSION", "TOKEN"];

/// Appended to the visible prefix of a masked value.
pub const REDACTION_MASK: &str = "*****";

/// Visible characters kept from a masked value.
const REDACTION_VISIBLE: usize = 3;

/// Entry point for every request.
pub async fn introspect(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let params = SyntheticParams::from_query(parts.uri.query());

    if let Some(delay) = params.sleep {
        tokio::time::sleep(delay).await;
    }
    let status = params.status;
    if let Some(duration) = params.stress {
        generate_load(duration, params.cores).await;
    }

    let route = state.routes.match_path(parts.uri.path());
    let info = RequestInfo::from_parts(&parts);
    let policy = BodyPolicy::select(params.echo, state.debug, &info.method);

    let mut response = match route {
        Route::Hostname => {
            drain(body).await;
            hostname_response(nix::unistd::gethostname(), status)
        }
        Route::Env => {
            drain(body).await;
            env_response()
        }
        Route::Stream => {
            drain(body).await;
            stream_response(&info, status, params.stream_interval, params.stream_count)
        }
        Route::Json => json_response(&info, body, status, policy).await,
        Route::Plain => plain_response(&info, body, status, policy).await,
    };

    response.extensions_mut().insert(route);
    response
}

/// Report the server hostname, or 500 with the lookup error.
pub fn hostname_response(hostname: nix::Result<OsString>, status: StatusCode) -> Response {
    match hostname {
        Ok(name) => (
            status,
            [(header::CONTENT_TYPE, TEXT_PLAIN)],
            format!("Hostname: {}\n", name.to_string_lossy()),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve hostname");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                format!("{}\n", e),
            )
                .into_response()
        }
    }
}

/// Dump the process environment with sensitive values masked.
pub fn env_response() -> Response {
    let vars = std::env::vars_os().map(|(name, value)| {
        (
            name.to_string_lossy().into_owned(),
            value.to_string_lossy().into_owned(),
        )
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        render_env(vars),
    )
        .into_response()
}

/// One `NAME: VALUE` line per variable, in the given order.
pub fn render_env(vars: impl IntoIterator<Item = (String, String)>) -> String {
    let mut out = String::new();
    for (name, value) in vars {
        if is_sensitive(&name) {
            out.push_str(&format!("{}: {}\n", name, redact(&value)));
        } else {
            out.push_str(&format!("{}: {}\n", name, value));
        }
    }
    out
}

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker))
}

fn redact(value: &str) -> String {
    let visible: String = value.chars().take(REDACTION_VISIBLE).collect();
    visible + REDACTION_MASK
}

/// Chunked response: the request summary, then `count` timestamped chunks.
pub fn stream_response(
    info: &RequestInfo,
    status: StatusCode,
    interval: Duration,
    count: usize,
) -> Response {
    let mut head = request_section(info);
    head.push_str(&headers_section(info));

    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut delivering = tx.send(Bytes::from(head)).await.is_ok();
        for i in 0..count {
            tokio::time::sleep(interval).await;
            let line = format!(
                "{} chunk #{}\n",
                Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                i
            );
            if delivering && tx.send(Bytes::from(line)).await.is_err() {
                tracing::debug!(chunk = i, "Stream client gone, finishing schedule");
                delivering = false;
            }
        }
    });

    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<Bytes, Infallible>(chunk), rx))
    });

    (
        status,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        Body::from_stream(chunks),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::collections::BTreeMap;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_redaction() {
        let text = render_env(vars(&[
            ("PATH", "/usr/bin"),
            ("SECRET_KEY", "abcdef"),
            ("MY_SESSION_ID", "xyz123"),
            ("GITHUB_TOKEN", "ghp_0123456789"),
            ("token_lower", "visible"),
        ]));
        assert_eq!(
            text,
            "PATH: /usr/bin\n\
             SECRET_KEY: abc*****\n\
             MY_SESSION_ID: xyz*****\n\
             GITHUB_TOKEN: ghp*****\n\
             token_lower: visible\n"
        );
    }

    #[test]
    fn test_env_redaction_short_values() {
        let text = render_env(vars(&[("TOKEN", "ab"), ("SECRET", "")]));
        assert_eq!(text, "TOKEN: ab*****\nSECRET: *****\n");
    }

    #[test]
    fn test_hostname_response() {
        let response = hostname_response(Ok(OsString::from("box-1")), StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = hostname_response(Err(nix::Error::EINVAL), StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_stream_response_chunks() {
        let info = RequestInfo {
            method: Method::GET,
            host: "localhost".to_string(),
            request_uri: "/stream?count=3&interval=0".to_string(),
            proto: "HTTP/1.1",
            content_length: 0,
            close: false,
            remote_addr: "127.0.0.1:1".to_string(),
            headers: BTreeMap::new(),
        };
        let response = stream_response(&info, StatusCode::OK, Duration::ZERO, 3);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.starts_with("\n[Request]\nMethod: GET\n"));
        assert!(!text.contains("[Server Generated]"));
        let chunks: Vec<&str> = text.lines().filter(|l| l.contains(" chunk #")).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[2].ends_with("chunk #2"));
    }
}
