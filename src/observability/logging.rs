//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Emit pre- and post-request records with a per-request ID
//! - Measure request latency
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment (`RUST_LOG` wins)
//! - Request handling runs on its own task: a client that disconnects does
//!   not cut short a synthetic delay, and the post record is always written

use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::request::{request_host, request_uri, RequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::Route;

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let default_directive = if config.debug {
        "http_echo=debug"
    } else {
        "http_echo=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json().flatten_event(true)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().pretty())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

/// Fields shared by the pre and post records.
#[derive(Debug, Clone)]
struct HttpRequestFields {
    method: String,
    url: String,
    remote_ip: String,
    size: i64,
    user_agent: String,
}

impl HttpRequestFields {
    fn from_request(request: &Request) -> Self {
        let remote_ip = request
            .extensions()
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|info| info.0.to_string())
            .unwrap_or_default();
        let size = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            method: request.method().to_string(),
            url: format!(
                "http://{}{}",
                request_host(request.headers(), request.uri()),
                request_uri(request.uri())
            ),
            remote_ip,
            size,
            user_agent,
        }
    }
}

/// Latency rendered as seconds with millisecond precision, e.g. `0.125s`.
pub fn format_latency(latency: Duration) -> String {
    format!("{:.3}s", latency.as_millis() as f64 / 1000.0)
}

/// Middleware wrapping every request with pre/post log records.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = RequestId::new();
    let fields = HttpRequestFields::from_request(&request);

    tracing::debug!(
        phase = "pre",
        request_id = %request_id,
        request_method = %fields.method,
        request_url = %fields.url,
        remote_ip = %fields.remote_ip,
        request_size = fields.size,
        user_agent = %fields.user_agent,
        "Request received"
    );

    let mut response = match tokio::spawn(next.run(request)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Request handler failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    let status = response.status().as_u16();
    let route = response
        .extensions()
        .get::<Route>()
        .map(Route::as_str)
        .unwrap_or("none");

    tracing::info!(
        phase = "post",
        request_id = %request_id,
        request_method = %fields.method,
        request_url = %fields.url,
        remote_ip = %fields.remote_ip,
        request_size = fields.size,
        user_agent = %fields.user_agent,
        route = route,
        status = status,
        latency = %format_latency(start.elapsed()),
        "Request completed"
    );
    metrics::record_request(route, status, start);

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
