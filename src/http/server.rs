//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the introspection handler
//! - Wire up middleware (request logging, body timeouts)
//! - Accept connections and serve them over HTTP/1.1
//! - Enforce per-connection limits (header read, idle, header size)
//! - Track requests per connection so keep-alive waits get the idle timeout
//! - Drain connections on shutdown within the grace period
//!
//! # Design Decisions
//! - hyper is driven directly so header-read timeout and header size
//!   limit can be configured; Axum only provides routing
//! - Shutdown stops the accept loop first, then lets in-flight requests
//!   finish, then aborts whatever is left

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::{middleware, routing::any, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer};

use crate::config::EchoConfig;
use crate::net::{ConnectionId, ConnectionTimeouts, RequestTracker, TimedStream, TrackedBody};
use crate::observability::logging::log_requests;
use crate::routing::handlers::introspect;
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    /// Dump unechoed POST bodies to stdout.
    pub debug: bool,
}

/// HTTP server for the echo service.
pub struct HttpServer {
    router: Router,
    config: EchoConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EchoConfig) -> Self {
        let state = AppState {
            routes: Arc::new(RouteTable::standard()),
            debug: config.observability.debug,
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with the request logger.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(introspect))
            .route("/", any(introspect))
            .with_state(state)
            .layer(middleware::from_fn(log_requests))
    }

    /// The router without the body timeouts, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain connections.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let timeouts = &self.config.timeouts;
        tracing::info!(
            address = %addr,
            read_header_timeout_secs = timeouts.read_header_secs,
            idle_timeout_secs = timeouts.idle_secs,
            "HTTP server starting"
        );

        // hyper's own header timer also runs during keep-alive waits, so the
        // header and idle deadlines are both enforced by `TimedStream`.
        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(None::<Duration>)
            .max_buf_size(self.config.listener.max_header_bytes)
            .keep_alive(true);
        let connection_timeouts = ConnectionTimeouts {
            header_read: Duration::from_secs(timeouts.read_header_secs),
            idle: Duration::from_secs(timeouts.idle_secs),
        };

        // Body timeouts wrap the router from outside: the router accepts any
        // request body type, while hyper accepts any response body type.
        let app = ServiceBuilder::new()
            .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(
                timeouts.read_secs,
            )))
            .layer(ResponseBodyTimeoutLayer::new(Duration::from_secs(
                timeouts.write_secs,
            )))
            .service(self.router.clone());

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let id = ConnectionId::new();
                    tracing::trace!(connection_id = %id, remote_addr = %remote_addr, "Connection accepted");

                    let requests = RequestTracker::new();
                    let io = TokioIo::new(TimedStream::new(stream, connection_timeouts, requests.clone()));
                    let app = app.clone();
                    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
                        request.extensions_mut().insert(ConnectInfo(remote_addr));
                        let in_flight = requests.begin();
                        let app = app.clone();
                        async move {
                            let response = app.oneshot(request).await?;
                            Ok::<_, Infallible>(response.map(|body| TrackedBody::new(body, in_flight)))
                        }
                    });

                    let conn = graceful.watch(http.serve_connection(io, service));
                    connections.spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(connection_id = %id, error = %e, "Connection error");
                        }
                        tracing::trace!(connection_id = %id, "Connection closed");
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Starting server shutdown");
                    break;
                }
            }
        }

        // Stop accepting before draining.
        drop(listener);

        let grace = Duration::from_secs(timeouts.shutdown_grace_secs);
        tracing::info!(
            connections = connections.len(),
            grace_secs = grace.as_secs(),
            "Draining connections"
        );
        match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => tracing::info!("All connections closed"),
            Err(_) => tracing::warn!(
                remaining = connections.len(),
                "Grace period elapsed, closing remaining connections"
            ),
        }
        connections.shutdown().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use crate::http::X_REQUEST_ID;

    #[tokio::test]
    async fn test_router_serves_every_path_and_method() {
        let server = HttpServer::new(EchoConfig::default());

        for (method, path) in [("GET", "/"), ("PUT", "/a/b/c"), ("DELETE", "/x.json")] {
            let request = Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap();
            let response = server.router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key(X_REQUEST_ID));
        }
    }

    #[tokio::test]
    async fn test_router_applies_forced_status() {
        let server = HttpServer::new(EchoConfig::default());
        let request = Request::builder()
            .uri("/hostname?status=201")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
