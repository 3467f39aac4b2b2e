//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, timeouts, Axum router)
//!     → observability::logging (request ID, pre/post records)
//!     → routing (synthetic knobs, route selection)
//!     → request.rs (introspection data from the request head)
//!     → response.rs (plain-text/JSON report, body policy)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestInfo, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
