//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → logging.rs (pre/post request records, request ID, latency)
//!     → metrics.rs (request counter, latency histogram)
//!
//! Load generator:
//!     → metrics.rs (spinning worker gauge)
//!
//! Consumers:
//!     → stdout (JSON lines by default, pretty for local use)
//!     → Prometheus scrape (optional, off unless an address is configured)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the logger into the response headers
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;
