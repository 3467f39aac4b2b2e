//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → handlers.rs (apply sleep/status/stress knobs)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path conditions)
//!     → handlers.rs (hostname | env | stream | JSON | plain text)
//! ```
//!
//! # Design Decisions
//! - Route table is built once, immutable at runtime
//! - No regex in hot path (prefix/suffix matching only)
//! - First match wins; the plain-text report is the fallback
//! - Synthetic knobs apply before lookup, whatever the route

pub mod handlers;
pub mod matcher;
pub mod router;

pub use router::{Route, RouteTable};
