//! Synthetic-behavior subsystem.
//!
//! # Data Flow
//! ```text
//! query string
//!     → params.rs (coerce sleep/status/cores/stress/echo/interval/count)
//!     → SyntheticParams (request-scoped, never persisted)
//!     → load.rs (busy-wait workers for `stress`, when requested)
//! ```
//!
//! # Design Decisions
//! - Malformed values never fail a request; documented defaults are used
//! - Busy-wait workers live on OS threads, never on runtime workers

pub mod load;
pub mod params;

pub use load::generate_load;
pub use params::SyntheticParams;
