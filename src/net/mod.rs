//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → http/server.rs (accept loop)
//!     → connection.rs (connection ID, header-read and idle timeout wrapper)
//!     → Hand off to hyper
//!
//! Connection States:
//!     Head (header-read deadline) → Busy (idle deadline)
//!         → Idle (idle deadline) → Head on the next byte
//!     Any state → Draining (shutdown requested) → Closed
//! ```
//!
//! # Design Decisions
//! - Each connection gets an ID for log correlation
//! - Header-read and idle deadlines are enforced by the IO layer; the
//!   service reports request starts and completions through a shared tracker

pub mod connection;

pub use connection::{
    ConnectionId, ConnectionTimeouts, InFlight, RequestTracker, TimedStream, TrackedBody,
};
