//! HTTP echo and introspection server library.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod synthetic;

pub use config::schema::EchoConfig;
pub use error::ServerError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
