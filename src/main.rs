//! HTTP echo server.
//!
//! Answers every request with a report of what it received, and can be told
//! through query parameters to sleep, fail, burn CPU or stream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net (idle timeout) ─▶ http server ─▶ request logger
//!                                                               │
//!                                                               ▼
//!                                          synthetic knobs (sleep, status, stress)
//!                                                               │
//!                                                               ▼
//!                                          routing ─▶ hostname | env | stream | json | plain
//!                                                               │
//!     Client Response                                           ▼
//!     ◀────────────── http response (echo / dump / drain request body)
//!
//!     Cross-cutting: config, lifecycle (signals, graceful drain), observability
//! ```

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tokio::net::TcpListener;

use http_echo::config::{finalize, load_config, validation::ValidationError, ConfigError, LogFormat};
use http_echo::lifecycle::signals::spawn_signal_listener;
use http_echo::observability::{logging::init_logging, metrics::init_metrics};
use http_echo::{EchoConfig, HttpServer, ServerError, Shutdown};

/// Command line flags; each one can also come from the environment.
#[derive(Debug, Parser)]
#[command(name = "http-echo", version, about = "HTTP echo and introspection server")]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind.
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Debug logging and stdout dumps of unechoed POST bodies.
    /// Any non-empty `DEBUG` environment value also turns it on.
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Optional TOML config file.
    #[arg(long, env = "ECHO_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDRESS")]
    metrics_address: Option<String>,
}

/// `DEBUG` is on when set to anything, including `0` and `false`.
fn debug_from_env(value: Option<OsString>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

impl Cli {
    /// Defaults, then the config file, then flags and environment.
    fn resolve(self) -> Result<EchoConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => EchoConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(addr) = self.listen_addr {
            config.listener.listen_addr = addr;
        }
        if self.debug || debug_from_env(std::env::var_os("DEBUG")) {
            config.observability.debug = true;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_address = Some(addr);
        }

        finalize(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().resolve().map_err(ServerError::from)?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-echo starting");
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        debug = config.observability.debug,
        shutdown_grace_secs = config.timeouts.shutdown_grace_secs,
        "Configuration loaded"
    );

    if let Some(raw) = &config.observability.metrics_address {
        let addr: SocketAddr = raw.parse().map_err(|_| {
            ServerError::Config(ConfigError::Validation(vec![
                ValidationError::InvalidMetricsAddress(raw.clone()),
            ]))
        })?;
        init_metrics(addr).map_err(ServerError::from)?;
    }

    let address = config.listener.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config);
    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(ServerError::from)?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_accepts_any_non_empty_value() {
        for raw in ["1", "0", "false", "yes"] {
            assert!(debug_from_env(Some(OsString::from(raw))), "input {:?}", raw);
        }
        assert!(!debug_from_env(Some(OsString::new())));
        assert!(!debug_from_env(None));
    }

    #[test]
    fn test_flags_override_config_file_values() {
        let cli = Cli::try_parse_from([
            "http-echo",
            "--port",
            "9090",
            "--listen-addr",
            "127.0.0.1",
            "--debug",
            "--log-format",
            "pretty",
        ])
        .unwrap();
        assert!(cli.debug);

        let config = cli.resolve().unwrap();
        assert_eq!(config.listener.bind_address(), "127.0.0.1:9090");
        assert!(config.observability.debug);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
