//! CLI module for the SOCKS5 proxy.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use sshroute_config::{LoggingConfig, load_config, validate_config};
use sshroute_core::defaults::{DEFAULT_BIND_HOST, DEFAULT_BIND_PORT, DEFAULT_CONFIG_FILE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::SocksError;

/// Proxy CLI arguments.
///
/// `-h` selects the bind host, so help is only available as `--help`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sshroute",
    version,
    about = "SOCKS5 proxy that routes destinations through chained SSH tunnels",
    disable_help_flag = true
)]
pub struct ProxyArgs {
    /// Config file path (toml/json/jsonc).
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// SOCKS5 bind host.
    #[arg(short = 'h', long, default_value = DEFAULT_BIND_HOST)]
    pub host: String,

    /// SOCKS5 bind port.
    #[arg(short, long, default_value_t = DEFAULT_BIND_PORT)]
    pub port: u16,

    /// Log level override.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl ProxyArgs {
    fn bind_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Run the proxy with the given CLI arguments.
///
/// Every endpoint is connected before the listener is bound; a failure in
/// either step is returned and the listener never serves.
pub async fn run(args: ProxyArgs) -> Result<(), SocksError> {
    let mut config = load_config(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = Some(level.clone());
    }

    init_tracing(&config.logging);
    validate_config(&config)?;

    info!(
        config = %args.config.display(),
        proxies = config.proxies.len(),
        filters = config.filters.len(),
        "configuration loaded"
    );

    let state = Arc::new(crate::connect(&config).await?);

    let addr = args.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| SocksError::Bind {
            addr: addr.clone(),
            source,
        })?;

    // Graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    crate::run(listener, state, shutdown).await
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.as_deref().unwrap_or("info").to_string();

    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(filter_directives(config)).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let args = ProxyArgs::try_parse_from(["sshroute"]).unwrap();
        assert_eq!(args.config, PathBuf::from("proxy_config.toml"));
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 8000);
        assert_eq!(args.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn short_h_is_the_host() {
        let args =
            ProxyArgs::try_parse_from(["sshroute", "-h", "::1", "-p", "1080", "-c", "x.toml"])
                .unwrap();
        assert_eq!(args.bind_addr(), "[::1]:1080");
        assert_eq!(args.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn long_help_is_still_available() {
        let err = ProxyArgs::try_parse_from(["sshroute", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn filter_directives_include_modules() {
        let config = LoggingConfig {
            level: Some("debug".into()),
            filters: HashMap::from([("russh".to_string(), "warn".to_string())]),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config), "debug,russh=warn");
    }

    #[tokio::test]
    async fn missing_config_fails_before_binding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let args = ProxyArgs::try_parse_from([
            "sshroute",
            "-c",
            path.to_str().unwrap(),
            "-p",
            "0",
        ])
        .unwrap();
        let err = run(args).await.unwrap_err();
        assert!(matches!(err, SocksError::Config(_)));
    }
}
