//! SOCKS5 front end for sshroute.
//!
//! Accepts SOCKS5 CONNECT requests and hands each destination to the
//! [`Router`], which picks an SSH tunnel or a direct connection.

pub mod cli;
mod error;
mod handler;
pub mod socks5;

pub use cli::ProxyArgs;
pub use error::{Socks5Error, SocksError};

use std::sync::Arc;
use std::time::Duration;

use sshroute_config::{Config, RelayConfig};
use sshroute_rules::{PatternMode, RoutingTable};
use sshroute_tunnel::{
    ChainConnector, Dialer, Registry, Router, SecretSource, SshHandshaker, SystemSecrets,
    TcpDialer,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared state for all SOCKS sessions.
pub struct ProxyState {
    pub router: Arc<Router>,
    pub relay: RelayConfig,
}

impl ProxyState {
    pub fn new(router: Arc<Router>, relay: RelayConfig) -> Self {
        Self { router, relay }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        let secs = self.relay.idle_timeout_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// Compile the configured filters into a routing table.
pub fn build_routing_table(config: &Config) -> Result<RoutingTable, SocksError> {
    let mode = if config.routing.strict_patterns {
        PatternMode::Strict
    } else {
        PatternMode::Lenient
    };
    let table = RoutingTable::compile(
        config
            .filters
            .iter()
            .map(|f| (f.url.as_str(), f.proxy.as_str())),
        mode,
    )?;
    Ok(table)
}

/// Build the registry, connect every endpoint and assemble the router.
///
/// Any endpoint failing to connect aborts startup.
pub async fn connect(config: &Config) -> Result<ProxyState, SocksError> {
    let table = build_routing_table(config)?;
    let registry = Arc::new(Registry::from_config(config));

    let dialer: Arc<dyn Dialer> = Arc::new(TcpDialer::new(config.tcp.clone()));
    let secrets: Arc<dyn SecretSource> = Arc::new(SystemSecrets);
    let connector = ChainConnector::new(
        Arc::clone(&dialer),
        Arc::new(SshHandshaker::new(&config.ssh)),
        secrets,
    );
    connector.connect_all(&registry).await?;

    let router = Router::new(registry, table, dialer);
    Ok(ProxyState::new(Arc::new(router), config.relay.clone()))
}

/// Serve SOCKS5 sessions on `listener` until `shutdown` fires.
pub async fn run(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown: CancellationToken,
) -> Result<(), SocksError> {
    if let Ok(addr) = listener.local_addr() {
        info!(listen = %addr, rules = state.router.table().len(), "SOCKS5 proxy started");
    }

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            handler::handle_socks5_conn(stream, peer, &state).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("shutting down proxy");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> Config {
        sshroute_config::parse_config(text, "toml").unwrap()
    }

    const BAD_FILTER: &str = r#"
[[filters]]
url = "(unclosed"
proxy = "p"

[[filters]]
url = ".corp."
proxy = "p"
"#;

    #[test]
    fn lenient_table_keeps_broken_rule_inert() {
        let table = build_routing_table(&config(BAD_FILTER)).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rules()[0].is_disabled());
        assert_eq!(table.matches("db.corp.x").count(), 1);
    }

    #[test]
    fn strict_table_rejects_broken_rule() {
        let text = format!("[routing]\nstrict_patterns = true\n{BAD_FILTER}");
        let err = build_routing_table(&config(&text)).unwrap_err();
        assert!(matches!(err, SocksError::Rules(_)));
    }
}
