//! Per-destination route selection.

use std::fmt;
use std::sync::Arc;

use sshroute_rules::RoutingTable;
use tracing::{debug, warn};

use crate::error::RouteError;
use crate::registry::Registry;
use crate::transport::{BoxedStream, Dialer};

/// Destination requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    /// Host name or IP literal, passed unresolved to the far end.
    pub host: String,
    pub port: u16,
}

impl TargetAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How a destination was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Through the named endpoint's transport.
    Tunnel { endpoint: String },
    /// Plain TCP from this host.
    Direct,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Tunnel { endpoint } => write!(f, "proxy {endpoint}"),
            Route::Direct => f.write_str("direct"),
        }
    }
}

/// An open connection to the destination plus the route it took.
pub struct RoutedStream {
    pub route: Route,
    pub stream: BoxedStream,
}

impl fmt::Debug for RoutedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedStream")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// Chooses a route for each destination.
///
/// Holds no mutable state; one router serves all sessions concurrently.
pub struct Router {
    registry: Arc<Registry>,
    table: RoutingTable,
    dialer: Arc<dyn Dialer>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, table: RoutingTable, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            registry,
            table,
            dialer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Open a connection to `target`.
    ///
    /// `host` is the text rules are matched against. The first matching rule
    /// whose endpoint is connected is used; matches naming an unknown or
    /// unconnected endpoint are skipped. Without a usable match the target
    /// is dialed directly.
    pub async fn resolve(
        &self,
        network: &str,
        host: &str,
        target: &TargetAddr,
    ) -> Result<RoutedStream, RouteError> {
        if !matches!(network, "tcp" | "tcp4" | "tcp6") {
            return Err(RouteError::UnsupportedNetwork(network.to_string()));
        }

        for rule in self.table.matches(host) {
            let Some(endpoint) = self.registry.get(rule.target()) else {
                warn!(
                    host,
                    pattern = rule.source(),
                    proxy = rule.target(),
                    "rule names unknown proxy"
                );
                continue;
            };
            let Some(transport) = endpoint.transport() else {
                warn!(
                    host,
                    pattern = rule.source(),
                    proxy = rule.target(),
                    "proxy not connected, trying next rule"
                );
                continue;
            };

            debug!(
                dest = %target,
                pattern = rule.source(),
                proxy = endpoint.name(),
                "routing through proxy"
            );
            let stream = transport
                .open_channel(&target.host, target.port)
                .await
                .map_err(|source| RouteError::Tunnel {
                    endpoint: endpoint.name().to_string(),
                    target: target.to_string(),
                    source,
                })?;
            return Ok(RoutedStream {
                route: Route::Tunnel {
                    endpoint: endpoint.name().to_string(),
                },
                stream,
            });
        }

        debug!(dest = %target, "routing direct");
        let stream = self
            .dialer
            .dial(&target.host, target.port)
            .await
            .map_err(|source| RouteError::Direct {
                target: target.to_string(),
                source,
            })?;
        Ok(RoutedStream {
            route: Route::Direct,
            stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use sshroute_rules::PatternMode;

    use super::*;
    use crate::connector::tests::{FakeDialer, FakeTransport, Log, connected, spec};
    use crate::error::TunnelError;
    use crate::transport::Transport;

    fn table(filters: &[(&str, &str)]) -> RoutingTable {
        RoutingTable::compile(filters.iter().copied(), PatternMode::Lenient).unwrap()
    }

    fn router(registry: Registry, filters: &[(&str, &str)], log: &Log) -> Router {
        Router::new(
            Arc::new(registry),
            table(filters),
            Arc::new(FakeDialer {
                log: Arc::clone(log),
                refuse: vec!["refused.example".into()],
            }),
        )
    }

    fn last(log: &Log) -> String {
        log.lock().unwrap().last().cloned().unwrap_or_default()
    }

    async fn two_roots(log: &Log) -> Registry {
        connected(vec![spec("p1", None), spec("p2", None)], log).await
    }

    #[tokio::test]
    async fn first_match_wins() {
        let log = Log::default();
        let router = router(
            two_roots(&log).await,
            &[(".example.com", "p1"), ("sub.example", "p2")],
            &log,
        );

        let target = TargetAddr::new("sub.example.com", 443);
        let routed = router.resolve("tcp", "sub.example.com", &target).await.unwrap();
        assert_eq!(routed.route, Route::Tunnel { endpoint: "p1".into() });
        assert_eq!(last(&log), "p1 open sub.example.com:443");
    }

    #[tokio::test]
    async fn dead_match_falls_through_to_next_rule() {
        let log = Log::default();
        let registry = Registry::load([spec("dead", None), spec("live", None)]);
        registry
            .get("live")
            .unwrap()
            .set_transport(Arc::new(FakeTransport {
                name: "live".into(),
                log: Arc::clone(&log),
            }))
            .unwrap();

        let router = router(registry, &[("x.", "dead"), ("x.", "live")], &log);
        let target = TargetAddr::new("x.org", 80);
        let routed = router.resolve("tcp", "x.org", &target).await.unwrap();
        assert_eq!(routed.route, Route::Tunnel { endpoint: "live".into() });
        assert_eq!(last(&log), "live open x.org:80");
    }

    #[tokio::test]
    async fn only_dead_matches_go_direct() {
        let log = Log::default();
        let registry = Registry::load([spec("dead", None)]);
        let router = router(registry, &[("x.", "dead"), ("x.", "ghost")], &log);

        let target = TargetAddr::new("x.org", 80);
        let routed = router.resolve("tcp", "x.org", &target).await.unwrap();
        assert_eq!(routed.route, Route::Direct);
        assert_eq!(last(&log), "dial x.org:80");
    }

    #[tokio::test]
    async fn no_match_goes_direct() {
        let log = Log::default();
        let router = router(two_roots(&log).await, &[(".corp.", "p1")], &log);

        let target = TargetAddr::new("example.net", 443);
        let routed = router.resolve("tcp4", "example.net", &target).await.unwrap();
        assert_eq!(routed.route, Route::Direct);
        assert_eq!(last(&log), "dial example.net:443");
    }

    #[tokio::test]
    async fn chained_endpoint_serves_matching_destination() {
        let log = Log::default();
        let registry = connected(
            vec![spec("bastion", None), spec("internal", Some("bastion"))],
            &log,
        )
        .await;
        let router = router(
            registry,
            &[(".corp.", "internal"), ("github.com", "bastion")],
            &log,
        );

        let target = TargetAddr::new("db.corp.internal", 5432);
        let routed = router.resolve("tcp", "db.corp.internal", &target).await.unwrap();
        assert_eq!(routed.route, Route::Tunnel { endpoint: "internal".into() });
        assert_eq!(last(&log), "internal open db.corp.internal:5432");

        let target = TargetAddr::new("github.com", 22);
        let routed = router.resolve("tcp", "github.com", &target).await.unwrap();
        assert_eq!(routed.route, Route::Tunnel { endpoint: "bastion".into() });
    }

    #[tokio::test]
    async fn rejects_non_tcp_networks() {
        let log = Log::default();
        let router = router(Registry::default(), &[], &log);
        let target = TargetAddr::new("example.net", 53);
        let err = router.resolve("udp", "example.net", &target).await.unwrap_err();
        assert!(matches!(err, RouteError::UnsupportedNetwork(n) if n == "udp"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_failure_carries_io_kind() {
        let log = Log::default();
        let router = router(Registry::default(), &[], &log);
        let target = TargetAddr::new("refused.example", 80);
        let err = router
            .resolve("tcp", "refused.example", &target)
            .await
            .unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));
    }

    struct BrokenTransport;

    #[async_trait]
    impl Transport for BrokenTransport {
        async fn open_channel(&self, _host: &str, _port: u16) -> Result<BoxedStream, TunnelError> {
            Err(TunnelError::Io(io::Error::from(io::ErrorKind::ConnectionReset)))
        }
    }

    #[tokio::test]
    async fn channel_failure_does_not_fall_through() {
        let log = Log::default();
        let registry = Registry::load([spec("broken", None)]);
        registry
            .get("broken")
            .unwrap()
            .set_transport(Arc::new(BrokenTransport))
            .unwrap();
        let router = router(registry, &[("x.", "broken")], &log);

        let target = TargetAddr::new("x.org", 80);
        let err = router.resolve("tcp", "x.org", &target).await.unwrap_err();
        assert!(matches!(&err, RouteError::Tunnel { endpoint, .. } if endpoint == "broken"));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionReset));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn target_display_brackets_ipv6() {
        assert_eq!(TargetAddr::new("::1", 80).to_string(), "[::1]:80");
        assert_eq!(TargetAddr::new("10.0.0.1", 80).to_string(), "10.0.0.1:80");
    }
}
