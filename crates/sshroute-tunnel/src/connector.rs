//! Startup connect phase: one transport per endpoint, parents first.

use std::sync::Arc;

use tracing::{debug, info};

use crate::credential::SecretSource;
use crate::error::{ConnectError, TunnelError};
use crate::registry::{Endpoint, Registry};
use crate::transport::{Dialer, HandshakeRequest, Handshaker};

/// Connects every endpoint of a registry.
pub struct ChainConnector {
    dialer: Arc<dyn Dialer>,
    handshaker: Arc<dyn Handshaker>,
    secrets: Arc<dyn SecretSource>,
}

impl ChainConnector {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        handshaker: Arc<dyn Handshaker>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            dialer,
            handshaker,
            secrets,
        }
    }

    /// Connect all endpoints in dependency order.
    ///
    /// Endpoints are connected one at a time, so password prompts never
    /// interleave. The first failure aborts the whole phase.
    pub async fn connect_all(&self, registry: &Registry) -> Result<(), ConnectError> {
        let order = registry.connect_order()?;
        info!(count = order.len(), "connecting proxies");

        for endpoint in &order {
            self.connect_endpoint(endpoint)
                .await
                .map_err(|source| ConnectError::Endpoint {
                    endpoint: endpoint.name().to_string(),
                    addr: endpoint.addr(),
                    source,
                })?;
        }

        info!(count = order.len(), "all proxies connected");
        Ok(())
    }

    /// Establish the transport of a single endpoint.
    ///
    /// A root endpoint dials its server directly. A child endpoint reaches
    /// its server through a channel on the parent's transport, which must
    /// already be connected.
    pub async fn connect_endpoint(&self, endpoint: &Endpoint) -> Result<(), TunnelError> {
        let credential = endpoint
            .credential()
            .resolve(endpoint.host(), &self.secrets)
            .await?;

        let stream = match endpoint.parent() {
            Some(parent) => {
                let transport = parent
                    .transport()
                    .ok_or_else(|| TunnelError::ParentNotConnected(parent.name().to_string()))?;
                debug!(
                    proxy = endpoint.name(),
                    parent = parent.name(),
                    addr = %endpoint.addr(),
                    "opening channel through parent"
                );
                transport.open_channel(endpoint.host(), endpoint.port()).await?
            }
            None => {
                debug!(proxy = endpoint.name(), addr = %endpoint.addr(), "dialing proxy");
                self.dialer.dial(endpoint.host(), endpoint.port()).await?
            }
        };

        let transport = self
            .handshaker
            .handshake(
                stream,
                HandshakeRequest {
                    endpoint: endpoint.name(),
                    host: endpoint.host(),
                    port: endpoint.port(),
                    user: endpoint.user(),
                    credential,
                },
            )
            .await?;
        endpoint.set_transport(transport)?;

        let via = endpoint.parent().map(|p| p.name().to_string());
        info!(
            proxy = endpoint.name(),
            addr = %endpoint.addr(),
            via = via.as_deref().unwrap_or("direct"),
            "proxy connected"
        );
        Ok(())
    }
}
