//! SSH handshake and `direct-tcpip` channels, backed by russh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use sshroute_config::{HostKeyCheck, SshConfig, expand_home};
use sshroute_core::defaults::DEFAULT_ORIGINATOR_ADDR;
use tracing::{debug, info, warn};

use super::{BoxedStream, HandshakeRequest, Handshaker, Transport};
use crate::credential::Credential;
use crate::error::TunnelError;

/// How server host keys are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents.
    AcceptAny,
    /// The key must be listed for the host in this known_hosts file.
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    pub fn from_config(config: &SshConfig) -> Self {
        match config.host_key_policy {
            HostKeyCheck::AcceptAny => HostKeyPolicy::AcceptAny,
            HostKeyCheck::KnownHosts => HostKeyPolicy::KnownHosts(expand_home(&config.known_hosts)),
        }
    }
}

struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                debug!(
                    host = %self.host,
                    fingerprint = %server_public_key.fingerprint(),
                    "accepting server host key"
                );
                Ok(true)
            }
            HostKeyPolicy::KnownHosts(path) => {
                let known = russh_keys::check_known_hosts_path(
                    &self.host,
                    self.port,
                    server_public_key,
                    path,
                )?;
                if !known {
                    warn!(
                        host = %self.host,
                        known_hosts = %path.display(),
                        "server host key not found in known_hosts"
                    );
                }
                Ok(known)
            }
        }
    }
}

/// Runs SSH handshakes with one shared client configuration.
pub struct SshHandshaker {
    config: Arc<client::Config>,
    policy: HostKeyPolicy,
}

impl SshHandshaker {
    pub fn new(ssh: &SshConfig) -> Self {
        let config = client::Config {
            inactivity_timeout: non_zero_secs(ssh.inactivity_timeout_secs),
            keepalive_interval: non_zero_secs(ssh.keepalive_secs),
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            policy: HostKeyPolicy::from_config(ssh),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[async_trait]
impl Handshaker for SshHandshaker {
    async fn handshake(
        &self,
        stream: BoxedStream,
        request: HandshakeRequest<'_>,
    ) -> Result<Arc<dyn Transport>, TunnelError> {
        let handler = ClientHandler {
            host: request.host.to_string(),
            port: request.port,
            policy: self.policy.clone(),
        };

        let mut handle = client::connect_stream(Arc::clone(&self.config), stream, handler).await?;

        let accepted = match request.credential {
            Credential::Password(password) => {
                handle.authenticate_password(request.user, password).await?
            }
            Credential::PrivateKey(key) => handle.authenticate_publickey(request.user, key).await?,
        };
        if !accepted {
            return Err(TunnelError::AuthRejected(request.user.to_string()));
        }

        info!(
            proxy = request.endpoint,
            host = request.host,
            port = request.port,
            user = request.user,
            "SSH session established"
        );
        Ok(Arc::new(SshTransport { handle }))
    }
}

/// An authenticated SSH session. Channels are opened concurrently on the
/// shared handle.
struct SshTransport {
    handle: client::Handle<ClientHandler>,
}

#[async_trait]
impl Transport for SshTransport {
    async fn open_channel(&self, host: &str, port: u16) -> Result<BoxedStream, TunnelError> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), DEFAULT_ORIGINATOR_ADDR, 0)
            .await?;
        Ok(Box::new(channel.into_stream()))
    }
}
