//! Raw TCP dialing for root endpoints and direct connections.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use sshroute_config::TcpConfig;
use tokio::net::TcpStream;
use tracing::debug;

use super::{BoxedStream, Dialer};

/// Dials with `TcpStream::connect`, resolving names with the system resolver.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    config: TcpConfig,
}

impl TcpDialer {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Connect and apply socket options, returning the concrete stream.
    pub async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        apply_tcp_options(&stream, &self.config)?;
        debug!(host, port, peer = ?stream.peer_addr().ok(), "tcp connected");
        Ok(stream)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream> {
        let stream = self.connect(host, port).await?;
        Ok(Box::new(stream))
    }
}

fn apply_tcp_options(stream: &TcpStream, config: &TcpConfig) -> io::Result<()> {
    stream.set_nodelay(config.no_delay)?;

    if config.keepalive_secs > 0 {
        let sock = socket2::SockRef::from(stream);
        let keepalive =
            socket2::TcpKeepalive::new().with_time(Duration::from_secs(config.keepalive_secs));
        sock.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}
