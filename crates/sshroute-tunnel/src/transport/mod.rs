//! Pluggable transport abstraction.
//!
//! Three seams cover everything the connect phase and the router do on the
//! wire: dialing a raw network connection, running an authenticated
//! handshake over some stream, and opening a logical channel through an
//! established transport.

pub mod ssh;
pub mod tcp;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::credential::Credential;
use crate::error::TunnelError;

/// Marker trait for byte streams carried by the router and connector.
pub trait TunnelStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> TunnelStream for T {}

/// A type-erased stream: a TCP socket, an SSH channel, or a test double.
pub type BoxedStream = Box<dyn TunnelStream>;

/// Opens raw network connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream>;
}

/// An established, authenticated tunnel.
///
/// Implementations must allow concurrent `open_channel` calls from many
/// sessions at once; the handle is shared read-only after startup.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a logical channel to `host:port`, resolved by the far end.
    async fn open_channel(&self, host: &str, port: u16) -> Result<BoxedStream, TunnelError>;
}

/// Everything a handshake needs besides the stream itself.
#[derive(Debug)]
pub struct HandshakeRequest<'a> {
    /// Endpoint name, for logging.
    pub endpoint: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub user: &'a str,
    pub credential: Credential,
}

/// Runs the secure handshake over an already-open stream.
#[async_trait]
pub trait Handshaker: Send + Sync {
    async fn handshake(
        &self,
        stream: BoxedStream,
        request: HandshakeRequest<'_>,
    ) -> Result<Arc<dyn Transport>, TunnelError>;
}
