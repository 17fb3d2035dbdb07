//! Error types for the tunnel crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure establishing or using a single tunnel hop.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("failed to load private key {}: {source}", path.display())]
    PrivateKey {
        path: PathBuf,
        #[source]
        source: russh_keys::Error,
    },

    #[error("authentication rejected for user '{0}'")]
    AuthRejected(String),

    #[error("parent proxy '{0}' is not connected")]
    ParentNotConnected(String),

    #[error("proxy '{0}' is already connected")]
    AlreadyConnected(String),
}

impl TunnelError {
    /// The underlying I/O error kind, if this error came from the network.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TunnelError::Io(e) => Some(e.kind()),
            TunnelError::Ssh(russh::Error::IO(e)) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Problems in the endpoint dependency graph.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("proxy parent cycle between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Startup failure of the connect phase. Always fatal.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to connect proxy '{endpoint}' ({addr}): {source}")]
    Endpoint {
        endpoint: String,
        addr: String,
        #[source]
        source: TunnelError,
    },
}

impl ConnectError {
    /// Name of the endpoint that failed, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ConnectError::Endpoint { endpoint, .. } => Some(endpoint),
            ConnectError::Registry(_) => None,
        }
    }
}

/// Failure resolving one destination. Affects only the requesting session.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("unsupported network '{0}'")]
    UnsupportedNetwork(String),

    #[error("failed to open {target} through proxy '{endpoint}': {source}")]
    Tunnel {
        endpoint: String,
        target: String,
        #[source]
        source: TunnelError,
    },

    #[error("failed to connect to {target}: {source}")]
    Direct {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl RouteError {
    /// The underlying I/O error kind, used to pick a SOCKS reply code.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            RouteError::Tunnel { source, .. } => source.io_kind(),
            RouteError::Direct { source, .. } => Some(source.kind()),
            RouteError::UnsupportedNetwork(_) => None,
        }
    }
}
