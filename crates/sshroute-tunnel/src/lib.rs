//! Chained SSH tunnel endpoints and per-destination routing.
//!
//! # Architecture
//!
//! - [`Registry`]: named endpoints with resolved parent links.
//! - [`ChainConnector`]: connects every endpoint once at startup, parents
//!   first. A root endpoint dials the network; a child endpoint runs its SSH
//!   handshake over a `direct-tcpip` channel opened on its parent.
//! - [`Router`]: picks the first rule matching a destination whose endpoint is
//!   connected and opens a channel through it, or dials directly.
//!
//! Network dials, SSH handshakes and channel opens sit behind the
//! [`Dialer`], [`Handshaker`] and [`Transport`] traits; [`TcpDialer`] and
//! [`SshHandshaker`] are the production implementations.

pub mod connector;
pub mod credential;
pub mod error;
pub mod registry;
pub mod router;
pub mod transport;

pub use connector::ChainConnector;
pub use credential::{Credential, CredentialSource, SecretSource, SystemSecrets};
pub use error::{ConnectError, RegistryError, RouteError, TunnelError};
pub use registry::{Endpoint, EndpointSpec, Registry};
pub use router::{Route, RoutedStream, Router, TargetAddr};
pub use transport::ssh::{HostKeyPolicy, SshHandshaker};
pub use transport::tcp::TcpDialer;
pub use transport::{BoxedStream, Dialer, HandshakeRequest, Handshaker, Transport, TunnelStream};
