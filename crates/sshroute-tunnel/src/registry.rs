//! Named tunnel endpoints and their parent links.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use sshroute_config::{Config, ProxyConfig};
use tracing::warn;

use crate::credential::CredentialSource;
use crate::error::{RegistryError, TunnelError};
use crate::transport::Transport;

/// Static description of one endpoint, before any connection exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub parent: Option<String>,
    pub credential: CredentialSource,
}

impl EndpointSpec {
    pub fn from_config(name: &str, proxy: &ProxyConfig) -> Self {
        Self {
            name: name.to_string(),
            host: proxy.host.clone(),
            port: proxy.port,
            user: proxy.user.clone(),
            parent: proxy.parent_name().map(str::to_string),
            credential: CredentialSource::from_config(proxy),
        }
    }
}

/// A configured endpoint.
///
/// The parent link is resolved once when the registry is built. The
/// transport is written once by the connect phase and only read afterwards.
pub struct Endpoint {
    spec: EndpointSpec,
    parent: OnceLock<Weak<Endpoint>>,
    transport: OnceLock<Arc<dyn Transport>>,
}

impl Endpoint {
    fn new(spec: EndpointSpec) -> Self {
        Self {
            spec,
            parent: OnceLock::new(),
            transport: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn host(&self) -> &str {
        &self.spec.host
    }

    pub fn port(&self) -> u16 {
        self.spec.port
    }

    pub fn user(&self) -> &str {
        &self.spec.user
    }

    pub fn credential(&self) -> &CredentialSource {
        &self.spec.credential
    }

    /// `host:port` of the SSH server.
    pub fn addr(&self) -> String {
        if self.spec.host.contains(':') {
            format!("[{}]:{}", self.spec.host, self.spec.port)
        } else {
            format!("{}:{}", self.spec.host, self.spec.port)
        }
    }

    /// The endpoint this one tunnels through, if it has a known parent.
    pub fn parent(&self) -> Option<Arc<Endpoint>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// The configured parent name, which may not exist in the registry.
    pub fn parent_name(&self) -> Option<&str> {
        self.spec.parent.as_deref()
    }

    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.get()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.get().is_some()
    }

    /// Store the established transport. Fails if one is already set.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> Result<(), TunnelError> {
        self.transport
            .set(transport)
            .map_err(|_| TunnelError::AlreadyConnected(self.spec.name.clone()))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.spec.name)
            .field("addr", &self.addr())
            .field("user", &self.spec.user)
            .field("parent", &self.spec.parent)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// All configured endpoints, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl Registry {
    /// Build the registry and resolve parent links.
    ///
    /// A parent name that is not defined leaves the endpoint without a
    /// parent; it is then dialed directly like a root. Duplicate names keep
    /// the last spec.
    pub fn load(specs: impl IntoIterator<Item = EndpointSpec>) -> Self {
        let endpoints: HashMap<String, Arc<Endpoint>> = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), Arc::new(Endpoint::new(spec))))
            .collect();

        for endpoint in endpoints.values() {
            let Some(parent_name) = endpoint.parent_name() else {
                continue;
            };
            match endpoints.get(parent_name) {
                Some(parent) => {
                    let _ = endpoint.parent.set(Arc::downgrade(parent));
                }
                None => warn!(
                    proxy = endpoint.name(),
                    parent = parent_name,
                    "parent proxy not defined, treating as root"
                ),
            }
        }

        Self { endpoints }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::load(
            config
                .proxies
                .iter()
                .map(|(name, proxy)| EndpointSpec::from_config(name, proxy)),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.values()
    }

    /// Every endpoint ordered so that each parent precedes its children.
    ///
    /// Among endpoints that are ready at the same time, names sort
    /// alphabetically, so the order is stable across runs.
    pub fn connect_order(&self) -> Result<Vec<Arc<Endpoint>>, RegistryError> {
        let mut pending: HashMap<&str, usize> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

        for endpoint in self.endpoints.values() {
            match endpoint.parent_name().filter(|_| endpoint.parent().is_some()) {
                Some(parent_name) => {
                    pending.insert(endpoint.name(), 1);
                    children.entry(parent_name).or_default().push(endpoint.name());
                }
                None => {
                    pending.insert(endpoint.name(), 0);
                }
            }
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.endpoints.len());

        while let Some(name) = ready.pop_first() {
            if let Some(endpoint) = self.endpoints.get(name) {
                order.push(Arc::clone(endpoint));
            }
            for child in children.get(name).into_iter().flatten() {
                if let Some(n) = pending.get_mut(child) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if order.len() < self.endpoints.len() {
            // Unplaced endpoints are on a cycle or below one; report the cycle.
            let mut on_cycle: Vec<String> = pending
                .into_iter()
                .filter(|(name, n)| *n > 0 && self.reaches_itself(name))
                .map(|(name, _)| name.to_string())
                .collect();
            on_cycle.sort();
            return Err(RegistryError::Cycle(on_cycle));
        }

        Ok(order)
    }

    fn reaches_itself(&self, name: &str) -> bool {
        let mut current = self.endpoints.get(name).and_then(|e| e.parent());
        for _ in 0..self.endpoints.len() {
            match current {
                Some(endpoint) if endpoint.name() == name => return true,
                Some(endpoint) => current = endpoint.parent(),
                None => return false,
            }
        }
        false
    }

    /// The endpoint and its ancestors, nearest first.
    pub fn chain(&self, name: &str) -> Vec<Arc<Endpoint>> {
        let mut chain = Vec::new();
        let mut current = self.endpoints.get(name).cloned();
        while let Some(endpoint) = current {
            if chain.iter().any(|e: &Arc<Endpoint>| e.name() == endpoint.name()) {
                break;
            }
            current = endpoint.parent();
            chain.push(endpoint);
        }
        chain
    }
}
