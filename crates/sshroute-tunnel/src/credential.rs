//! Credential sources and resolution.
//!
//! An endpoint authenticates with exactly one secret, picked in this order:
//! environment variable, private key file, literal password, and finally an
//! interactive prompt on the terminal.

use std::fmt;
use std::io;
use std::sync::Arc;

use russh_keys::key::KeyPair;
use sshroute_config::{ProxyConfig, expand_home};
use tracing::debug;

use crate::error::TunnelError;

/// Where an endpoint's secret comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Password read from the named environment variable.
    Variable(String),
    /// Private key file. A leading `~` is expanded when resolving.
    KeyFile(String),
    /// Literal password from the configuration.
    Password(String),
    /// Ask on the terminal.
    Prompt,
}

impl CredentialSource {
    /// Pick the source for a configured endpoint. When several fields are
    /// set only the first of `variable`, `key`, `password` is used.
    pub fn from_config(proxy: &ProxyConfig) -> Self {
        if let Some(var) = proxy.variable_name() {
            CredentialSource::Variable(var.to_string())
        } else if let Some(key) = proxy.key_path() {
            CredentialSource::KeyFile(key.to_string())
        } else if let Some(password) = proxy.password_literal() {
            CredentialSource::Password(password.to_string())
        } else {
            CredentialSource::Prompt
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CredentialSource::Variable(_) => "variable",
            CredentialSource::KeyFile(_) => "key",
            CredentialSource::Password(_) => "password",
            CredentialSource::Prompt => "prompt",
        }
    }

    /// Produce the secret.
    ///
    /// `host` is only used in the prompt text. Prompting runs on the
    /// blocking pool.
    pub async fn resolve(
        &self,
        host: &str,
        secrets: &Arc<dyn SecretSource>,
    ) -> Result<Credential, TunnelError> {
        debug!(source = self.kind(), host, "resolving credential");
        match self {
            CredentialSource::Variable(name) => secrets
                .env_var(name)
                .map(Credential::Password)
                .ok_or_else(|| {
                    TunnelError::Credential(format!("environment variable {name} is not set"))
                }),
            CredentialSource::KeyFile(path) => {
                let path = expand_home(path);
                let key = russh_keys::load_secret_key(&path, None)
                    .map_err(|source| TunnelError::PrivateKey { path, source })?;
                Ok(Credential::PrivateKey(Arc::new(key)))
            }
            CredentialSource::Password(password) => Ok(Credential::Password(password.clone())),
            CredentialSource::Prompt => {
                let message = format!("Please enter SSH password for {host}: ");
                let secrets = Arc::clone(secrets);
                let password = tokio::task::spawn_blocking(move || secrets.prompt_password(&message))
                    .await
                    .map_err(|e| TunnelError::Credential(format!("password prompt failed: {e}")))?
                    .map_err(|e| TunnelError::Credential(format!("password prompt failed: {e}")))?;
                Ok(Credential::Password(password))
            }
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Variable(name) => f.debug_tuple("Variable").field(name).finish(),
            CredentialSource::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            CredentialSource::Password(_) => f.write_str("Password(<redacted>)"),
            CredentialSource::Prompt => f.write_str("Prompt"),
        }
    }
}

/// A resolved secret, ready for the handshake.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    PrivateKey(Arc<KeyPair>),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
        }
    }
}

/// Process environment and terminal access.
pub trait SecretSource: Send + Sync + 'static {
    fn env_var(&self, name: &str) -> Option<String>;

    /// Read a password without echo.
    fn prompt_password(&self, message: &str) -> io::Result<String>;
}

/// Reads the real environment and prompts on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSecrets;

impl SecretSource for SystemSecrets {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn prompt_password(&self, message: &str) -> io::Result<String> {
        rpassword::prompt_password(message)
    }
}
