//! Daemon-wide error types.

use thiserror::Error;

use crate::config::HoneypotSpec;

/// Raised when a [`crate::manager::ConnectionManager`] fails to bind its
/// listening socket.
#[derive(Debug, Error)]
#[error("cannot bind local port '{port}' for honeypot '{name}' - {reason}!", port = spec.port, name = spec.name)]
pub struct CannotBindPort {
    pub spec: Box<HoneypotSpec>,
    pub reason: String,
}

impl CannotBindPort {
    pub fn new(spec: &HoneypotSpec, reason: impl Into<String>) -> Self {
        Self {
            spec: Box::new(spec.clone()),
            reason: reason.into(),
        }
    }
}

/// Top-level daemon error.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    CannotBindPort(#[from] CannotBindPort),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("invalid honeypot configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
