//! Capability set exposed to the Connection Manager: `launch`, `get`,
//! `stop`, `status`, plus the container attributes it needs (id, IP).

use async_trait::async_trait;

use crate::error::DaemonError;

use super::launch_spec::LaunchSpec;

/// Coarse container lifecycle state, as observed by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Exited,
    Other,
}

/// A handle to a launched container: its id plus the attributes the
/// manager reads (`status`, `NetworkSettings.IPAddress`).
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Abstraction over the container engine. Hides whether the runtime is
/// local or remote; the Connection Manager uses only this interface.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start a detached container from `spec`, auto-removing on exit.
    async fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle, DaemonError>;

    /// Re-fetch a handle by id (used to read `status`/IP after launch).
    async fn get(&self, id: &str) -> Result<ContainerHandle, DaemonError>;

    /// Current status of the container.
    async fn status(&self, id: &str) -> Result<ContainerStatus, DaemonError>;

    /// The container's assigned IP address on its attached network.
    async fn ip_address(&self, id: &str) -> Result<String, DaemonError>;

    /// Idempotent best-effort stop. Implementations swallow engine
    /// errors themselves; the runtime's auto-remove is authoritative.
    async fn stop(&self, id: &str);

    /// Ensure `image` is present locally, pulling it if absent or if
    /// `force` is set.
    async fn ensure_image(&self, image: &str, force: bool) -> Result<(), DaemonError>;
}
