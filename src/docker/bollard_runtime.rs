//! Bollard-backed [`ContainerRuntime`].
//!
//! Grounded on the teacher's `environment/docker/{container,power}.rs`:
//! same capability-drop list, same `no-new-privileges` security option,
//! same auto-remove + no-restart-policy shape, adapted from a long-lived
//! game-server container to a disposable, one-shot honeypot sandbox.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DaemonError;

use super::launch_spec::{LaunchSpec, APP_NAME};
use super::runtime::{ContainerHandle, ContainerRuntime, ContainerStatus};

pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, DaemonError> {
        let client = Docker::connect_with_local_defaults().map_err(DaemonError::Docker)?;
        Ok(Self { client })
    }

    /// Cheap connectivity probe for the diagnostics subcommand; does not
    /// touch any image or container.
    pub async fn ping(&self) -> Result<(), DaemonError> {
        self.client.ping().await.map(|_| ()).map_err(DaemonError::Docker)
    }

    /// Security hardening: drop the full Linux capability set a
    /// disposable honeypot sandbox has no business holding.
    fn dropped_capabilities() -> Vec<String> {
        vec![
            "setpcap", "mknod", "audit_write", "net_raw", "dac_override", "fowner", "fsetid",
            "net_bind_service", "sys_chroot", "setfcap", "audit_control", "audit_read",
            "block_suspend", "dac_read_search", "ipc_lock", "ipc_owner", "lease",
            "linux_immutable", "mac_admin", "mac_override", "net_admin", "net_broadcast",
            "syslog", "sys_admin", "sys_boot", "sys_module", "sys_nice", "sys_pacct",
            "sys_ptrace", "sys_rawio", "sys_resource", "sys_time", "sys_tty_config",
            "wake_alarm",
        ]
        .into_iter()
        .map(|s| s.to_uppercase())
        .collect()
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle, DaemonError> {
        // Disposable container name; never reused across sessions.
        let name = format!("honeypot_{}_{}", spec.honeypot_name, Uuid::new_v4());

        let mounts: Vec<Mount> = spec
            .volumes
            .iter()
            .map(|(source, target, read_only)| Mount {
                source: Some(source.clone()),
                target: Some(target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(*read_only),
                ..Default::default()
            })
            .collect();

        // REDESIGN FLAG 1 (SPEC_FULL.md §7): correlate a container's logs
        // by label instead of a Go-template log-config tag, since bollard's
        // typed log-config takes a driver name + static config map.
        let mut labels = HashMap::new();
        labels.insert("service".to_string(), APP_NAME.to_string());
        labels.insert("honeypot".to_string(), spec.honeypot_name.clone());

        let host_config = HostConfig {
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            auto_remove: Some(true),
            network_mode: spec.network_mode.clone().or_else(|| spec.network.clone()),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            cap_drop: Some(Self::dropped_capabilities()),
            readonly_rootfs: Some(spec.read_only),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                ..Default::default()
            }),
            log_config: Some(bollard::models::HostConfigLogConfig {
                typ: Some("json-file".to_string()),
                config: Some({
                    let mut cfg = HashMap::new();
                    cfg.insert("max-size".to_string(), "5m".to_string());
                    cfg.insert("max-file".to_string(), "1".to_string());
                    cfg
                }),
            }),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: spec.hostname.clone(),
            cmd: spec.command.clone(),
            env: if spec.environment.is_empty() {
                None
            } else {
                Some(spec.environment.clone())
            },
            user: spec.user.clone(),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        self.client
            .create_container(Some(options), config)
            .await
            .map_err(DaemonError::Docker)?;

        self.client
            .start_container::<String>(&name, None)
            .await
            .map_err(DaemonError::Docker)?;

        info!(container = %name, honeypot = %spec.honeypot_name, "launched honeypot container");
        Ok(ContainerHandle::new(name))
    }

    async fn get(&self, id: &str) -> Result<ContainerHandle, DaemonError> {
        self.client
            .inspect_container(id, None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    DaemonError::ContainerNotFound(id.to_string())
                }
                other => DaemonError::Docker(other),
            })?;
        Ok(ContainerHandle::new(id))
    }

    async fn status(&self, id: &str) -> Result<ContainerStatus, DaemonError> {
        let info = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(DaemonError::Docker)?;

        let running = info.state.and_then(|s| s.running).unwrap_or(false);
        Ok(if running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Exited
        })
    }

    async fn ip_address(&self, id: &str) -> Result<String, DaemonError> {
        let info = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(DaemonError::Docker)?;

        info.network_settings
            .and_then(|n| n.ip_address)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| DaemonError::ContainerNotFound(id.to_string()))
    }

    async fn stop(&self, id: &str) {
        match self.status(id).await {
            Ok(ContainerStatus::Running) => {
                let options = StopContainerOptions { t: 10 };
                if let Err(e) = self.client.stop_container(id, Some(options)).await {
                    warn!(container = %id, error = %e, "failed to stop container; killing");
                    let kill_options = KillContainerOptions { signal: "SIGKILL" };
                    if let Err(e) = self.client.kill_container(id, Some(kill_options)).await {
                        warn!(container = %id, error = %e, "failed to kill container");
                    }
                }
            }
            Ok(_) => debug!(container = %id, "container already stopped"),
            Err(e) => warn!(container = %id, error = %e, "failed to query container status for stop"),
        }

        // Auto-remove handles cleanup; belt-and-braces removal in case
        // the engine left the container behind (e.g. it never started).
        let remove_options = RemoveContainerOptions { force: true, v: false, ..Default::default() };
        if let Err(e) = self.client.remove_container(id, Some(remove_options)).await {
            debug!(container = %id, error = %e, "remove_container after stop (likely already gone)");
        }
    }

    async fn ensure_image(&self, image: &str, force: bool) -> Result<(), DaemonError> {
        if !force {
            match self.client.inspect_image(image).await {
                Ok(_) => {
                    debug!(%image, "image already present");
                    return Ok(());
                }
                Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                    info!(%image, "image not found locally, pulling");
                }
                Err(e) => {
                    warn!(%image, error = %e, "error inspecting image, attempting pull anyway");
                }
            }
        } else {
            info!(%image, "force-pull requested");
        }

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!(%image, %status, "pull progress");
                    }
                }
                Err(e) => {
                    return Err(DaemonError::Docker(e));
                }
            }
        }

        info!(%image, "image pulled successfully");
        Ok(())
    }
}
