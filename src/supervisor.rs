//! Owns one [`ConnectionManager`] per configured honeypot, pre-pulls
//! images, installs the shutdown hook, and coordinates orderly drain.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::docker::ContainerRuntime;
use crate::error::DaemonError;
use crate::manager::ConnectionManager;

pub struct Supervisor {
    config: GlobalConfig,
    runtime: Arc<dyn ContainerRuntime>,
    managers: Vec<Arc<ConnectionManager>>,
}

impl Supervisor {
    /// Validate the configuration, ensure every distinct image is
    /// available, and construct one Connection Manager per honeypot.
    pub async fn init(
        config: GlobalConfig,
        runtime: Arc<dyn ContainerRuntime>,
        force_pull: bool,
    ) -> Result<Self, DaemonError> {
        let honeypots_num = config.honeypots_num();
        if honeypots_num == 0 {
            return Err(DaemonError::InvalidConfig("no honeypots configured".to_string()));
        }
        if honeypots_num > config.max_connections {
            return Err(DaemonError::InvalidConfig(format!(
                "honeypots_num ({honeypots_num}) exceeds max_connections ({}); per-listener backlog would be zero",
                config.max_connections
            )));
        }

        for image in config.distinct_images() {
            info!(%image, "ensuring image is available");
            runtime.ensure_image(image, force_pull).await?;
        }

        let backlog = config.backlog();
        let mut managers = Vec::with_capacity(honeypots_num as usize);
        for spec in &config.honeypots {
            let manager = ConnectionManager::start(spec.clone(), config.bind, backlog, runtime.clone()).await?;
            managers.push(manager);
        }

        Ok(Self { config, runtime, managers })
    }

    /// Idle until a shutdown signal fires, then drain every manager in
    /// registration order.
    pub async fn run(&self) -> Result<(), DaemonError> {
        info!(honeypots = self.managers.len(), "supervisor ready");
        wait_for_shutdown_signal().await;
        self.shutdown().await;
        Ok(())
    }

    /// Calls `kill()` on every manager in registration order.
    pub async fn shutdown(&self) {
        info!("shutdown signal received, draining");
        for manager in &self.managers {
            manager.kill().await;
        }
        info!("all connection managers drained");
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => info!("received SIGTERM"),
        _ = interrupt.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerOptions, HoneypotSpec};
    use crate::docker::{ContainerHandle, ContainerStatus, LaunchSpec};
    use async_trait::async_trait;

    struct NoopRuntime;

    #[async_trait]
    impl ContainerRuntime for NoopRuntime {
        async fn launch(&self, _spec: &LaunchSpec) -> Result<ContainerHandle, DaemonError> {
            Ok(ContainerHandle::new("noop"))
        }
        async fn get(&self, id: &str) -> Result<ContainerHandle, DaemonError> {
            Ok(ContainerHandle::new(id))
        }
        async fn status(&self, _id: &str) -> Result<ContainerStatus, DaemonError> {
            Ok(ContainerStatus::Exited)
        }
        async fn ip_address(&self, _id: &str) -> Result<String, DaemonError> {
            Ok("127.0.0.1".to_string())
        }
        async fn stop(&self, _id: &str) {}
        async fn ensure_image(&self, _image: &str, _force: bool) -> Result<(), DaemonError> {
            Ok(())
        }
    }

    fn honeypot(name: &str, port: u16) -> HoneypotSpec {
        HoneypotSpec {
            name: name.to_string(),
            image: "img/echo".to_string(),
            port,
            container_port: 22,
            options: ContainerOptions::default(),
            dial_timeout_secs: None,
        }
    }

    async fn free_port() -> u16 {
        let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn rejects_oversubscription() {
        let config = GlobalConfig {
            bind: "127.0.0.1".parse().unwrap(),
            max_connections: 1,
            honeypots: vec![honeypot("a", 0), honeypot("b", 0)],
        };

        let result = Supervisor::init(config, Arc::new(NoopRuntime), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_honeypot_list() {
        let config = GlobalConfig {
            bind: "127.0.0.1".parse().unwrap(),
            max_connections: 10,
            honeypots: vec![],
        };

        let result = Supervisor::init(config, Arc::new(NoopRuntime), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn builds_one_manager_per_honeypot() {
        let port_a = free_port().await;
        let port_b = free_port().await;
        let config = GlobalConfig {
            bind: "127.0.0.1".parse().unwrap(),
            max_connections: 10,
            honeypots: vec![honeypot("a", port_a), honeypot("b", port_b)],
        };

        let supervisor = Supervisor::init(config, Arc::new(NoopRuntime), false).await.unwrap();
        assert_eq!(supervisor.managers.len(), 2);
        supervisor.shutdown().await;
    }
}
