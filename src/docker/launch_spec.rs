//! Translates a [`HoneypotSpec`] + its [`ContainerOptions`] into the
//! engine-agnostic description the [`super::ContainerRuntime`] consumes.

use crate::config::HoneypotSpec;

pub const APP_NAME: &str = "honeypotd";

/// Everything the runtime needs to launch one session's container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub image: String,
    pub honeypot_name: String,
    pub command: Option<Vec<String>>,
    pub environment: Vec<String>,
    pub hostname: Option<String>,
    pub network: Option<String>,
    pub network_mode: Option<String>,
    pub read_only: bool,
    pub user: Option<String>,
    pub volumes: Vec<(String, String, bool)>,
}

impl LaunchSpec {
    pub fn from_honeypot(spec: &HoneypotSpec) -> Self {
        let options = &spec.options;

        let environment = options
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let volumes = options
            .volumes
            .iter()
            .map(|(host, mount)| (host.clone(), mount.target.clone(), mount.mode == "ro"))
            .collect();

        Self {
            image: spec.image.clone(),
            honeypot_name: spec.name.clone(),
            command: options.command.clone(),
            environment,
            hostname: options.hostname.clone(),
            network: options.network.clone(),
            network_mode: options.network_mode.clone(),
            read_only: options.read_only,
            user: options.user.clone(),
            volumes,
        }
    }
}
