//! Typed configuration surface consumed by the [`crate::supervisor::Supervisor`].
//!
//! The container option bag is materialized as a struct with the exact
//! keys enumerated by the honeypot options schema rather than a dynamic
//! try-fetch-or-default lookup: missing keys stay unset, with no implicit
//! coercion.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Deserialize;

/// A single bind-mount volume entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountSpec {
    /// Path inside the container.
    pub target: String,
    /// Mount mode, e.g. `"rw"` or `"ro"`.
    #[serde(default = "default_mount_mode")]
    pub mode: String,
}

fn default_mount_mode() -> String {
    "rw".to_string()
}

/// Recognized per-honeypot container options (see spec §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Overrides the image's default entrypoint arguments.
    pub command: Option<Vec<String>>,
    /// Environment variables injected into the container.
    pub environment: HashMap<String, String>,
    /// Container hostname.
    pub hostname: Option<String>,
    /// User-defined network to attach to.
    pub network: Option<String>,
    /// Predefined network mode (e.g. `host`, `bridge`, `none`).
    pub network_mode: Option<String>,
    /// Mount the root filesystem read-only.
    pub read_only: bool,
    /// Container process uid:gid, e.g. `"1000:1000"`.
    pub user: Option<String>,
    /// Bind mounts, keyed by host path.
    pub volumes: HashMap<String, MountSpec>,
}

/// Immutable description of one configured honeypot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HoneypotSpec {
    pub name: String,
    pub image: String,
    pub port: u16,
    pub container_port: u16,
    #[serde(default)]
    pub options: ContainerOptions,
    /// Optional cap on the dial loop, in seconds. Unset means unbounded,
    /// matching the distilled spec's literal behavior (see Open Question 1
    /// and REDESIGN FLAG 2 in SPEC_FULL.md).
    #[serde(default)]
    pub dial_timeout_secs: Option<u64>,
}

/// Global knobs shared by every honeypot.
///
/// `Debug` is implemented by hand in `config::schema` to avoid dumping
/// every honeypot's full option bag (including secrets in `environment`)
/// into debug logs.
#[derive(Clone, Deserialize)]
pub struct GlobalConfig {
    pub bind: Ipv4Addr,
    pub max_connections: u32,
    pub honeypots: Vec<HoneypotSpec>,
}

impl GlobalConfig {
    /// Number of configured honeypots — `honeypots_num` in the spec.
    pub fn honeypots_num(&self) -> u32 {
        self.honeypots.len() as u32
    }

    /// Per-listener backlog: `floor(max_connections / honeypots_num)`.
    ///
    /// Panics if there are no honeypots; callers validate
    /// `honeypots_num >= 1` before constructing listeners.
    pub fn backlog(&self) -> u32 {
        self.max_connections / self.honeypots_num()
    }

    /// All distinct images referenced by the configured honeypots, in
    /// first-seen order (mirrors the original's image pre-pull scan).
    pub fn distinct_images(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for honeypot in &self.honeypots {
            if !seen.contains(&honeypot.image.as_str()) {
                seen.push(honeypot.image.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, image: &str) -> HoneypotSpec {
        HoneypotSpec {
            name: name.to_string(),
            image: image.to_string(),
            port: 2222,
            container_port: 22,
            options: ContainerOptions::default(),
            dial_timeout_secs: None,
        }
    }

    #[test]
    fn backlog_floors() {
        let config = GlobalConfig {
            bind: Ipv4Addr::LOCALHOST,
            max_connections: 10,
            honeypots: vec![spec("a", "img/a"), spec("b", "img/a"), spec("c", "img/a")],
        };
        assert_eq!(config.honeypots_num(), 3);
        assert_eq!(config.backlog(), 3);
    }

    #[test]
    fn distinct_images_dedupes_in_order() {
        let config = GlobalConfig {
            bind: Ipv4Addr::LOCALHOST,
            max_connections: 10,
            honeypots: vec![spec("a", "img/ssh"), spec("b", "img/http"), spec("c", "img/ssh")],
        };
        assert_eq!(config.distinct_images(), vec!["img/ssh", "img/http"]);
    }

    #[test]
    fn options_default_to_unset() {
        let opts: ContainerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, ContainerOptions::default());
        assert!(opts.command.is_none());
        assert!(!opts.read_only);
    }
}
