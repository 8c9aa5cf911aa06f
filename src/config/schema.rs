//! Config file loading and JSON Schema validation.
//!
//! Mirrors the original tool's loader: read `config.json`, validate it
//! against a schema file, then deserialize into the typed [`GlobalConfig`].

use std::path::Path;

use tracing::{debug, info};

use crate::error::DaemonError;

use super::model::GlobalConfig;

const SCHEMA_FILE: &str = "config.schema.json";

/// Load and validate the configuration at `path`.
///
/// The schema file is looked up as `config.schema.json` next to the
/// config file (falling back to the current working directory if the
/// config path has no parent), per the sibling-schema contract in §6.
pub fn load(path: &str) -> Result<GlobalConfig, DaemonError> {
    info!("Loading server configuration...");

    let schema_path = Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(SCHEMA_FILE))
        .unwrap_or_else(|| Path::new(SCHEMA_FILE).to_path_buf());

    let schema_text = std::fs::read_to_string(&schema_path).map_err(|e| {
        DaemonError::Config(format!(
            "cannot open schema file '{}': {e}",
            schema_path.display()
        ))
    })?;
    let schema: serde_json::Value = serde_json::from_str(&schema_text)
        .map_err(|e| DaemonError::Config(format!("invalid schema file: {e}")))?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| DaemonError::Config(format!("invalid schema file: {e}")))?;

    let config_text = std::fs::read_to_string(path)
        .map_err(|e| DaemonError::Config(format!("cannot open configuration file '{path}': {e}")))?;
    let instance: serde_json::Value = serde_json::from_str(&config_text)
        .map_err(|e| DaemonError::Config(format!("invalid configuration file: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(DaemonError::Config(format!(
            "server configuration is invalid: {}",
            errors.join("; ")
        )));
    }

    let config: GlobalConfig = serde_json::from_value(instance)
        .map_err(|e| DaemonError::Config(format!("invalid configuration file: {e}")))?;

    info!("Server configuration loaded successfully!");
    debug!(?config, "loaded config");

    Ok(config)
}

/// Apply CLI overrides onto a loaded config, matching the original's
/// `--bind`/`--max-connections` semantics exactly (validation already
/// happened at the CLI parsing boundary).
pub fn apply_overrides(
    mut config: GlobalConfig,
    bind: Option<std::net::Ipv4Addr>,
    max_connections: Option<u32>,
) -> GlobalConfig {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(max_connections) = max_connections {
        config.max_connections = max_connections;
    }
    config
}

impl std::fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("bind", &self.bind)
            .field("max_connections", &self.max_connections)
            .field("honeypots", &self.honeypots.iter().map(|h| &h.name).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_valid_config() {
        let dir = tempfile::tempdir().unwrap();

        write_fixture(dir.path(), SCHEMA_FILE, include_str!("../../config.schema.json"));
        write_fixture(
            dir.path(),
            "config.json",
            r#"{
                "bind": "127.0.0.1",
                "max_connections": 10,
                "honeypots": [
                    {"name": "ssh", "image": "img/ssh", "port": 2222, "container_port": 22}
                ]
            }"#,
        );

        let config_path = dir.path().join("config.json");
        let config = load(config_path.to_str().unwrap()).unwrap();
        assert_eq!(config.honeypots_num(), 1);
        assert_eq!(config.honeypots[0].name, "ssh");
    }

    #[test]
    fn rejects_schema_violation() {
        let dir = tempfile::tempdir().unwrap();

        write_fixture(dir.path(), SCHEMA_FILE, include_str!("../../config.schema.json"));
        write_fixture(dir.path(), "config.json", r#"{"bind": "127.0.0.1"}"#);

        let config_path = dir.path().join("config.json");
        let err = load(config_path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }
}
