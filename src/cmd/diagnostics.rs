//! `honeypotd diagnostics` — prints the resolved configuration and
//! checks container-engine connectivity. Ambient operability tooling,
//! outside the connection manager's invariants (SPEC_FULL.md §4.6).

use std::net::Ipv4Addr;

use tracing::info;

use crate::config;
use crate::docker::BollardRuntime;
use crate::error::DaemonError;

pub struct DiagnosticsOptions {
    pub config_path: String,
    pub bind: Option<Ipv4Addr>,
    pub max_connections: Option<u32>,
}

pub async fn run(options: DiagnosticsOptions) -> Result<(), DaemonError> {
    let raw = config::load(&options.config_path)?;
    let config = config::apply_overrides(raw, options.bind, options.max_connections);

    println!("bind: {}", config.bind);
    println!("max_connections: {}", config.max_connections);
    println!("honeypots: {}", config.honeypots_num());
    for honeypot in &config.honeypots {
        println!(
            "  - {} (image={}, port={}, container_port={})",
            honeypot.name, honeypot.image, honeypot.port, honeypot.container_port
        );
    }
    println!("backlog per listener: {}", config.backlog());

    match BollardRuntime::connect() {
        Ok(runtime) => match runtime.ping().await {
            Ok(()) => {
                info!("container engine reachable");
                println!("docker: reachable");
            }
            Err(e) => {
                println!("docker: connected but ping failed ({e})");
            }
        },
        Err(e) => {
            println!("docker: unreachable ({e})");
        }
    }

    Ok(())
}
