//! Default entry point: load config, build the runtime adapter, run the
//! supervisor until a shutdown signal fires.

use std::net::Ipv4Addr;

use tracing::error;

use crate::config;
use crate::docker::{BollardRuntime, ContainerRuntime};
use crate::error::DaemonError;
use crate::supervisor::Supervisor;

pub struct RunOptions {
    pub config_path: String,
    pub bind: Option<Ipv4Addr>,
    pub max_connections: Option<u32>,
    pub force_pull: bool,
}

pub async fn run(options: RunOptions) -> Result<(), DaemonError> {
    let raw = config::load(&options.config_path)?;
    let config = config::apply_overrides(raw, options.bind, options.max_connections);

    let runtime: std::sync::Arc<dyn ContainerRuntime> = match BollardRuntime::connect() {
        Ok(runtime) => std::sync::Arc::new(runtime),
        Err(e) => {
            error!(error = %e, "could not connect to the container engine");
            return Err(e);
        }
    };

    let supervisor = Supervisor::init(config, runtime, options.force_pull).await?;
    supervisor.run().await
}
