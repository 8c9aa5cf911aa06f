//! Container Runtime Adapter — the thin abstraction over the container
//! engine the Connection Manager is coded against (spec §4.2).

mod bollard_runtime;
mod launch_spec;
mod runtime;

pub use bollard_runtime::BollardRuntime;
pub use launch_spec::{LaunchSpec, APP_NAME};
pub use runtime::{ContainerHandle, ContainerRuntime, ContainerStatus};
