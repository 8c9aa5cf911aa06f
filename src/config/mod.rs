//! Configuration management module.
//!
//! Typed honeypot/global config plus JSON Schema validated loading.

mod model;
mod schema;

pub use model::{ContainerOptions, GlobalConfig, HoneypotSpec, MountSpec};
pub use schema::{apply_overrides, load};
