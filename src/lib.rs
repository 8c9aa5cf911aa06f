//! Honeypot dispatcher: per-honeypot TCP listener that provisions a
//! disposable container per connection and proxies bytes bidirectionally
//! until either side closes.

pub mod cmd;
pub mod config;
pub mod docker;
pub mod error;
pub mod logging;
pub mod manager;
pub mod session;
pub mod supervisor;
pub mod waiter;
