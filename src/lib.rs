//! Non-interactive shell execution over ADB wireless debugging
//!
//! The bridge pairs with and connects to one device through an
//! [`transport::AdbTransport`] supplied by the host application, then runs
//! one-shot shell commands with a bounded wait and exactly one result per
//! command. Device identity material lives in the [`identity`] crate.

pub mod bridge;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod transport;

pub use adb_bridge_identity as identity;
pub use bridge::AdbBridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, ValidationError};

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
