//! Bridge configuration and protocol defaults

use std::path::PathBuf;
use std::time::Duration;

/// Protocol defaults shared by the session and the executor
pub mod defaults {
    /// Host used when pairing or connecting without one
    pub const DEFAULT_HOST: &str = "127.0.0.1";

    /// Port used when connecting without a (parsable) one
    pub const DEFAULT_CONNECT_PORT: u32 = 5555;

    /// Android 11, the first release with wireless pairing
    pub const MIN_PAIRING_API_LEVEL: u32 = 30;

    /// Digits in a pairing code
    pub const PAIRING_CODE_LEN: usize = 6;

    /// Service prefix for non-interactive commands
    pub const SHELL_SERVICE_PREFIX: &str = "shell:";

    /// Service opened to check that a session is still alive
    pub const LIVENESS_PROBE_SERVICE: &str = "shell:echo test";

    /// Command timeout in seconds
    pub const COMMAND_TIMEOUT_SECS: u64 = 10;

    /// Completion check granularity in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 100;

    /// Concurrent pair/connect/execute operations
    pub const WORKER_CAPACITY: usize = 3;
}

/// Configuration for the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory holding the identity artifacts
    pub identity_dir: PathBuf,
    /// API level of the platform the bridge runs on
    pub api_level: u32,
    /// Device model, used to build the name presented to the device
    pub device_model: String,
    /// Bound on a single command unless the next call skips it
    pub command_timeout: Duration,
    /// How often a running command checks for a closed stream
    pub poll_interval: Duration,
    /// Worker pool capacity
    pub worker_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            identity_dir: PathBuf::from("adb-identity"),
            api_level: defaults::MIN_PAIRING_API_LEVEL,
            device_model: "rust".into(),
            command_timeout: Duration::from_secs(defaults::COMMAND_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            worker_capacity: defaults::WORKER_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Name presented to the device during the handshake
    pub fn device_name(&self) -> String {
        format!("{}_AdbService", self.device_model)
    }
}
