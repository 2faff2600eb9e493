//! Consumer-facing bridge wiring session, executor and identity together

use crate::command::{CommandExecutor, TimeoutWatchdog};
use crate::config::BridgeConfig;
use crate::connection::{ConnectTarget, ConnectionSession, PairTarget, SessionState};
use crate::error::{BridgeError, BridgeResult};
use crate::pool::WorkerPool;
use crate::transport::AdbTransport;
use adb_bridge_identity::IdentityStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Entry point owned by the hosting application.
///
/// Every operation resolves on the caller's task with either a short
/// success message or a [`BridgeError`] whose `Display` is the failure
/// message to show the user.
pub struct AdbBridge {
    config: BridgeConfig,
    identity: Arc<IdentityStore>,
    session: Arc<ConnectionSession>,
    watchdog: Arc<TimeoutWatchdog>,
    pool: Arc<WorkerPool>,
    executor: CommandExecutor,
}

impl AdbBridge {
    /// Load or create the device identity, then build the transport with
    /// `factory`.
    ///
    /// Identity failures are fatal: without key material nothing can
    /// authenticate to a device.
    pub fn open<F>(config: BridgeConfig, factory: F) -> BridgeResult<Self>
    where
        F: FnOnce(&Arc<IdentityStore>, &BridgeConfig) -> anyhow::Result<Arc<dyn AdbTransport>>,
    {
        let identity = Arc::new(IdentityStore::new(&config.identity_dir));
        if let Err(e) = identity.load_or_init() {
            error!("Identity setup in {} failed: {}", config.identity_dir.display(), e);
            return Err(e.into());
        }

        let transport = factory(&identity, &config).map_err(BridgeError::transport)?;
        Ok(Self::with_transport(config, identity, transport))
    }

    /// Assemble a bridge from parts that already exist
    pub fn with_transport(
        config: BridgeConfig,
        identity: Arc<IdentityStore>,
        transport: Arc<dyn AdbTransport>,
    ) -> Self {
        let session = Arc::new(ConnectionSession::new(transport, config.api_level));
        let watchdog = Arc::new(TimeoutWatchdog::new());
        let pool = Arc::new(WorkerPool::new(config.worker_capacity));
        let executor = CommandExecutor::new(
            session.clone(),
            watchdog.clone(),
            pool.clone(),
            config.command_timeout,
            config.poll_interval,
        );

        info!(
            "ADB bridge ready (device {}, {} workers)",
            config.device_name(),
            pool.capacity()
        );
        Self {
            config,
            identity,
            session,
            watchdog,
            pool,
            executor,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Pair with a device using the code it displays
    pub async fn pair(
        &self,
        host: Option<&str>,
        port: Option<&str>,
        code: Option<&str>,
    ) -> BridgeResult<String> {
        let target = PairTarget::parse(host, port, code)?;
        let message = format!("paired with {}:{}", target.host, target.port);

        let session = self.session.clone();
        join_worker(self.pool.spawn(async move { session.pair(&target).await })).await?;
        Ok(message)
    }

    /// Connect to a paired device. Missing or unparsable ports fall back to 5555.
    pub async fn connect(&self, host: Option<&str>, port: Option<&str>) -> BridgeResult<String> {
        let target = ConnectTarget::parse(host, port);
        let message = format!("connected to {}:{}", target.host, target.port);

        let session = self.session.clone();
        join_worker(self.pool.spawn(async move { session.connect(&target).await })).await?;
        Ok(message)
    }

    /// Run one shell command and return its trimmed output
    pub async fn execute(&self, command: &str) -> BridgeResult<String> {
        self.executor.execute_non_interactive(command).await
    }

    /// Disconnect. Transport errors are logged and the session is dropped anyway.
    pub async fn disconnect(&self) -> BridgeResult<String> {
        let session = self.session.clone();
        join_worker(self.pool.spawn(async move {
            session.disconnect().await;
            Ok(())
        }))
        .await?;
        Ok("disconnected".to_string())
    }

    pub fn set_command_timeout(&self, timeout: Duration) {
        self.executor.set_command_timeout(timeout);
    }

    pub fn command_timeout(&self) -> Duration {
        self.executor.command_timeout()
    }

    /// Run only the next command without a timeout
    pub fn skip_next_timeout(&self) {
        self.executor.skip_next_timeout();
    }

    /// Stop accepting work and release the transport
    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.watchdog.cancel_all();
        self.session.shutdown();
        info!("ADB bridge shut down");
    }
}

async fn join_worker<T>(handle: JoinHandle<Option<BridgeResult<T>>>) -> BridgeResult<T> {
    match handle.await {
        Ok(Some(result)) => result,
        Ok(None) => Err(BridgeError::NotInitialized),
        Err(e) => Err(BridgeError::Protocol(format!("worker failed: {}", e))),
    }
}
