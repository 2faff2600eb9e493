//! Device session over the transport collaborator

use super::state::{SessionEvent, SessionState};
use super::target::{ConnectTarget, PairTarget};
use crate::config::defaults;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::{close_quietly, AdbStream, AdbTransport};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Tracks pairing and connection to one device.
///
/// The cached [`SessionState`] may lag behind the transport. It is only
/// reconciled by [`ConnectionSession::ensure_alive`], right before a command
/// runs. Locks are never held across an await.
pub struct ConnectionSession {
    transport: RwLock<Option<Arc<dyn AdbTransport>>>,
    state: RwLock<SessionState>,
    api_level: u32,
}

impl ConnectionSession {
    pub fn new(transport: Arc<dyn AdbTransport>, api_level: u32) -> Self {
        debug!("[SESSION] Using {} transport", transport.name());
        Self {
            transport: RwLock::new(Some(transport)),
            state: RwLock::new(SessionState::Disconnected),
            api_level,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_initialized(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The transport, or `NotInitialized` after shutdown
    pub fn transport(&self) -> BridgeResult<Arc<dyn AdbTransport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BridgeError::NotInitialized)
    }

    /// Apply `event`, returning whether it was valid in the current state
    fn transition(&self, event: SessionEvent) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.apply(event) {
            Some(next) => {
                if next != *state {
                    debug!("[SESSION] {} -> {} on {:?}", *state, next, event);
                }
                *state = next;
                true
            }
            None => {
                debug!("[SESSION] Ignoring {:?} while {}", event, *state);
                false
            }
        }
    }

    /// Pair with a device. Does not change the session state.
    pub async fn pair(&self, target: &PairTarget) -> BridgeResult<()> {
        let transport = self.transport()?;
        if self.api_level < defaults::MIN_PAIRING_API_LEVEL {
            return Err(BridgeError::UnsupportedPlatform {
                actual: self.api_level,
                required: defaults::MIN_PAIRING_API_LEVEL,
            });
        }

        info!("[SESSION] Pairing with {}:{}", target.host, target.port);
        match transport.pair(&target.host, target.port, &target.code).await {
            Ok(true) => {
                info!("[SESSION] Paired with {}:{}", target.host, target.port);
                Ok(())
            }
            Ok(false) => {
                warn!("[SESSION] Pairing with {}:{} rejected", target.host, target.port);
                Err(BridgeError::Transport(
                    "pairing rejected, check the IP address, pairing port and pairing code".into(),
                ))
            }
            Err(e) => {
                warn!("[SESSION] Pairing with {}:{} failed: {:#}", target.host, target.port, e);
                Err(BridgeError::transport(e))
            }
        }
    }

    /// Connect to a paired device
    pub async fn connect(&self, target: &ConnectTarget) -> BridgeResult<()> {
        let transport = self.transport()?;

        info!("[SESSION] Connecting to {}:{}", target.host, target.port);
        self.transition(SessionEvent::ConnectStarted);

        match transport.connect(&target.host, target.port).await {
            Ok(true) => {
                // A disconnect that ran while the transport was connecting wins
                if !self.transition(SessionEvent::ConnectSucceeded) {
                    warn!(
                        "[SESSION] Connection to {}:{} superseded by disconnect",
                        target.host, target.port
                    );
                    return Err(BridgeError::Transport(
                        "connection superseded by disconnect".into(),
                    ));
                }
                info!("[SESSION] Connected to {}:{}", target.host, target.port);
                Ok(())
            }
            Ok(false) => {
                self.transition(SessionEvent::ConnectFailed);
                Err(BridgeError::Transport(format!(
                    "connection to {}:{} refused",
                    target.host, target.port
                )))
            }
            Err(e) => {
                self.transition(SessionEvent::ConnectFailed);
                warn!("[SESSION] Connect to {}:{} failed: {:#}", target.host, target.port, e);
                Err(BridgeError::transport(e))
            }
        }
    }

    /// Reconcile the cached state with the transport.
    ///
    /// Asks the transport first; if that is not conclusive, opens a probe
    /// stream and treats "opened and still open" as alive. Any failure
    /// demotes the session to disconnected.
    pub async fn ensure_alive(&self) -> BridgeResult<()> {
        let transport = self.transport()?;
        if !self.state().is_connected() {
            return Err(BridgeError::NotConnected);
        }

        match transport.is_connected().await {
            Ok(true) => return Ok(()),
            Ok(false) => debug!("[SESSION] Transport reports no connection, probing"),
            Err(e) => debug!("[SESSION] Connection check failed ({:#}), probing", e),
        }

        match transport.open_stream(defaults::LIVENESS_PROBE_SERVICE).await {
            Ok(mut probe) if !probe.is_closed() => {
                close_quietly(probe.as_mut(), "liveness probe").await;
                Ok(())
            }
            Ok(_) => {
                warn!("[SESSION] Liveness probe closed immediately, connection lost");
                self.transition(SessionEvent::ProbeFailed);
                Err(BridgeError::ConnectionLost)
            }
            Err(e) => {
                warn!("[SESSION] Liveness probe failed: {:#}", e);
                self.transition(SessionEvent::ProbeFailed);
                Err(BridgeError::ConnectionLost)
            }
        }
    }

    /// Open a service stream on the connected device
    pub async fn open_stream(&self, service: &str) -> BridgeResult<Box<dyn AdbStream>> {
        let transport = self.transport()?;
        transport
            .open_stream(service)
            .await
            .map_err(BridgeError::transport)
    }

    /// Best-effort disconnect. Transport errors are logged, never returned.
    pub async fn disconnect(&self) {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(transport) = transport {
            if self.state() != SessionState::Disconnected {
                if let Err(e) = transport.disconnect().await {
                    warn!("[SESSION] Disconnect failed: {:#}", e);
                }
            }
        }

        self.transition(SessionEvent::Disconnected);
        info!("[SESSION] Disconnected");
    }

    /// Drop the transport. Every later operation fails as not initialized.
    pub fn shutdown(&self) {
        let previous = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.transition(SessionEvent::Disconnected);
        if previous.is_some() {
            info!("[SESSION] Shut down");
        }
    }
}
