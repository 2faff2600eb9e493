//! Error taxonomy of the bridge

use adb_bridge_identity::IdentityError;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Malformed input, rejected before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid host `{0}`, expected an IPv4 address")]
    InvalidHost(String),

    #[error("Pairing requires a port")]
    MissingPort,

    #[error("Invalid port `{0}`, expected an integer")]
    MalformedPort(String),

    #[error("Invalid port {0}, expected 1-65535")]
    PortOutOfRange(i64),

    #[error("Pairing requires a code")]
    MissingCode,

    #[error("Invalid pairing code `{0}`, expected 6 digits")]
    MalformedCode(String),

    #[error("Command must not be empty")]
    EmptyCommand,

    #[error("Command [{0}] contains nested or unterminated double quotes")]
    UnbalancedQuotes(String),
}

/// Failure of a bridge operation
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Transport is not initialized")]
    NotInitialized,

    #[error("Not connected, connect before executing commands")]
    NotConnected,

    #[error("Pairing needs API level {required}, this platform is {actual}")]
    UnsupportedPlatform { actual: u32, required: u32 },

    /// Identity material could not be created; nothing can authenticate
    #[error("Identity setup failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Connection lost, reconnect and retry")]
    ConnectionLost,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Command timed out after {0:?} without completing")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BridgeError {
    /// Wrap a transport collaborator failure, keeping its context chain
    pub fn transport(err: impl Display) -> Self {
        Self::Transport(format!("{:#}", err))
    }

    /// Rejected before any network call was made
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotInitialized
                | Self::NotConnected
                | Self::UnsupportedPlatform { .. }
        )
    }

    /// The bridge cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Identity(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
