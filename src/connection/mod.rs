//! Device connection management
//!
//! This module handles:
//! - Validating pairing and connect targets
//! - Pairing, connecting and disconnecting through the transport
//! - Reconciling the cached session state before commands run

mod session;
mod state;
mod target;

pub use session::ConnectionSession;
pub use state::{SessionEvent, SessionState};
pub use target::{ConnectTarget, PairTarget};
