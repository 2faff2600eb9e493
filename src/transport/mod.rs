//! Transport collaborator seam
//!
//! The wire protocol, TLS and device authentication live behind
//! [`AdbTransport`]; this crate only drives it.

#[cfg(test)]
pub(crate) mod mock;
mod teardown;
mod traits;

pub use teardown::{close_quietly, is_teardown_io, is_teardown_race, StreamError};
pub use traits::{AdbStream, AdbTransport, StreamReader};
