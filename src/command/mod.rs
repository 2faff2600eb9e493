//! Non-interactive command execution
//!
//! This module handles:
//! - Validating command text before it reaches the device
//! - Running one shell command per call and collecting its output
//! - Bounding each command with a cancellable timeout
//! - Delivering exactly one result per command

mod executor;
mod invocation;
mod reader;
mod validation;
mod watchdog;

pub use executor::CommandExecutor;
pub use invocation::CommandInvocation;
pub use validation::{shell_service, validate_command};
pub use watchdog::{TimeoutWatchdog, WatchdogTicket};
