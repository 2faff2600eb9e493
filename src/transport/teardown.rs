//! Classification of errors raised while a stream is being torn down
//!
//! Closing a stream that the device already closed is routine. Transports
//! report it with [`StreamError::AlreadyClosed`]; for transports that only
//! surface IO errors or text, the error kind and then the legacy
//! "stream closed" wording are checked.

use super::traits::AdbStream;
use std::io;
use thiserror::Error;
use tracing::{debug, warn};

/// Typed stream failures a transport may report
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream already closed")]
    AlreadyClosed,

    #[error("Stream reset by peer")]
    Reset,
}

/// Whether a transport error is an expected close race
pub fn is_teardown_race(err: &anyhow::Error) -> bool {
    if let Some(stream_err) = err.downcast_ref::<StreamError>() {
        return *stream_err == StreamError::AlreadyClosed;
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        return is_teardown_io(io_err);
    }
    mentions_closed_stream(&format!("{:#}", err))
}

/// Whether an IO error is an expected close race
pub fn is_teardown_io(err: &io::Error) -> bool {
    if let Some(stream_err) = err.get_ref().and_then(|e| e.downcast_ref::<StreamError>()) {
        return *stream_err == StreamError::AlreadyClosed;
    }
    match err.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => true,
        _ => mentions_closed_stream(&err.to_string()),
    }
}

fn mentions_closed_stream(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("stream closed") || message.contains("already closed")
}

/// Close a stream, logging instead of failing
pub async fn close_quietly(stream: &mut dyn AdbStream, what: &str) {
    if stream.is_closed() {
        return;
    }
    if let Err(e) = stream.close().await {
        if is_teardown_race(&e) {
            debug!("{} already closed: {:#}", what, e);
        } else {
            warn!("Failed to close {}: {:#}", what, e);
        }
    }
}
