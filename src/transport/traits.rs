//! Transport trait abstraction for the ADB wire protocol collaborator

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Combined stdout/stderr byte source of an open stream
pub type StreamReader = Box<dyn AsyncRead + Send + Unpin>;

/// A service stream opened on the device
#[async_trait]
pub trait AdbStream: Send {
    /// Whether either side has closed the stream
    fn is_closed(&self) -> bool;

    /// Take the input half of the stream
    fn open_input(&mut self) -> Result<StreamReader>;

    /// Close the stream
    async fn close(&mut self) -> Result<()>;
}

/// Connection to a device's debugging daemon.
///
/// Implementations own framing, TLS and device authentication; they are
/// usually built from the bridge's identity store.
#[async_trait]
pub trait AdbTransport: Send + Sync {
    /// Establish trust with the device using its pairing code
    async fn pair(&self, host: &str, port: u16, code: &str) -> Result<bool>;

    /// Open an authenticated connection
    async fn connect(&self, host: &str, port: u32) -> Result<bool>;

    async fn disconnect(&self) -> Result<()>;

    /// The transport's own view of the connection
    async fn is_connected(&self) -> Result<bool>;

    /// Open a service stream such as `shell:ls`
    async fn open_stream(&self, service: &str) -> Result<Box<dyn AdbStream>>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
