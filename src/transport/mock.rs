//! Scripted in-memory transport for tests

use super::teardown::StreamError;
use super::traits::{AdbStream, AdbTransport, StreamReader};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, Notify};

/// Outcome of a scripted transport call
#[derive(Debug, Clone, Default)]
pub enum Reply {
    #[default]
    Accept,
    Reject,
    Fail(String),
}

impl Reply {
    fn resolve(&self) -> Result<bool> {
        match self {
            Reply::Accept => Ok(true),
            Reply::Reject => Ok(false),
            Reply::Fail(message) => Err(anyhow!("{}", message)),
        }
    }
}

/// What a scripted stream does after its last chunk
#[derive(Debug, Clone, Copy, Default)]
pub enum StreamEnd {
    /// The device closes the stream
    #[default]
    Close,
    /// Nothing more arrives until the consumer closes the stream
    Hang,
    /// The read fails
    Error(io::ErrorKind),
}

/// Scripted behaviour of one service stream
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    /// Delay-then-bytes pairs delivered in order
    pub chunks: Vec<(Duration, Vec<u8>)>,
    pub end: StreamEnd,
    /// The stream reports closed as soon as it is opened
    pub closed_on_open: bool,
    /// `open_stream` fails with this message
    pub open_error: Option<String>,
}

impl StreamScript {
    /// Output delivered at once, then closed
    pub fn output(text: &str) -> Self {
        Self {
            chunks: vec![(Duration::ZERO, text.as_bytes().to_vec())],
            ..Self::default()
        }
    }

    /// A command that never prints nor exits
    pub fn silent() -> Self {
        Self {
            end: StreamEnd::Hang,
            ..Self::default()
        }
    }

    pub fn closed_on_open() -> Self {
        Self {
            closed_on_open: true,
            ..Self::default()
        }
    }

    pub fn refused(message: &str) -> Self {
        Self {
            open_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn after(mut self, delay: Duration, text: &str) -> Self {
        self.chunks.push((delay, text.as_bytes().to_vec()));
        self
    }

    pub fn ending(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }
}

/// A call the transport received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pair { host: String, port: u16, code: String },
    Connect { host: String, port: u32 },
    Disconnect,
    IsConnected,
    OpenStream(String),
}

#[derive(Default)]
struct Behaviour {
    pair: Reply,
    connect: Reply,
    connect_delay: Duration,
    is_connected: Reply,
    disconnect_error: Option<String>,
    streams: HashMap<String, StreamScript>,
}

/// Transport double that records every call and replays scripted replies
#[derive(Default)]
pub struct MockTransport {
    behaviour: Mutex<Behaviour>,
    calls: Mutex<Vec<Call>>,
    stream_flags: Mutex<Vec<Arc<AtomicBool>>>,
    close_calls: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pair_reply(&self, reply: Reply) {
        self.behaviour.lock().unwrap().pair = reply;
    }

    pub fn set_connect_reply(&self, reply: Reply) {
        self.behaviour.lock().unwrap().connect = reply;
    }

    /// Make `connect` take this long before replying
    pub fn set_connect_delay(&self, delay: Duration) {
        self.behaviour.lock().unwrap().connect_delay = delay;
    }

    pub fn set_is_connected_reply(&self, reply: Reply) {
        self.behaviour.lock().unwrap().is_connected = reply;
    }

    pub fn fail_disconnect(&self, message: &str) {
        self.behaviour.lock().unwrap().disconnect_error = Some(message.to_string());
    }

    pub fn script(&self, service: &str, script: StreamScript) {
        self.behaviour
            .lock()
            .unwrap()
            .streams
            .insert(service.to_string(), script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn opened_streams(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::OpenStream(service) => Some(service),
                _ => None,
            })
            .collect()
    }

    /// Whether every stream handed out has been closed
    pub fn all_streams_closed(&self) -> bool {
        self.stream_flags
            .lock()
            .unwrap()
            .iter()
            .all(|flag| flag.load(Ordering::SeqCst))
    }

    /// Number of `close` calls made by consumers
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AdbTransport for MockTransport {
    async fn pair(&self, host: &str, port: u16, code: &str) -> Result<bool> {
        self.record(Call::Pair {
            host: host.to_string(),
            port,
            code: code.to_string(),
        });
        self.behaviour.lock().unwrap().pair.resolve()
    }

    async fn connect(&self, host: &str, port: u32) -> Result<bool> {
        self.record(Call::Connect {
            host: host.to_string(),
            port,
        });
        let delay = self.behaviour.lock().unwrap().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.behaviour.lock().unwrap().connect.resolve()
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(Call::Disconnect);
        match self.behaviour.lock().unwrap().disconnect_error.clone() {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    async fn is_connected(&self) -> Result<bool> {
        self.record(Call::IsConnected);
        self.behaviour.lock().unwrap().is_connected.resolve()
    }

    async fn open_stream(&self, service: &str) -> Result<Box<dyn AdbStream>> {
        self.record(Call::OpenStream(service.to_string()));
        let script = self
            .behaviour
            .lock()
            .unwrap()
            .streams
            .get(service)
            .cloned()
            .unwrap_or_default();

        if let Some(message) = script.open_error {
            return Err(anyhow!("{}", message));
        }

        let stream = MockStream::spawn(script, self.close_calls.clone());
        self.stream_flags.lock().unwrap().push(stream.closed.clone());
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockStream {
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
    input: Option<mpsc::UnboundedReceiver<io::Result<Vec<u8>>>>,
    close_calls: Arc<AtomicUsize>,
}

impl MockStream {
    fn spawn(script: StreamScript, close_calls: Arc<AtomicUsize>) -> Self {
        let closed = Arc::new(AtomicBool::new(script.closed_on_open));
        let close_notify = Arc::new(Notify::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let feeder_closed = closed.clone();
        let feeder_notify = close_notify.clone();
        tokio::spawn(async move {
            for (delay, bytes) in script.chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(bytes)).is_err() {
                    return;
                }
            }
            match script.end {
                StreamEnd::Close => {
                    drop(tx);
                    feeder_closed.store(true, Ordering::SeqCst);
                }
                StreamEnd::Hang => {
                    feeder_notify.notified().await;
                }
                StreamEnd::Error(kind) => {
                    let _ = tx.send(Err(io::Error::new(kind, "scripted read failure")));
                    feeder_closed.store(true, Ordering::SeqCst);
                }
            }
        });

        Self {
            closed,
            close_notify,
            input: Some(rx),
            close_calls,
        }
    }
}

#[async_trait]
impl AdbStream for MockStream {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn open_input(&mut self) -> Result<StreamReader> {
        let rx = self
            .input
            .take()
            .ok_or_else(|| anyhow!("input already taken"))?;
        Ok(Box::new(ScriptedReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.close_notify.notify_one();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyClosed.into());
        }
        Ok(())
    }
}

struct ScriptedReader {
    rx: mpsc::UnboundedReceiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            if this.pos < this.pending.len() {
                let n = buf.remaining().min(this.pending.len() - this.pos);
                buf.put_slice(&this.pending[this.pos..this.pos + n]);
                this.pos += n;
                return Poll::Ready(Ok(()));
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending = bytes;
                    this.pos = 0;
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
