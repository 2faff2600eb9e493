//! Command executor - validates and runs one-shot shell commands

use super::invocation::CommandInvocation;
use super::reader;
use super::validation::{shell_service, validate_command};
use super::watchdog::TimeoutWatchdog;
use crate::connection::ConnectionSession;
use crate::error::{BridgeError, BridgeResult};
use crate::pool::WorkerPool;
use crate::transport::{close_quietly, is_teardown_io, AdbStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Runs non-interactive commands on the connected device
pub struct CommandExecutor {
    session: Arc<ConnectionSession>,
    watchdog: Arc<TimeoutWatchdog>,
    pool: Arc<WorkerPool>,
    command_timeout: RwLock<Duration>,
    skip_next_timeout: AtomicBool,
    poll_interval: Duration,
}

/// How the wait for a running command ended
enum Outcome {
    Drained,
    ReadFailed(String),
    TimedOut,
}

impl CommandExecutor {
    pub fn new(
        session: Arc<ConnectionSession>,
        watchdog: Arc<TimeoutWatchdog>,
        pool: Arc<WorkerPool>,
        command_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            watchdog,
            pool,
            command_timeout: RwLock::new(command_timeout),
            skip_next_timeout: AtomicBool::new(false),
            poll_interval,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        *self
            .command_timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the bound for later commands. Zero is ignored.
    pub fn set_command_timeout(&self, timeout: Duration) {
        if timeout.is_zero() {
            warn!("[EXEC] Ignoring zero command timeout");
            return;
        }
        *self
            .command_timeout
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timeout;
    }

    /// Let exactly the next command run without a timeout
    pub fn skip_next_timeout(&self) {
        self.skip_next_timeout.store(true, Ordering::SeqCst);
    }

    /// Run `command` and return its trimmed output.
    ///
    /// Input is checked before anything touches the network. The command
    /// itself runs on the worker pool; its single result is handed back to
    /// this task.
    pub async fn execute_non_interactive(&self, command: &str) -> BridgeResult<String> {
        let command = self.preflight(command)?.to_string();
        let timeout = if self.skip_next_timeout.swap(false, Ordering::SeqCst) {
            debug!("[EXEC] Timeout skipped for [{}]", command);
            None
        } else {
            Some(self.command_timeout())
        };

        let (reply_tx, mut reply_rx) = oneshot::channel();
        let run = Run {
            session: self.session.clone(),
            watchdog: self.watchdog.clone(),
            invocation: Arc::new(CommandInvocation::new(command, reply_tx)),
            timeout,
            poll_interval: self.poll_interval,
        };
        let mut worker = self.pool.spawn(run.execute());

        tokio::select! {
            biased;
            reply = &mut reply_rx => match reply {
                Ok(result) => result,
                Err(_) => Err(worker_failure(worker.await)),
            },
            joined = &mut worker => match reply_rx.try_recv() {
                // The result is delivered before the worker returns
                Ok(result) => result,
                Err(_) => Err(worker_failure(joined)),
            },
        }
    }

    fn preflight<'a>(&self, command: &'a str) -> BridgeResult<&'a str> {
        if !self.session.is_initialized() {
            return Err(BridgeError::NotInitialized);
        }
        if !self.session.state().is_connected() {
            return Err(BridgeError::NotConnected);
        }
        Ok(validate_command(command)?)
    }
}

/// Explain a worker that ended without delivering a result
fn worker_failure(joined: Result<Option<()>, JoinError>) -> BridgeError {
    match joined {
        Ok(None) => BridgeError::NotInitialized,
        Ok(Some(())) => BridgeError::Protocol("command finished without a result".into()),
        Err(e) => BridgeError::Protocol(format!("command worker failed: {}", e)),
    }
}

/// One command on its worker
struct Run {
    session: Arc<ConnectionSession>,
    watchdog: Arc<TimeoutWatchdog>,
    invocation: Arc<CommandInvocation>,
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Run {
    async fn execute(self) {
        let invocation = self.invocation.clone();
        let command = invocation.command().to_string();

        let mut stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[EXEC] [{}] failed to start: {}", command, e);
                invocation.deliver(Err(e));
                invocation.mark_completed();
                return;
            }
        };

        let input = match stream.open_input() {
            Ok(input) => input,
            Err(e) => {
                invocation.deliver(Err(BridgeError::transport(e)));
                invocation.mark_completed();
                close_quietly(stream.as_mut(), "command stream").await;
                return;
            }
        };

        let ticket = self.timeout.map(|after| {
            let weak = Arc::downgrade(&invocation);
            self.watchdog.schedule(after, move || {
                if let Some(invocation) = weak.upgrade() {
                    if invocation.time_out(after) {
                        warn!("[WATCHDOG] [{}] timed out after {:?}", invocation.command(), after);
                    }
                }
            })
        });

        let reader = tokio::spawn(reader::drain_lines(input, invocation.clone()));
        let outcome = self.wait(stream.as_mut(), reader).await;

        if let Some(ticket) = ticket {
            self.watchdog.cancel(ticket);
        }
        match outcome {
            Outcome::Drained => {
                if invocation.deliver(Ok(invocation.output())) {
                    info!("[EXEC] [{}] completed", command);
                }
            }
            Outcome::ReadFailed(detail) => {
                warn!("[EXEC] [{}] read failed: {}", command, detail);
                invocation.deliver(Err(BridgeError::Protocol(detail)));
            }
            Outcome::TimedOut => debug!("[EXEC] [{}] abandoned after timeout", command),
        }

        invocation.mark_completed();
        close_quietly(stream.as_mut(), "command stream").await;
    }

    async fn open(&self) -> BridgeResult<Box<dyn AdbStream>> {
        self.session.ensure_alive().await?;

        let command = self.invocation.command();
        debug!("[EXEC] Opening stream for [{}]", command);
        let stream = self.session.open_stream(&shell_service(command)).await?;
        if stream.is_closed() {
            return Err(BridgeError::Transport(format!(
                "stream for [{}] closed as soon as it opened",
                command
            )));
        }
        Ok(stream)
    }

    /// Wait for the reader to finish, the stream to close or the watchdog to
    /// fire, whichever comes first. A closed stream gives the reader one
    /// more tick to drain what is buffered.
    async fn wait(
        &self,
        stream: &mut dyn AdbStream,
        mut reader: JoinHandle<std::io::Result<()>>,
    ) -> Outcome {
        let mut timed_out = self.invocation.timeout_signal();
        let mut ticker = interval(self.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut closing = false;

        loop {
            if self.invocation.is_timed_out() {
                return Outcome::TimedOut;
            }

            tokio::select! {
                joined = &mut reader => {
                    return match joined {
                        Ok(Ok(())) => Outcome::Drained,
                        Ok(Err(e)) if is_teardown_io(&e) => {
                            debug!("[EXEC] Stream torn down while reading: {}", e);
                            Outcome::Drained
                        }
                        Ok(Err(e)) => Outcome::ReadFailed(format!("reading command output: {}", e)),
                        Err(e) => Outcome::ReadFailed(format!("output reader failed: {}", e)),
                    };
                }
                changed = timed_out.changed() => {
                    if changed.is_err() || *timed_out.borrow() {
                        return Outcome::TimedOut;
                    }
                }
                _ = ticker.tick() => {
                    if stream.is_closed() {
                        if closing {
                            return Outcome::Drained;
                        }
                        closing = true;
                    }
                }
            }
        }
    }
}
