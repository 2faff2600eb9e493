//! State of one running command

use crate::error::{BridgeError, BridgeResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// One command execution and its single pending result.
///
/// Whoever flips `completed` first delivers; every later delivery attempt is
/// a no-op. The output buffer only grows until then.
pub struct CommandInvocation {
    command: String,
    output: Mutex<String>,
    completed: AtomicBool,
    timed_out: AtomicBool,
    reply: Mutex<Option<oneshot::Sender<BridgeResult<String>>>>,
    timeout_tx: watch::Sender<bool>,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>, reply: oneshot::Sender<BridgeResult<String>>) -> Self {
        let (timeout_tx, _) = watch::channel(false);
        Self {
            command: command.into(),
            output: Mutex::new(String::new()),
            completed: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            reply: Mutex::new(Some(reply)),
            timeout_tx,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Append one line of output. Ignored once the invocation completed.
    pub fn append_line(&self, line: &str) {
        if self.is_completed() {
            return;
        }
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        output.push_str(line);
        output.push('\n');
    }

    /// Output collected so far, trimmed
    pub fn output(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trim()
            .to_string()
    }

    /// Deliver `result` unless something was delivered already
    pub fn deliver(&self, result: BridgeResult<String>) -> bool {
        if !self.claim() {
            return false;
        }
        self.send(result);
        true
    }

    /// Give up on the command: discard output, deliver a timeout and wake
    /// the waiter
    pub fn time_out(&self, after: Duration) -> bool {
        if !self.claim() {
            return false;
        }
        self.timed_out.store(true, Ordering::SeqCst);
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.send(Err(BridgeError::Timeout(after)));
        self.timeout_tx.send_replace(true);
        true
    }

    /// Receiver that flips to `true` once the invocation timed out
    pub fn timeout_signal(&self) -> watch::Receiver<bool> {
        self.timeout_tx.subscribe()
    }

    /// Stop accepting output. Does not deliver anything.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    fn claim(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn send(&self, result: BridgeResult<String>) {
        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reply) = reply {
            // The caller may have stopped waiting
            let _ = reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_wins() {
        let (tx, mut rx) = oneshot::channel();
        let invocation = CommandInvocation::new("id", tx);

        invocation.append_line("uid=2000(shell)");
        assert!(invocation.deliver(Ok(invocation.output())));
        assert!(!invocation.time_out(Duration::from_secs(1)));
        assert!(!invocation.deliver(Err(BridgeError::ConnectionLost)));

        assert_eq!(rx.try_recv().unwrap().unwrap(), "uid=2000(shell)");
        assert!(!invocation.is_timed_out());
    }

    #[test]
    fn test_timeout_discards_output() {
        let (tx, mut rx) = oneshot::channel();
        let invocation = CommandInvocation::new("logcat", tx);
        let signal = invocation.timeout_signal();

        invocation.append_line("partial");
        assert!(invocation.time_out(Duration::from_millis(250)));
        invocation.append_line("late");

        assert!(invocation.is_timed_out());
        assert!(*signal.borrow());
        assert_eq!(invocation.output(), "");
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(BridgeError::Timeout(d)) if d == Duration::from_millis(250)
        ));
    }

    #[test]
    fn test_mark_completed_stops_output() {
        let (tx, _rx) = oneshot::channel();
        let invocation = CommandInvocation::new("ls", tx);
        invocation.append_line("a");
        invocation.mark_completed();
        invocation.append_line("b");
        assert_eq!(invocation.output(), "a");

        // Already completed, so nothing can be delivered any more
        assert!(!invocation.deliver(Ok(String::new())));
    }
}
