//! Single-slot cancellable command timer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Identifies one scheduled timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogTicket(u64);

type Slot = Arc<Mutex<Option<(WatchdogTicket, JoinHandle<()>)>>>;

/// Holds at most one pending timeout for the whole executor.
///
/// Scheduling replaces the pending timer. An action only runs if its ticket
/// is still the active one when the timer expires.
pub struct TimeoutWatchdog {
    slot: Slot,
    next_ticket: AtomicU64,
}

impl Default for TimeoutWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutWatchdog {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Run `action` after `after` unless cancelled or replaced first
    pub fn schedule<F>(&self, after: Duration, action: F) -> WatchdogTicket
    where
        F: FnOnce() + Send + 'static,
    {
        let ticket = WatchdogTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst));
        let slot = self.slot.clone();

        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let fired = {
                let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match guard.as_ref() {
                    Some((active, _)) if *active == ticket => {
                        guard.take();
                        true
                    }
                    _ => false,
                }
            };
            if fired {
                debug!("[WATCHDOG] Timer {:?} fired after {:?}", ticket, after);
                action();
            }
        });

        if let Some((previous, handle)) = guard.replace((ticket, timer)) {
            trace!("[WATCHDOG] Timer {:?} replaced by {:?}", previous, ticket);
            handle.abort();
        }
        ticket
    }

    /// Cancel `ticket` if it is still the active timer
    pub fn cancel(&self, ticket: WatchdogTicket) -> bool {
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some((active, _)) if *active == ticket => {
                if let Some((_, handle)) = guard.take() {
                    handle.abort();
                }
                trace!("[WATCHDOG] Timer {:?} cancelled", ticket);
                true
            }
            _ => false,
        }
    }

    /// Cancel whatever is pending
    pub fn cancel_all(&self) {
        if let Some((ticket, handle)) = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            debug!("[WATCHDOG] Timer {:?} cancelled on shutdown", ticket);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
