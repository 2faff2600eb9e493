//! Bounded worker pool for bridge operations

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs at most `capacity` operations at once on the tokio runtime
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Queue `task`. Yields `None` if the pool shut down before the task
    /// got a worker.
    pub fn spawn<F, T>(&self, task: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            Some(task.await)
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Idle workers
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refuse queued and future tasks. Running tasks finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
        debug!("Worker pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }
}
