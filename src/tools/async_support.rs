// src/tools/async_support.rs
//! Serial executor and event bus used by the wallet session

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error};

use crate::core::errors::WalletError;

/// Result type for async helpers.
pub type AsyncResult<T> = Result<T, WalletError>;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking jobs one at a time, in submission order, on a dedicated thread.
///
/// Cloning the handle shares the same thread. The thread exits once every
/// handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct SerialExecutor {
    sender: mpsc::UnboundedSender<Job>,
    label: Arc<str>,
}

impl SerialExecutor {
    pub fn new(label: &str) -> AsyncResult<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let thread_label = label.to_string();

        thread::Builder::new()
            .name(thread_label.clone())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(executor = %thread_label, "serial job panicked");
                    }
                }
                debug!(executor = %thread_label, "serial executor stopped");
            })
            .map_err(|e| WalletError::AsyncError(format!("failed to start {}: {}", label, e)))?;

        Ok(Self { sender, label: Arc::from(label) })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue `job` and wait for its result.
    pub async fn run<F, T>(&self, job: F) -> AsyncResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(Box::new(move || {
            let _ = tx.send(job());
        }))?;
        rx.await.map_err(|_| {
            WalletError::AsyncError(format!("job on '{}' did not complete", self.label))
        })
    }

    /// Queue `job` without waiting for it.
    pub fn spawn<F>(&self, job: F) -> AsyncResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(job))
    }

    /// Wait until every job queued before this call has finished.
    pub async fn flush(&self) -> AsyncResult<()> {
        self.run(|| ()).await
    }

    fn submit(&self, job: Job) -> AsyncResult<()> {
        self.sender.send(job).map_err(|_| {
            WalletError::AsyncError(format!("serial executor '{}' has stopped", self.label))
        })
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor").field("label", &self.label).finish()
    }
}

/// Broadcast event bus
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T> EventBus<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers; returns how many received it.
    pub fn publish(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
