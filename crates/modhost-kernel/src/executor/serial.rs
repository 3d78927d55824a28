//! Serialized executor: one task at a time, in submission order.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::{Task, TaskExecutor};

/// Executor that drains submitted tasks sequentially on a single worker.
///
/// A task only starts after the previous one has completed, so tasks
/// submitted here never interleave with each other. A panicking task is
/// logged and does not stop the worker.
#[derive(Debug, Clone)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Task>,
}

impl SerialExecutor {
    /// Start a worker on the given runtime.
    pub fn spawn(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();

        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                    error!("Task panicked on serialized executor");
                }
            }
            debug!("Serialized executor worker stopped");
        });

        Self { tx }
    }

    /// Start a worker on the runtime the caller is running on.
    pub fn spawn_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(|handle| Self::spawn(&handle))
    }

    /// Wait until every task submitted before this call has completed.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.execute(Box::pin(async move {
            let _ = tx.send(());
        }));
        let _ = rx.await;
    }
}

impl TaskExecutor for SerialExecutor {
    fn execute(&self, task: Task) {
        if self.tx.send(task).is_err() {
            warn!("Serialized executor worker is gone; task dropped");
        }
    }
}
