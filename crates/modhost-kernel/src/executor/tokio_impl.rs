//! Tokio-backed background executor.

use tokio::runtime::{Handle, TryCurrentError};

use super::{Task, TaskExecutor};

/// Background executor that spawns every task onto a tokio runtime.
///
/// Tasks run concurrently with each other and with the submitter.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Create an executor spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create an executor for the runtime the caller is running on.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl TaskExecutor for TokioExecutor {
    fn execute(&self, task: Task) {
        self.handle.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_tokio_executor_runs_task() {
        let executor: Arc<dyn TaskExecutor> = Arc::new(TokioExecutor::current().unwrap());
        let (tx, rx) = oneshot::channel();

        executor.spawn(async move {
            let _ = tx.send(42);
        });

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[test]
    fn test_current_outside_runtime() {
        assert!(TokioExecutor::current().is_err());
    }
}
