//! Task execution abstraction
//!
//! The host hands the loader an opaque "run this" primitive. Two flavours are
//! relied upon:
//!
//! - a background executor, possibly concurrent, for network work
//!   ([`TokioExecutor`])
//! - the host's serialized context, which runs one task at a time in
//!   submission order ([`SerialExecutor`])
//!
//! Submission is fire-and-forget: nothing awaits a submitted task's result.

use std::future::Future;
use std::pin::Pin;

mod serial;
mod tokio_impl;

pub use serial::SerialExecutor;
pub use tokio_impl::TokioExecutor;

/// A type-erased unit of work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Opaque task-execution primitive supplied by the host.
pub trait TaskExecutor: Send + Sync {
    /// Submit a task. Must not block the caller.
    fn execute(&self, task: Task);
}

impl dyn TaskExecutor {
    /// Box and submit a future.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.execute(Box::pin(future));
    }
}
