//! The start/shutdown contract every background-task-owning component
//! implements, grounded on `lightning-resolver`/`lightning-fetcher`'s
//! `WithStartAndShutdown` trait: `start` spawns the component's event loop
//! and returns immediately, `is_running` reflects whether that loop is
//! currently alive, and `shutdown` signals it to stop without blocking the
//! caller.

use async_trait::async_trait;

#[async_trait]
pub trait WithStartAndShutdown {
    /// Whether the component's background task is currently running.
    fn is_running(&self) -> bool;

    /// Start the component's background task. A no-op (with a warning log)
    /// if already running.
    async fn start(&self);

    /// Signal the background task to stop. Does not wait for it to finish.
    async fn shutdown(&self);
}
