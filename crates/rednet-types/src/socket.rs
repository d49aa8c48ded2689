//! A small request/response-over-channel helper, grounded on the teacher's
//! `affair::Socket` / `affair::Task` idiom (see `lightning-fetcher::Fetcher`,
//! which hands out a `FetcherSocket` and receives `Task<FetcherRequest,
//! FetcherResponse>` on the other end). Reimplemented locally rather than
//! pulled in as a dependency: it is a thin pair of `mpsc`/`oneshot` wrappers
//! with no registry presence outside the teacher's own workspace.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("the component behind this socket has shut down")]
    Closed,
}

/// One in-flight request, sitting in a component's inbox until it calls
/// [`Task::respond`] exactly once.
pub struct Task<Req, Resp> {
    pub request: Req,
    responder: oneshot::Sender<Resp>,
}

impl<Req, Resp> Task<Req, Resp> {
    pub fn respond(self, response: Resp) {
        // The caller may have dropped its receiver (e.g. the request timed
        // out); that is not this component's problem.
        let _ = self.responder.send(response);
    }
}

/// A cloneable handle callers use to submit requests; the component holds
/// the matching `mpsc::Receiver<Task<Req, Resp>>`.
#[derive(Clone)]
pub struct Socket<Req, Resp> {
    tx: mpsc::Sender<Task<Req, Resp>>,
}

impl<Req, Resp> Socket<Req, Resp> {
    /// Create a bounded socket pair: the `Socket` handle to give to callers,
    /// and the `Receiver` the component's event loop drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Task<Req, Resp>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Submit a request and await its response.
    pub async fn run(&self, request: Req) -> Result<Resp, SocketError> {
        let (responder, rx) = oneshot::channel();
        self.tx
            .send(Task { request, responder })
            .await
            .map_err(|_| SocketError::Closed)?;
        rx.await.map_err(|_| SocketError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_response_round_trips() {
        let (socket, mut rx) = Socket::<u32, u32>::bounded(4);
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let doubled = task.request * 2;
                task.respond(doubled);
            }
        });

        assert_eq!(socket.run(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn closed_receiver_surfaces_as_error() {
        let (socket, rx) = Socket::<u32, u32>::bounded(4);
        drop(rx);
        assert!(matches!(socket.run(1).await, Err(SocketError::Closed)));
    }
}
