//! Single-producer, single-consumer event stream.
//!
//! The producer is a future that receives an [`EventSink`]. It is not started
//! until the consumer first polls the [`EventStream`], and the channel between the
//! two holds at most one pending event, so the producer suspends after each emit
//! until the consumer pulls.
//!
//! Dropping the stream (or calling [`EventStream::close`]) aborts the producer
//! task. Aborting drops the producer future, which runs the destructors of
//! everything it owns; that is how the router's connection guard gets released
//! when a consumer walks away mid-run.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use super::types::RouterEvent;

/// The consumer dropped the stream; the producer should stop.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("event stream consumer disconnected")]
pub struct ConsumerGone;

/// Producer half handed to the run future.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<RouterEvent>,
}

impl EventSink {
    /// Send one event, waiting until the consumer has room for it.
    pub async fn emit(&self, event: RouterEvent) -> Result<(), ConsumerGone> {
        tracing::trace!(
            event_type = event.event_type_str(),
            step = ?event.step(),
            "emitting router event"
        );
        self.sender.send(event).await.map_err(|_| ConsumerGone)
    }

    /// Whether the consumer side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half returned by [`Router::run`](crate::Router::run).
///
/// Implements [`futures::Stream`]; pull with `StreamExt::next`.
pub struct EventStream {
    pending: Option<BoxFuture<'static, ()>>,
    events: ReceiverStream<RouterEvent>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Wrap a producer. Nothing runs until the first poll.
    pub(crate) fn from_producer<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // One slot: the producer may be at most one event ahead of the consumer
        let (sender, receiver) = mpsc::channel(1);
        Self {
            pending: Some(producer(EventSink { sender }).boxed()),
            events: ReceiverStream::new(receiver),
            task: None,
        }
    }

    fn start(&mut self) {
        if let Some(producer) = self.pending.take() {
            self.task = Some(tokio::spawn(producer));
        }
    }

    /// Whether the producer has been started
    pub fn is_started(&self) -> bool {
        self.pending.is_none()
    }

    /// Pull the next event, or `None` once the producer has finished.
    pub async fn next_event(&mut self) -> Option<RouterEvent> {
        self.next().await
    }

    /// Drain every remaining event.
    pub async fn collect_all(mut self) -> Vec<RouterEvent> {
        let mut collected = Vec::new();
        while let Some(event) = self.next().await {
            collected.push(event);
        }
        collected
    }

    /// Cancel the run and wait until the producer's cleanup has completed.
    ///
    /// Safe to call after the stream is exhausted.
    pub async fn close(mut self) {
        // Never started: dropping the future is the whole cleanup
        self.pending = None;

        if let Some(task) = self.task.take() {
            task.abort();
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    tracing::debug!("router run cancelled by consumer");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "router run task failed during close");
                }
            }
        }
    }
}

impl Stream for EventStream {
    type Item = RouterEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.start();
        Pin::new(&mut this.events).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("started", &self.is_started())
            .finish()
    }
}
