//! Producer/consumer streams backed by a spawned task
//!
//! Enumeration results and transfer events are produced by a background task
//! and consumed item by item. Dropping (or closing) the stream aborts the
//! producer, so a consumer that stops early never leaks it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Default channel capacity between producer and consumer
pub const DEFAULT_BUFFER: usize = 64;

/// A single-pass stream fed by a producer task
#[derive(Debug)]
pub struct TaskStream<T> {
    rx: mpsc::Receiver<T>,
    producer: Option<AbortHandle>,
}

impl<T: Send + 'static> TaskStream<T> {
    /// Spawn `producer` on the current runtime and stream what it sends
    ///
    /// The producer should return once `send` fails; the receiver is gone.
    pub fn spawn<F, Fut>(buffer: usize, producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(producer(tx));
        Self {
            rx,
            producer: Some(handle.abort_handle()),
        }
    }

    /// A stream over an already-known sequence of items
    pub fn from_items(items: Vec<T>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // Capacity equals the item count, so this cannot fail.
            let _ = tx.try_send(item);
        }
        Self { rx, producer: None }
    }
}

impl<T> TaskStream<T> {
    /// Stream from a receiver whose sender is owned elsewhere
    pub fn from_receiver(rx: mpsc::Receiver<T>) -> Self {
        Self { rx, producer: None }
    }

    /// Stop consuming: close the channel and abort the producer
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl<T> Stream for TaskStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for TaskStream<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            tracing::trace!("Aborting stream producer");
            producer.abort();
        }
    }
}
