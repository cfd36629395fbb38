//! Bounded backpressure queue between a stream producer and its consumer.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::AbortHandle;

/// How long `get` waits for an item before re-checking for closure
const GET_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("stream buffer is closed")]
pub struct BufferClosed;

/// Bounded FIFO where `put` suspends while full and `get` suspends while empty.
#[derive(Debug)]
pub struct StreamBuffer<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    closed: AtomicBool,
    closed_notify: Notify,
}

impl<T> StreamBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
        }
    }

    /// Enqueue an item, waiting for room.
    ///
    /// Fails once the buffer is closed, including while waiting.
    pub async fn put(&self, item: T) -> Result<(), BufferClosed> {
        let closed = self.closed_notify.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        if self.is_closed() {
            return Err(BufferClosed);
        }

        tokio::select! {
            sent = self.tx.send(item) => sent.map_err(|_| BufferClosed),
            _ = closed => Err(BufferClosed),
        }
    }

    /// Dequeue the next item.
    ///
    /// Items queued before `close` are still delivered; `None` means the
    /// buffer is closed and drained.
    pub async fn get(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) if self.is_closed() => return None,
                Err(TryRecvError::Empty) => {}
            }

            match tokio::time::timeout(GET_POLL_INTERVAL, rx.recv()).await {
                Ok(item) => return item,
                Err(_) => continue,
            }
        }
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closed_notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Closes the buffer and stops the producer when the consumer goes away
struct ConsumerGuard<T> {
    buffer: Arc<StreamBuffer<T>>,
    producer: AbortHandle,
}

impl<T> Drop for ConsumerGuard<T> {
    fn drop(&mut self) {
        self.buffer.close();
        self.producer.abort();
    }
}

/// Pump `stream` through a [`StreamBuffer`] of `capacity` on a spawned task.
///
/// The source runs ahead of the consumer by at most `capacity` items.
/// Dropping the returned stream closes the buffer and drops the source.
pub fn buffered<S>(stream: S, capacity: usize) -> impl Stream<Item = S::Item> + Send
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    let buffer = Arc::new(StreamBuffer::new(capacity));
    let producer = buffer.clone();

    let task = tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        while let Some(item) = stream.next().await {
            if producer.put(item).await.is_err() {
                log::debug!("Stream buffer closed by consumer, stopping producer");
                return;
            }
        }
        producer.close();
    });

    let guard = ConsumerGuard {
        buffer,
        producer: task.abort_handle(),
    };

    async_stream::stream! {
        let guard = guard;
        while let Some(item) = guard.buffer.get().await {
            yield item;
        }
    }
}
