//! Single-pass element stream backed by a bounded queue and one producer task
//!
//! [`create_stream`] spawns the producer. The producer hands values to the
//! consumer through a [`StreamSink`]; every handoff races a
//! [`CancelToken`] so a slow or vanished consumer can never pin the producer
//! forever. The terminal failure, if any, travels through a one-shot slot that
//! lives outside the bounded data queue, so publishing it never blocks.

use futures::FutureExt;
use futures_core::Stream;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::cancel::CancelToken;
use crate::element::Element;
use crate::error::{StreamError, StreamResult};

/// Producer side of an [`ElementStream`].
///
/// Handed to the generator by [`create_stream`]. Not cloneable: the queue
/// closes when the generator finishes and drops its sink.
pub struct StreamSink<T> {
    tx: mpsc::Sender<T>,
    in_flight: Arc<AtomicUsize>,
}

impl<T> StreamSink<T>
where
    T: Send + 'static,
{
    /// Offer one value to the queue, racing `token`.
    ///
    /// Returns `false` if the token fired first or the consumer dropped the
    /// stream. An already-fired token always fails, even with room left.
    pub async fn send(&self, value: T, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        match self.tx.try_reserve() {
            Ok(permit) => {
                self.in_flight.fetch_add(1, Ordering::Relaxed);
                permit.send(value);
                return true;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
            Err(mpsc::error::TrySendError::Full(_)) => {}
        }

        // queue full: wait for room or the token, whichever comes first
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    self.in_flight.fetch_add(1, Ordering::Relaxed);
                    permit.send(value);
                    true
                }
                Err(_) => false,
            },
        }
    }

    /// Offer every value of `batch` in order.
    ///
    /// Stops at the first value that is not accepted and returns `false`; the
    /// rest of the batch is never offered.
    pub async fn send_batch<I>(&self, batch: I, token: &CancelToken) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        for value in batch {
            if !self.send(value, token).await {
                return false;
            }
        }
        true
    }

    /// True once the consumer has dropped the stream
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A single-pass, single-consumer stream of [`Element`]s.
///
/// Yields `Element::Data` values in production order, then at most one
/// `Element::Failure`, then ends. Dropping the stream abandons it: the
/// producer's next handoff is rejected and it winds down.
pub struct ElementStream<T> {
    values: ReceiverStream<T>,
    outcome: Option<oneshot::Receiver<StreamError>>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
}

// never pin-projected
impl<T> Unpin for ElementStream<T> {}

/// Spawn `generator` as the producer of a new stream.
///
/// `buffer_capacity` bounds the values queued between producer and consumer
/// (at least 1). When the generator returns `Err`, that error is delivered as
/// the stream's final element. A panicking generator ends the stream with
/// [`StreamError::Panicked`].
pub fn create_stream<T, G, Fut>(buffer_capacity: usize, generator: G) -> ElementStream<T>
where
    T: Send + 'static,
    G: FnOnce(StreamSink<T>) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
{
    let capacity = buffer_capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let in_flight = Arc::new(AtomicUsize::new(0));

    let sink = StreamSink {
        tx,
        in_flight: Arc::clone(&in_flight),
    };

    tokio::spawn(async move {
        // the sink is dropped with the generator future, closing the queue
        let producer = AssertUnwindSafe(async move { generator(sink).await });
        let result = match producer.catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = StreamError::from_panic(payload);
                log::error!("stream producer task aborted: {}", err);
                Err(err)
            }
        };
        if let Err(err) = result {
            log::debug!("stream producer finished with failure: {}", err);
            // nobody to tell if the consumer is gone
            let _ = outcome_tx.send(err);
        }
    });

    ElementStream {
        values: ReceiverStream::new(rx),
        outcome: Some(outcome_rx),
        in_flight,
        capacity,
    }
}

impl<T> ElementStream<T>
where
    T: Send + 'static,
{
    /// A stream that ends immediately without failure
    pub fn empty() -> Self {
        create_stream(1, |_sink| async { StreamResult::Ok(()) })
    }

    /// A stream of exactly one value
    pub fn single(value: T) -> Self {
        Self::from_vec(vec![value])
    }

    /// One value, or a stream holding only the failure
    pub fn from_result(result: StreamResult<T>) -> Self {
        match result {
            Ok(value) => Self::single(value),
            Err(err) => Self::failed(err),
        }
    }

    /// A stream holding only `err`
    pub fn failed(err: StreamError) -> Self {
        create_stream(1, move |_sink| async move { Err(err) })
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        create_stream(1, move |sink| async move {
            if sink.send_batch(values, &CancelToken::never()).await {
                Ok(())
            } else {
                Err(StreamError::Disconnected)
            }
        })
    }

    /// Values currently queued and not yet taken by the consumer
    pub fn buffered(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Queue capacity between producer and consumer
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Stream for ElementStream<T> {
    type Item = Element<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match Pin::new(&mut this.values).poll_next(cx) {
            Poll::Ready(Some(value)) => {
                this.in_flight.fetch_sub(1, Ordering::Relaxed);
                return Poll::Ready(Some(Element::Data(value)));
            }
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        // queue drained and closed: the producer has finished
        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(outcome).poll(cx) {
            Poll::Ready(result) => {
                this.outcome = None;
                Poll::Ready(result.ok().map(Element::Failure))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for ElementStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementStream")
            .field("capacity", &self.capacity)
            .field("buffered", &self.in_flight.load(Ordering::Relaxed))
            .field("finished", &self.outcome.is_none())
            .finish()
    }
}
