use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, poll_fn};
use futures::stream::{FusedStream, Stream};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::engine::BlockingIterator;
use crate::error::EngineError;
use crate::status::Status;
use crate::worker_pool::WorkerPool;

type Pull<I> = (Box<I>, Result<<I as BlockingIterator>::Item, Status>);

enum State<I: BlockingIterator> {
    /// Iterator is idle and held by the adapter.
    Ready(Box<I>),
    /// Iterator is inside a worker call.
    Pulling(BoxFuture<'static, Result<Pull<I>, EngineError>>),
    Exhausted,
    Errored(EngineError),
}

/// Observable lifecycle of a [`StreamingAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Ready,
    Pulling,
    Exhausted,
    Errored,
}

/// Asynchronous view over a [`BlockingIterator`].
///
/// Each pull moves the iterator onto a [`WorkerPool`] worker, runs the
/// blocking `get_next` there and hands the iterator back when it returns,
/// so at most one pull is ever outstanding and the polling thread never
/// blocks. Items are produced strictly on demand.
///
/// A `StopIteration` status ends the stream. Any other status becomes an
/// [`EngineError::Engine`] carrying the engine's code and message. Both are
/// terminal: later pulls report the same outcome without touching the
/// iterator again.
///
/// ```
/// use futures::StreamExt;
/// use serving_rs::{BlockingIterator, Status, StreamingAdapter, WorkerPool};
///
/// struct Countdown(u32);
///
/// impl BlockingIterator for Countdown {
///     type Item = u32;
///     fn get_next(&mut self) -> Result<u32, Status> {
///         if self.0 == 0 {
///             return Err(Status::stop_iteration());
///         }
///         self.0 -= 1;
///         Ok(self.0)
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let pool = WorkerPool::new(4).unwrap();
/// let adapter = StreamingAdapter::with_pool(Countdown(3), pool);
/// let items: Vec<_> = adapter.map(Result::unwrap).collect().await;
/// assert_eq!(items, vec![2, 1, 0]);
/// # });
/// ```
pub struct StreamingAdapter<I: BlockingIterator> {
    state: State<I>,
    pool: WorkerPool,
    request_id: Option<Uuid>,
    error_yielded: bool,
}

impl<I: BlockingIterator> StreamingAdapter<I> {
    /// Wrap `iter`, running its pulls on the process-wide pool.
    pub fn new(iter: I) -> Self {
        Self::with_pool(iter, WorkerPool::global().clone())
    }

    /// Wrap `iter`, running its pulls on `pool`.
    pub fn with_pool(iter: I, pool: WorkerPool) -> Self {
        Self {
            state: State::Ready(Box::new(iter)),
            pool,
            request_id: None,
            error_yielded: false,
        }
    }

    /// Tag log output with the id of the request this stream belongs to.
    pub fn request_id(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn state(&self) -> AdapterState {
        match self.state {
            State::Ready(_) => AdapterState::Ready,
            State::Pulling(_) => AdapterState::Pulling,
            State::Exhausted => AdapterState::Exhausted,
            State::Errored(_) => AdapterState::Errored,
        }
    }

    /// Produce the next element.
    ///
    /// Resolves to `Ok(Some(item))`, `Ok(None)` once the stream is exhausted,
    /// or the engine error. Terminal results repeat on every later call.
    /// Dropping the returned future mid-pull is safe: the pull keeps running
    /// and the next call picks up its result.
    pub async fn next_output(&mut self) -> Result<Option<I::Item>, EngineError> {
        poll_fn(|cx| self.poll_next_output(cx)).await
    }

    /// Poll form of [`StreamingAdapter::next_output`].
    pub fn poll_next_output(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<I::Item>, EngineError>> {
        loop {
            match std::mem::replace(&mut self.state, State::Exhausted) {
                State::Ready(mut iter) => {
                    trace!(request = ?self.request_id, "dispatching pull");
                    let pool = self.pool.clone();
                    let pull = async move {
                        pool.run(move || {
                            let res = I::get_next(&mut iter);
                            (iter, res)
                        })
                        .await
                    };
                    self.state = State::Pulling(pull.boxed());
                }
                State::Pulling(mut pull) => match pull.poll_unpin(cx) {
                    Poll::Pending => {
                        self.state = State::Pulling(pull);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok((iter, Ok(item)))) => {
                        self.state = State::Ready(iter);
                        return Poll::Ready(Ok(Some(item)));
                    }
                    Poll::Ready(Ok((_, Err(status)))) if status.is_stop_iteration() => {
                        debug!(request = ?self.request_id, %status, "stream finished");
                        return Poll::Ready(Ok(None));
                    }
                    Poll::Ready(Ok((_, Err(status)))) => {
                        return Poll::Ready(Err(self.fail(EngineError::from(status))));
                    }
                    Poll::Ready(Err(err)) => {
                        return Poll::Ready(Err(self.fail(err)));
                    }
                },
                State::Exhausted => return Poll::Ready(Ok(None)),
                State::Errored(err) => {
                    self.state = State::Errored(err.clone());
                    return Poll::Ready(Err(err));
                }
            }
        }
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        warn!(request = ?self.request_id, error = %err, "stream failed");
        self.state = State::Errored(err.clone());
        err
    }
}

impl<I: BlockingIterator> Stream for StreamingAdapter<I> {
    type Item = Result<I::Item, EngineError>;

    /// Yields items, then ends. An engine error is yielded once before the
    /// stream ends.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.error_yielded {
            return Poll::Ready(None);
        }
        match this.poll_next_output(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(item)) => Poll::Ready(item.map(Ok)),
            Poll::Ready(Err(err)) => {
                this.error_yielded = true;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl<I: BlockingIterator> FusedStream for StreamingAdapter<I> {
    fn is_terminated(&self) -> bool {
        self.error_yielded || matches!(self.state, State::Exhausted)
    }
}

impl<I: BlockingIterator> fmt::Debug for StreamingAdapter<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingAdapter")
            .field("state", &self.state())
            .field("request_id", &self.request_id)
            .finish()
    }
}
