use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;

use crate::error::EngineError;

/// Number of workers in the process-wide pool unless configured otherwise.
pub const DEFAULT_WORKERS: usize = 256;

static GLOBAL: OnceCell<WorkerPool> = OnceCell::new();

/// Bounded executor for blocking engine calls.
///
/// Calls run on tokio's blocking thread pool. A semaphore caps how many run
/// at once; callers beyond the cap wait in FIFO order instead of failing.
/// The permit travels with the call, so it is returned when the call
/// finishes even if the awaiting task was dropped.
///
/// ```
/// use serving_rs::WorkerPool;
/// # tokio_test::block_on(async {
/// let pool = WorkerPool::new(2).unwrap();
/// let answer = pool.run(|| 40 + 2).await.unwrap();
/// assert_eq!(answer, 42);
/// assert_eq!(pool.available(), 2);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool allowing `capacity` concurrent blocking calls.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidArgument(
                "worker pool size must be positive".into(),
            ));
        }
        Ok(Self::bounded(capacity))
    }

    fn bounded(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// The process-wide pool shared by every adapter that was not given one.
    pub fn global() -> &'static WorkerPool {
        GLOBAL.get_or_init(|| Self::bounded(DEFAULT_WORKERS))
    }

    /// Size the process-wide pool. Must run before the first
    /// [`WorkerPool::global`] call; asking again for the same size is a
    /// no-op, a different size is rejected.
    pub fn init_global(capacity: usize) -> Result<&'static WorkerPool, EngineError> {
        let pool = Self::new(capacity)?;
        let _ = GLOBAL.set(pool);
        let global = Self::global();
        if global.capacity != capacity {
            return Err(EngineError::InvalidArgument(format!(
                "worker pool already initialised with {} workers",
                global.capacity
            )));
        }
        Ok(global)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run the blocking closure `f` on a worker and wait for its result.
    pub async fn run<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tracing::trace!(available = self.available(), "waiting for worker permit");
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Worker("worker pool closed".into()))?;
        tracing::trace!("worker permit acquired");
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))
    }
}
