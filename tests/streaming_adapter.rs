use std::collections::VecDeque;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
    mpsc,
};
use std::time::Duration;

use futures::StreamExt;
use serving_rs::{BlockingIterator, EngineError, RetCode, Status, StreamingAdapter, WorkerPool};

/// Iterator replaying `script`, recording how many pulls overlap.
struct Scripted {
    script: VecDeque<Result<&'static str, Status>>,
    pulls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    overlap: Arc<AtomicUsize>,
    delay: Duration,
}

impl Scripted {
    fn new(script: Vec<Result<&'static str, Status>>) -> Self {
        Self {
            script: script.into(),
            pulls: Arc::default(),
            in_flight: Arc::default(),
            overlap: Arc::default(),
            delay: Duration::ZERO,
        }
    }
}

impl BlockingIterator for Scripted {
    type Item = &'static str;

    fn get_next(&mut self) -> Result<&'static str, Status> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.overlap.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let next = self
            .script
            .pop_front()
            .unwrap_or_else(|| Err(Status::stop_iteration()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next
    }
}

fn pool() -> WorkerPool {
    WorkerPool::new(8).unwrap()
}

#[tokio::test]
async fn two_items_then_clean_completion() {
    let iter = Scripted::new(vec![Ok("a"), Ok("b"), Err(Status::stop_iteration())]);
    let adapter = StreamingAdapter::with_pool(iter, pool());
    let items: Vec<_> = adapter.collect().await;
    assert_eq!(items, vec![Ok("a"), Ok("b")]);
}

#[tokio::test]
async fn item_then_engine_error() {
    let iter = Scripted::new(vec![Ok("a"), Err(Status::new(7, "oom")), Ok("never")]);
    let pulls = iter.pulls.clone();
    let mut adapter = StreamingAdapter::with_pool(iter, pool());

    assert_eq!(adapter.next().await, Some(Ok("a")));
    match adapter.next().await {
        Some(Err(EngineError::Engine { code, message })) => {
            assert_eq!(code.as_i32(), 7);
            assert_eq!(message, "oom");
        }
        other => panic!("expected engine error, got {other:?}"),
    }
    assert_eq!(adapter.next().await, None);
    assert_eq!(pulls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn immediate_stop_yields_nothing() {
    let iter = Scripted::new(vec![Err(Status::stop_iteration())]);
    let mut adapter = StreamingAdapter::with_pool(iter, pool());
    assert_eq!(adapter.next_output().await, Ok(None));
    assert_eq!(adapter.next_output().await, Ok(None));
}

#[tokio::test]
async fn n_items_in_order_then_idempotent_end() {
    let n = 20;
    let mut script: Vec<Result<&'static str, Status>> = (0..n).map(|_| Ok("x")).collect();
    script.push(Err(Status::stop_iteration()));
    let iter = Scripted::new(script);
    let pulls = iter.pulls.clone();
    let mut adapter = StreamingAdapter::with_pool(iter, pool());

    let mut seen = 0;
    while let Some(item) = adapter.next_output().await.unwrap() {
        assert_eq!(item, "x");
        seen += 1;
    }
    assert_eq!(seen, n);
    for _ in 0..3 {
        assert_eq!(adapter.next_output().await, Ok(None));
    }
    assert_eq!(pulls.load(Ordering::SeqCst), n + 1);
}

#[tokio::test]
async fn error_code_survives_repeated_polls() {
    let iter = Scripted::new(vec![Err(Status::new(RetCode::Runtime, "kernel launch failed"))]);
    let pulls = iter.pulls.clone();
    let mut adapter = StreamingAdapter::with_pool(iter, pool());
    let first = adapter.next_output().await.unwrap_err();
    let second = adapter.next_output().await.unwrap_err();
    assert_eq!(first, second);
    assert_eq!(first.code(), RetCode::Runtime);
    assert_eq!(first.message(), "kernel launch failed");
    assert_eq!(pulls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pulls_never_overlap() {
    let mut script: Vec<Result<&'static str, Status>> = (0..10).map(|_| Ok("t")).collect();
    script.push(Err(Status::stop_iteration()));
    let mut iter = Scripted::new(script);
    iter.delay = Duration::from_millis(2);
    let overlap = iter.overlap.clone();
    let mut adapter = StreamingAdapter::with_pool(iter, pool());

    // Abandon a few pulls half way; the next call must resume, not re-issue.
    let mut count = 0;
    for _ in 0..3 {
        let polled = tokio::time::timeout(Duration::from_micros(100), adapter.next_output()).await;
        if let Ok(Ok(Some(_))) = polled {
            count += 1;
        }
    }
    while adapter.next_output().await.unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 10);
    assert_eq!(overlap.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_streams_run_concurrently() {
    let pool = pool();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let mut iter = Scripted::new(vec![Ok("a"), Ok("b"), Ok("c")]);
        iter.delay = Duration::from_millis(20);
        let adapter = StreamingAdapter::with_pool(iter, pool.clone());
        handles.push(tokio::spawn(adapter.collect::<Vec<_>>()));
    }
    let started = std::time::Instant::now();
    for handle in handles {
        assert_eq!(handle.await.unwrap().len(), 3);
    }
    // Four streams of four 20ms pulls each finish well under the serial 320ms.
    assert!(started.elapsed() < Duration::from_millis(300));
}

struct Gated {
    gate: mpsc::Receiver<()>,
    done: bool,
}

impl BlockingIterator for Gated {
    type Item = u32;

    fn get_next(&mut self) -> Result<u32, Status> {
        if self.done {
            return Err(Status::stop_iteration());
        }
        self.gate
            .recv()
            .map_err(|e| Status::new(RetCode::Internal, e.to_string()))?;
        self.done = true;
        Ok(1)
    }
}

#[tokio::test]
async fn blocked_pull_leaves_scheduler_free() {
    let (release, gate) = mpsc::channel();
    let mut adapter = StreamingAdapter::with_pool(Gated { gate, done: false }, pool());
    let ticks = Arc::new(AtomicUsize::new(0));

    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            for _ in 0..3 {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
            release.send(()).unwrap();
        }
    });

    let item = tokio::time::timeout(Duration::from_secs(5), adapter.next_output())
        .await
        .expect("pull stalled the scheduler");
    assert_eq!(item, Ok(Some(1)));
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    ticker.await.unwrap();
    assert_eq!(adapter.next_output().await, Ok(None));
}
