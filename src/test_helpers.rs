#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use crate::engine::BlockingIterator;
use crate::status::Status;

/// Counters shared between a [`ScriptedIterator`] and the test observing it.
#[derive(Clone, Default)]
pub struct PullProbe {
    pulls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl PullProbe {
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// [`BlockingIterator`] replaying a fixed script of results.
///
/// Once the script runs out every pull reports `StopIteration`.
pub struct ScriptedIterator<T> {
    script: VecDeque<Result<T, Status>>,
    delay: Duration,
    probe: PullProbe,
}

impl<T> ScriptedIterator<T> {
    pub fn new(script: Vec<Result<T, Status>>) -> Self {
        Self {
            script: script.into(),
            delay: Duration::ZERO,
            probe: PullProbe::default(),
        }
    }

    /// Block every pull for `delay` before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probe(&self) -> PullProbe {
        self.probe.clone()
    }
}

impl<T: Send + 'static> BlockingIterator for ScriptedIterator<T> {
    type Item = T;

    fn get_next(&mut self) -> Result<T, Status> {
        let p = &self.probe;
        p.pulls.fetch_add(1, Ordering::SeqCst);
        let now = p.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        p.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let next = self
            .script
            .pop_front()
            .unwrap_or_else(|| Err(Status::stop_iteration()));
        p.in_flight.fetch_sub(1, Ordering::SeqCst);
        next
    }
}
