//! Priority-ordered admission gate
//!
//! [`PrioritySemaphore`] bounds how many expensive operations (PTY spawns,
//! daemon requests) run at once. Callers that cannot be admitted wait in a
//! queue ordered by priority, lower values first, and by arrival among equal
//! priorities.
//!
//! A [`SemaphorePermit`] returns its slot when dropped. [`PrioritySemaphore::reset`]
//! rejects everyone still waiting and forgets every outstanding permit, so a
//! hard restart of the guarded resource never leaves acquirers hanging.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreError {
    #[error("semaphore reset")]
    Reset,
}

/// Queue position: priority first, then arrival sequence
type WaiterKey = (i32, u64);

type Grant = Result<u64, SemaphoreError>;

#[derive(Debug)]
struct State {
    max: usize,
    in_use: usize,
    /// Bumped by reset; permits from an older generation no longer count
    generation: u64,
    next_seq: u64,
    waiters: BTreeMap<WaiterKey, oneshot::Sender<Grant>>,
}

impl State {
    /// Hand free slots to queued waiters in order. Waiters whose acquire was
    /// abandoned are skipped.
    fn pump(&mut self) {
        while self.in_use < self.max {
            let Some((_, tx)) = self.waiters.pop_first() else {
                break;
            };
            self.in_use += 1;
            if tx.send(Ok(self.generation)).is_err() {
                self.in_use -= 1;
            }
        }
    }

    fn release(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        self.in_use = self.in_use.saturating_sub(1);
        self.pump();
    }
}

/// Bounded-concurrency gate with priority ordering
#[derive(Debug, Clone)]
pub struct PrioritySemaphore {
    state: Arc<Mutex<State>>,
}

impl PrioritySemaphore {
    /// Create a semaphore with `max` permits. A zero capacity could never
    /// admit anyone, so it is raised to one.
    pub fn new(max: usize) -> Self {
        if max == 0 {
            tracing::warn!("Priority semaphore created with zero capacity, using 1");
        }
        Self {
            state: Arc::new(Mutex::new(State {
                max: max.max(1),
                in_use: 0,
                generation: 0,
                next_seq: 0,
                waiters: BTreeMap::new(),
            })),
        }
    }

    /// Wait for a permit. Lower `priority` values are served first; equal
    /// priorities are served in call order.
    ///
    /// Dropping the returned future gives up the place in the queue. If a
    /// permit had already been granted to it, the permit is returned.
    pub async fn acquire(&self, priority: i32) -> Result<SemaphorePermit, SemaphoreError> {
        let (key, rx) = {
            let mut state = lock(&self.state);
            if state.in_use < state.max && state.waiters.is_empty() {
                state.in_use += 1;
                return Ok(self.permit(state.generation));
            }
            let key = (priority, state.next_seq);
            state.next_seq += 1;
            let (tx, rx) = oneshot::channel();
            state.waiters.insert(key, tx);
            tracing::trace!(priority, queued = state.waiters.len(), "Waiting for permit");
            (key, rx)
        };

        let mut pending = PendingAcquire {
            state: &self.state,
            key,
            rx: Some(rx),
        };
        let result = match pending.rx.as_mut() {
            Some(rx) => rx.await,
            None => return Err(SemaphoreError::Reset),
        };
        pending.rx = None;

        match result {
            Ok(Ok(generation)) => Ok(self.permit(generation)),
            Ok(Err(e)) => Err(e),
            // Senders are only dropped after sending
            Err(_) => Err(SemaphoreError::Reset),
        }
    }

    /// Reject every pending waiter and forget all outstanding permits.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        let rejected = state.waiters.len();
        state.generation += 1;
        state.in_use = 0;
        for (_, tx) in std::mem::take(&mut state.waiters) {
            let _ = tx.send(Err(SemaphoreError::Reset));
        }
        tracing::info!(rejected, "Priority semaphore reset");
    }

    /// Permits currently held
    pub fn in_use(&self) -> usize {
        lock(&self.state).in_use
    }

    /// Acquirers currently queued
    pub fn pending(&self) -> usize {
        lock(&self.state).waiters.len()
    }

    pub fn max(&self) -> usize {
        lock(&self.state).max
    }

    fn permit(&self, generation: u64) -> SemaphorePermit {
        SemaphorePermit {
            state: Arc::clone(&self.state),
            generation,
        }
    }
}

/// A held slot; released on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct SemaphorePermit {
    state: Arc<Mutex<State>>,
    generation: u64,
}

impl SemaphorePermit {
    /// Give the slot back now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SemaphorePermit {
    fn drop(&mut self) {
        lock(&self.state).release(self.generation);
    }
}

/// Cleans up a queued acquire whose future is dropped before completing.
struct PendingAcquire<'a> {
    state: &'a Mutex<State>,
    key: WaiterKey,
    rx: Option<oneshot::Receiver<Grant>>,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        let mut state = lock(self.state);
        if state.waiters.remove(&self.key).is_some() {
            return;
        }
        // Already settled: grants are sent under the lock, so it is readable now
        if let Ok(Ok(generation)) = rx.try_recv() {
            state.release(generation);
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
