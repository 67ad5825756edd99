//! Per-session output batching
//!
//! PTYs can produce thousands of tiny reads per second. [`DataBatcher`]
//! coalesces them so subscribers see at most one emission per interval. The
//! first chunk of a window starts the clock; everything that arrives before
//! the deadline joins the same batch, in arrival order.
//!
//! The batcher holds no timer of its own. Its owner (the session pump)
//! sleeps until [`DataBatcher::deadline`] and then calls
//! [`DataBatcher::take`].

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct DataBatcher {
    interval: Duration,
    pending: String,
    deadline: Option<Instant>,
}

impl DataBatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: String::new(),
            deadline: None,
        }
    }

    /// Add a chunk to the current window.
    pub fn push(&mut self, chunk: &str) {
        self.push_at(chunk, Instant::now());
    }

    fn push_at(&mut self, chunk: &str, now: Instant) {
        if chunk.is_empty() {
            return;
        }
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
        self.pending.push_str(chunk);
    }

    /// When the pending batch must be flushed, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the pending batch and close the window.
    pub fn take(&mut self) -> Option<String> {
        self.deadline = None;
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
