//! Hand-off of sealed frames from the capture thread to consumers.
//!
//! ```text
//!   capture thread                         consumers
//!   ──────────────                         ─────────
//!   push ──► [ Mutex<VecDeque<Frame>> ] ──► try_pop       (never blocks)
//!     │                                 └─► pop_blocking  (polls)
//!     └─ waits while depth >= max and not stopped
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::Duration;

use log::trace;
use velocap_core::{Frame, PointXYZ};

/// Producer poll interval while the queue is full
pub const DEFAULT_BACKPRESSURE_POLL: Duration = Duration::from_millis(100);

/// Consumer poll interval in [`FrameQueue::pop_blocking`]
pub const DEFAULT_RETRIEVE_POLL: Duration = Duration::from_millis(1);

/// FIFO of sealed frames behind a single mutex
#[derive(Debug)]
pub struct FrameQueue<P = PointXYZ> {
    frames: Mutex<VecDeque<Frame<P>>>,
    max_depth: Option<usize>,
    backpressure_poll: Duration,
    retrieve_poll: Duration,
}

impl<P> FrameQueue<P> {
    /// Unbounded queue with default poll intervals
    pub fn new() -> Self {
        FrameQueue {
            frames: Mutex::new(VecDeque::new()),
            max_depth: None,
            backpressure_poll: DEFAULT_BACKPRESSURE_POLL,
            retrieve_poll: DEFAULT_RETRIEVE_POLL,
        }
    }

    /// Bound the depth. `Some(0)` is treated as 1.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth.map(|q| q.max(1));
        self
    }

    pub fn with_poll_intervals(mut self, backpressure: Duration, retrieve: Duration) -> Self {
        self.backpressure_poll = backpressure;
        self.retrieve_poll = retrieve;
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame<P>>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a frame.
    ///
    /// With a max depth the caller waits until a consumer makes room. The
    /// wait ends early once `stop` is set, and the frame is enqueued anyway.
    /// Returns true if the producer had to wait.
    pub fn push(&self, frame: Frame<P>, stop: &AtomicBool) -> bool {
        let mut waited = false;
        if let Some(max_depth) = self.max_depth {
            while !stop.load(Ordering::SeqCst) && self.len() >= max_depth {
                if !waited {
                    trace!("Queue full ({} frames), waiting for consumer", max_depth);
                }
                waited = true;
                thread::sleep(self.backpressure_poll);
            }
        }

        self.lock().push_back(frame);
        waited
    }

    /// Pop the oldest frame without blocking.
    ///
    /// Returns `None` if the queue is empty or another thread holds the lock.
    pub fn try_pop(&self) -> Option<Frame<P>> {
        match self.frames.try_lock() {
            Ok(mut frames) => frames.pop_front(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().pop_front(),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Pop the oldest frame, polling until one arrives.
    ///
    /// Returns `None` once `producing` is false and the queue is drained.
    pub fn pop_blocking(&self, producing: &AtomicBool) -> Option<Frame<P>> {
        loop {
            // read the flag first so a final push is not missed
            let active = producing.load(Ordering::SeqCst);
            if let Some(frame) = self.lock().pop_front() {
                return Some(frame);
            }
            if !active {
                return None;
            }
            thread::sleep(self.retrieve_poll);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all queued frames, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut frames = self.lock();
        let dropped = frames.len();
        frames.clear();
        dropped
    }
}

impl<P> Default for FrameQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}
