//! Capture session lifecycle.
//!
//! ```text
//!            open()                close()
//!   Idle ───────────► Capturing ───────────► Stopping ───► Closed
//!                         ▲                                  │
//!                         └──────────── open() ──────────────┘
//! ```
//!
//! A [`CaptureController`] owns one capture thread per open session and the
//! queue that thread fills. All methods take `&self`, so a controller can be
//! shared between a producer-managing thread and any number of consumers
//! through an `Arc`.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;
use thiserror::Error;
use velocap_core::{Frame, FrameAssembler, LaserGeometry, Point, PointXYZ, RigidTransform};

use crate::config::CaptureConfig;
use crate::queue::FrameQueue;
use crate::source::{PacketSource, SourceError};

mod statistics;
mod worker;

pub use statistics::{Statistics, StatisticsSnapshot};
use worker::Worker;

const THREAD_NAME: &str = "velocap-capture";

// =============================================================================
// Errors and State
// =============================================================================

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Cannot open packet source {identifier}")]
    Source {
        identifier: String,
        #[source]
        source: SourceError,
    },

    #[error("Cannot start capture thread")]
    Spawn(#[source] io::Error),

    #[error("Capture thread exited while opening {identifier}")]
    Aborted { identifier: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// Never opened
    #[default]
    Idle,
    /// Capture thread running or finished with the source still held
    Capturing,
    /// Close in progress, waiting for the capture thread
    Stopping,
    /// Closed, may be reopened
    Closed,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Capturing => "capturing",
            CaptureState::Stopping => "stopping",
            CaptureState::Closed => "closed",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Capture Controller
// =============================================================================

type WorkerHandle = JoinHandle<Option<Box<dyn PacketSource>>>;

pub struct CaptureController<P: Point = PointXYZ> {
    geometry: LaserGeometry,
    queue: Arc<FrameQueue<P>>,
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    source_open: AtomicBool,
    state: Mutex<CaptureState>,
    worker: Mutex<Option<WorkerHandle>>,
    statistics: Arc<Statistics>,
}

impl<P: Point> CaptureController<P> {
    /// Controller with an unbounded queue
    pub fn new(geometry: LaserGeometry) -> Self {
        Self::with_queue(geometry, FrameQueue::new())
    }

    /// Controller with queue bound and poll intervals from configuration
    pub fn from_config(config: &CaptureConfig) -> Self {
        let queue = FrameQueue::new()
            .with_max_depth(config.max_queue_depth)
            .with_poll_intervals(
                Duration::from_millis(config.backpressure_poll_ms),
                Duration::from_millis(config.retrieve_poll_ms),
            );
        Self::with_queue(LaserGeometry::for_model(config.model), queue)
    }

    pub fn with_queue(geometry: LaserGeometry, queue: FrameQueue<P>) -> Self {
        CaptureController {
            geometry,
            queue: Arc::new(queue),
            stop: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            source_open: AtomicBool::new(false),
            state: Mutex::new(CaptureState::Idle),
            worker: Mutex::new(None),
            statistics: Arc::new(Statistics::new()),
        }
    }

    pub fn geometry(&self) -> &LaserGeometry {
        &self.geometry
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: CaptureState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Open `source` and start capturing from it.
    ///
    /// A session that is already open is closed first. On failure no thread
    /// is left running and the controller stays closed.
    pub fn open<S>(&self, source: S, transform: Option<RigidTransform>) -> Result<(), OpenError>
    where
        S: PacketSource + 'static,
    {
        let mut worker = self.lock_worker();
        if worker.is_some() {
            debug!("Closing previous session before reopening");
            self.close_locked(&mut worker);
        }

        let source: Box<dyn PacketSource> = Box::new(source);
        let key = source.identifier().to_string();

        self.stop.store(false, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        self.statistics.reset();

        let job = Worker {
            key: key.clone(),
            source,
            assembler: FrameAssembler::new(self.geometry.clone(), transform),
            queue: self.queue.clone(),
            stop: self.stop.clone(),
            active: self.active.clone(),
            statistics: self.statistics.clone(),
        };

        // The source is opened on the capture thread, so a failed spawn never
        // leaves an open source behind.
        let (opened_tx, opened_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || job.run(opened_tx))
            .map_err(|e| {
                self.active.store(false, Ordering::SeqCst);
                OpenError::Spawn(e)
            })?;

        match opened_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                let _ = handle.join();
                return Err(OpenError::Source {
                    identifier: key,
                    source,
                });
            }
            Err(_) => {
                if handle.join().is_err() {
                    error!("Capture thread panicked while opening {}", key);
                }
                self.active.store(false, Ordering::SeqCst);
                return Err(OpenError::Aborted { identifier: key });
            }
        }

        *worker = Some(handle);
        self.source_open.store(true, Ordering::SeqCst);
        self.set_state(CaptureState::Capturing);
        info!("Opened {} for {}", key, self.geometry.model().display_name());
        Ok(())
    }

    /// Stop capturing, join the capture thread, close the source and drop
    /// any queued frames. Does nothing if no session is open.
    pub fn close(&self) {
        let mut worker = self.lock_worker();
        self.close_locked(&mut worker);
    }

    fn close_locked(&self, worker: &mut Option<WorkerHandle>) {
        let Some(handle) = worker.take() else {
            return;
        };

        self.set_state(CaptureState::Stopping);
        self.stop.store(true, Ordering::SeqCst);

        match handle.join() {
            Ok(Some(mut source)) => {
                source.close();
                debug!("Closed {}", source.identifier());
            }
            Ok(None) => {}
            Err(_) => error!("Capture thread panicked, source dropped"),
        }

        self.active.store(false, Ordering::SeqCst);
        self.source_open.store(false, Ordering::SeqCst);
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("Dropped {} unretrieved frames", dropped);
        }
        self.set_state(CaptureState::Closed);
    }

    /// True from a successful open until close, even once the stream ends
    pub fn is_open(&self) -> bool {
        self.source_open.load(Ordering::SeqCst)
    }

    /// True while the capture thread runs or frames remain to be retrieved
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) || !self.queue.is_empty()
    }

    /// Next frame if one is ready, never blocks
    pub fn retrieve(&self) -> Option<Frame<P>> {
        self.queue.try_pop()
    }

    /// Next frame, waiting for the capture thread if needed.
    ///
    /// Returns `None` once capture has finished and the queue is drained.
    pub fn retrieve_blocking(&self) -> Option<Frame<P>> {
        self.queue.pop_blocking(&self.active)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }
}

impl<P: Point> Drop for CaptureController<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: Point> fmt::Debug for CaptureController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("model", &self.geometry.model())
            .field("state", &self.state())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}
