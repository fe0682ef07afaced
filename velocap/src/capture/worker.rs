//! The capture thread.
//!
//! One worker runs per open session. It owns the packet source and the frame
//! assembler, and is the only producer for the session's queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use velocap_core::{FrameAssembler, Model, ParseError, Point};

use super::statistics::Statistics;
use crate::queue::FrameQueue;
use crate::source::{PacketSource, SourceError};

/// Log the first sensor mismatch and then every this many
const MISMATCH_LOG_INTERVAL: u64 = 1000;

/// Clears the active flag when dropped, including while unwinding from a
/// panic in the source or the point type.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub(super) struct Worker<P> {
    pub(super) key: String,
    pub(super) source: Box<dyn PacketSource>,
    pub(super) assembler: FrameAssembler<P>,
    pub(super) queue: Arc<FrameQueue<P>>,
    pub(super) stop: Arc<AtomicBool>,
    pub(super) active: Arc<AtomicBool>,
    pub(super) statistics: Arc<Statistics>,
}

impl<P: Point> Worker<P> {
    /// Open the source, report the outcome on `opened`, then capture until
    /// the stream ends, a read fails or stop is requested.
    ///
    /// Hands the source back so the controller can close it after joining,
    /// or `None` if it never opened.
    pub(super) fn run(
        mut self,
        opened: Sender<Result<(), SourceError>>,
    ) -> Option<Box<dyn PacketSource>> {
        let _active = ActiveGuard(self.active.clone());

        if let Err(e) = self.source.open() {
            let _ = opened.send(Err(e));
            return None;
        }
        let _ = opened.send(Ok(()));

        info!(
            "{}: capture started ({})",
            self.key,
            self.assembler.geometry().model().display_name()
        );

        loop {
            if self.stop.load(Ordering::SeqCst) {
                debug!("{}: stop requested", self.key);
                break;
            }

            let packet = match self.source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    info!("{}: end of stream", self.key);
                    break;
                }
                Err(SourceError::Timeout) => continue,
                Err(e) => {
                    error!("{}: read failed: {}", self.key, e);
                    break;
                }
            };
            self.statistics.packet_received();
            self.process(&packet.data, packet.timestamp_us);
        }

        let discarded = self.assembler.discard_partial();
        if discarded > 0 {
            debug!(
                "{}: dropping unfinished rotation with {} points",
                self.key, discarded
            );
        }

        let stats = self.statistics.snapshot();
        info!(
            "{}: capture finished, {} packets, {} frames, {} skipped",
            self.key,
            stats.packets_received,
            stats.frames_sealed,
            stats.packets_skipped()
        );

        Some(self.source)
    }

    fn process(&mut self, payload: &[u8], timestamp_us: u64) {
        let key = &self.key;
        let queue = &self.queue;
        let stop = &self.stop;
        let statistics = &self.statistics;

        let result = self.assembler.process_packet(payload, timestamp_us, |frame| {
            statistics.full_rotation(key, frame.frame_id(), frame.len());
            if queue.push(frame, stop) {
                trace!("{}: producer resumed after backpressure", key);
            }
        });

        match result {
            Ok(summary) => statistics.points(summary.points),
            Err(ParseError::LengthMismatch { expected, actual }) => {
                statistics.length_mismatch();
                trace!(
                    "{}: discarding {} byte packet, expected {}",
                    key,
                    actual,
                    expected
                );
            }
            Err(ParseError::SensorMismatch { expected, actual }) => {
                let count = statistics.sensor_mismatch();
                if count == 1 || count % MISMATCH_LOG_INTERVAL == 0 {
                    let seen = match Model::try_from(actual) {
                        Ok(model) => model.display_name().to_string(),
                        Err(e) => e.to_string(),
                    };
                    warn!(
                        "{}: sensor type {:#04X} does not match configured {:#04X} ({}), {} packets skipped",
                        key, actual, expected, seen, count
                    );
                }
            }
            Err(e) => {
                statistics.azimuth_error();
                warn!("{}: skipping packet: {}", key, e);
            }
        }
    }
}
