//! Packet sources.
//!
//! A [`PacketSource`] yields one Velodyne payload at a time together with its
//! capture time. The capture thread owns the source for the whole session.
//!
//! - [`PcapSource`]: replay of a legacy pcap file
//! - [`UdpSource`]: live packets from the sensor
//! - [`MemorySource`]: packets held in memory, for tests and demos

use std::collections::VecDeque;
use std::io;

use thiserror::Error;

pub mod pcap;
pub mod udp;

pub use pcap::PcapSource;
pub use udp::UdpSource;

/// One payload as delivered by a source, framing already stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub data: Vec<u8>,
    /// Capture time, microseconds since the Unix epoch
    pub timestamp_us: u64,
}

impl RawPacket {
    pub fn new(data: Vec<u8>, timestamp_us: u64) -> Self {
        RawPacket { data, timestamp_us }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Nothing arrived within the read timeout, ask again
    #[error("Timed out waiting for packet")]
    Timeout,

    #[error("Invalid capture format: {0}")]
    Format(String),

    #[error("Source {0} is not open")]
    NotOpen(String),
}

/// A stream of raw packets.
///
/// `next_packet` returns `Ok(None)` once the stream is exhausted and
/// `Err(SourceError::Timeout)` when a live source has nothing yet. Any other
/// error ends the capture.
pub trait PacketSource: Send {
    /// File path or listen address, as given at construction
    fn identifier(&self) -> &str;

    fn open(&mut self) -> Result<(), SourceError>;

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError>;

    /// Release the handle. Safe to call more than once.
    fn close(&mut self);
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        (**self).open()
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        (**self).next_packet()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// =============================================================================
// Memory Source
// =============================================================================

/// Replays packets held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    identifier: String,
    packets: Vec<RawPacket>,
    pending: VecDeque<RawPacket>,
    open: bool,
}

impl MemorySource {
    pub fn new(identifier: impl Into<String>, packets: Vec<RawPacket>) -> Self {
        MemorySource {
            identifier: identifier.into(),
            packets,
            pending: VecDeque::new(),
            open: false,
        }
    }

    /// Payloads stamped 1 ms apart, starting at `start_us`
    pub fn from_payloads<I>(identifier: impl Into<String>, payloads: I, start_us: u64) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let packets = payloads
            .into_iter()
            .enumerate()
            .map(|(i, data)| RawPacket::new(data, start_us + i as u64 * 1000))
            .collect();
        Self::new(identifier, packets)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl PacketSource for MemorySource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Every open replays from the first packet
    fn open(&mut self) -> Result<(), SourceError> {
        self.pending = self.packets.iter().cloned().collect();
        self.open = true;
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen(self.identifier.clone()));
        }
        Ok(self.pending.pop_front())
    }

    fn close(&mut self) {
        self.pending.clear();
        self.open = false;
    }
}
