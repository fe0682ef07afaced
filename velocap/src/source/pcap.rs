//! Legacy pcap replay.
//!
//! Records are read incrementally from the file and sliced with `etherparse`.
//! Only UDP datagrams are replayed; ARP, TCP and anything that does not parse
//! as Ethernet is skipped.

use std::fs::File;
use std::path::{Path, PathBuf};

use etherparse::{SlicedPacket, TransportSlice};
use log::{debug, trace, warn};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError};

use super::{PacketSource, RawPacket, SourceError};

const READ_BUFFER_SIZE: usize = 65536;

/// Replays the UDP payloads of a legacy pcap file
pub struct PcapSource {
    path: PathBuf,
    identifier: String,
    port: Option<u16>,
    reader: Option<LegacyPcapReader<File>>,
    nanosecond_precision: bool,
    records: u64,
    skipped: u64,
}

impl PcapSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        PcapSource {
            identifier: path.display().to_string(),
            path,
            port: None,
            reader: None,
            nanosecond_precision: false,
            records: 0,
            skipped: 0,
        }
    }

    /// Only replay records sent to this UDP destination port
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records read so far, including skipped ones
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Records that are not UDP or are filtered by port
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// UDP payload of an Ethernet frame, honoring the destination port filter
fn extract_payload(data: &[u8], port: Option<u16>) -> Option<&[u8]> {
    let packet = SlicedPacket::from_ethernet(data).ok()?;
    let udp = match packet.transport {
        Some(TransportSlice::Udp(udp)) => udp,
        _ => return None,
    };

    if port.is_some_and(|port| udp.destination_port() != port) {
        return None;
    }

    let payload = udp.payload();
    if payload.is_empty() {
        return None;
    }
    Some(payload)
}

fn record_timestamp(ts_sec: u32, ts_frac: u32, nanosecond_precision: bool) -> u64 {
    let micros = if nanosecond_precision {
        ts_frac as u64 / 1000
    } else {
        ts_frac as u64
    };
    ts_sec as u64 * 1_000_000 + micros
}

impl PacketSource for PcapSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path)?;
        let reader = LegacyPcapReader::new(READ_BUFFER_SIZE, file)
            .map_err(|e| SourceError::Format(format!("{}: {:?}", self.identifier, e)))?;

        debug!("Opened pcap {}", self.identifier);
        self.reader = Some(reader);
        self.nanosecond_precision = false;
        self.records = 0;
        self.skipped = 0;
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Err(SourceError::NotOpen(self.identifier.clone())),
        };

        let mut refilled = false;
        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    refilled = false;
                    let packet = match block {
                        PcapBlockOwned::Legacy(record) => {
                            self.records += 1;
                            match extract_payload(record.data, self.port) {
                                Some(payload) => Some(RawPacket::new(
                                    payload.to_vec(),
                                    record_timestamp(
                                        record.ts_sec,
                                        record.ts_usec,
                                        self.nanosecond_precision,
                                    ),
                                )),
                                None => {
                                    self.skipped += 1;
                                    None
                                }
                            }
                        }
                        PcapBlockOwned::LegacyHeader(header) => {
                            self.nanosecond_precision = header.is_nanosecond_precision();
                            trace!(
                                "pcap header: linktype {:?}, nanosecond precision {}",
                                header.network,
                                self.nanosecond_precision
                            );
                            None
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if packet.is_some() {
                        return Ok(packet);
                    }
                }
                Err(PcapError::Eof) => {
                    debug!(
                        "End of pcap {} after {} records ({} skipped)",
                        self.identifier, self.records, self.skipped
                    );
                    return Ok(None);
                }
                Err(PcapError::Incomplete(_)) => {
                    if refilled {
                        warn!("Truncated record at end of pcap {}", self.identifier);
                        return Ok(None);
                    }
                    reader
                        .refill()
                        .map_err(|e| SourceError::Format(format!("{:?}", e)))?;
                    refilled = true;
                }
                Err(e) => {
                    return Err(SourceError::Format(format!(
                        "{}: {:?}",
                        self.identifier, e
                    )))
                }
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed pcap {}", self.identifier);
        }
    }
}
