//! End-to-end capture tests with synthetic packets.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use velocap::source::PcapSource;
use velocap::{
    CaptureController, CaptureState, FrameQueue, MemorySource, OpenError, PacketSource, RawPacket,
    SourceError,
};
use velocap_core::protocol::velodyne::{format_data_packet, DataPacket, UPPER_BLOCK_ID};
use velocap_core::{LaserGeometry, Model, Point, RigidTransform};

const BLOCK_STEP: u16 = 300;
const PACKETS_PER_ROTATION: usize = 10;
const POINTS_PER_ROTATION: usize = PACKETS_PER_ROTATION * 12 * 32;

/// One packet whose blocks start at `start` and advance by `step`
fn packet(start: u16, step: u16, distance: u16, model: Model) -> Vec<u8> {
    let mut packet = DataPacket {
        sensor_type: model.sensor_type(),
        ..Default::default()
    };
    for (index, block) in packet.blocks.iter_mut().enumerate() {
        block.block_id = UPPER_BLOCK_ID;
        block.rotational_position = ((start as u32 + index as u32 * step as u32) % 36000) as u16;
        for ret in block.returns.iter_mut() {
            ret.distance = distance;
            ret.intensity = 42;
        }
    }
    format_data_packet(&packet).to_vec()
}

/// `rotations` full sweeps followed by the first packet of the next sweep,
/// which closes the last rotation
fn sweeps(rotations: usize, model: Model) -> Vec<Vec<u8>> {
    let mut packets: Vec<Vec<u8>> = (0..rotations * PACKETS_PER_ROTATION)
        .map(|i| {
            let start = (i % PACKETS_PER_ROTATION) as u16 * BLOCK_STEP * 12;
            packet(start, BLOCK_STEP, 500, model)
        })
        .collect();
    packets.push(packet(0, BLOCK_STEP, 500, model));
    packets
}

fn memory(packets: Vec<Vec<u8>>) -> MemorySource {
    MemorySource::from_payloads("memory", packets, 1_700_000_000_000_000)
}

fn controller(max_depth: Option<usize>) -> CaptureController {
    let queue = FrameQueue::new()
        .with_max_depth(max_depth)
        .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(1));
    CaptureController::with_queue(LaserGeometry::vlp16(), queue)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Never yields a packet, like a silent sensor
struct SilentSource;

impl PacketSource for SilentSource {
    fn identifier(&self) -> &str {
        "silent"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        thread::sleep(Duration::from_millis(5));
        Err(SourceError::Timeout)
    }

    fn close(&mut self) {}
}

struct FailingSource;

impl PacketSource for FailingSource {
    fn identifier(&self) -> &str {
        "failing"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "no access",
        )))
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        Err(SourceError::NotOpen("failing".into()))
    }

    fn close(&mut self) {}
}

/// Replays packets, then panics instead of reporting end of stream
struct PanickingSource(MemorySource);

impl PacketSource for PanickingSource {
    fn identifier(&self) -> &str {
        "panicking"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.0.open()
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        match self.0.next_packet()? {
            Some(packet) => Ok(Some(packet)),
            None => panic!("driver fault"),
        }
    }

    fn close(&mut self) {}
}

/// Records which thread opened it and how often it was closed
#[derive(Default, Clone)]
struct RecordingSource {
    fail_open: bool,
    opened_on: Arc<Mutex<Option<String>>>,
    closes: Arc<AtomicUsize>,
}

impl PacketSource for RecordingSource {
    fn identifier(&self) -> &str {
        "recording"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        *self.opened_on.lock().unwrap() = thread::current().name().map(str::to_string);
        if self.fail_open {
            return Err(SourceError::NotOpen("recording".into()));
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        thread::sleep(Duration::from_millis(5));
        Err(SourceError::Timeout)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_k_rotations_yield_k_frames() {
    let controller = controller(None);
    controller.open(memory(sweeps(3, Model::Vlp16)), None).unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = controller.retrieve_blocking() {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 3);
    for (id, frame) in frames.iter().enumerate() {
        assert_eq!(frame.frame_id(), id as u64);
        assert_eq!(frame.point_count(), POINTS_PER_ROTATION);
    }
    // sealed by the first packet of the following rotation, 1 ms per packet
    assert_eq!(frames[0].timestamp_us(), 1_700_000_000_000_000 + 10_000);
    assert_eq!(frames[2].timestamp_us(), 1_700_000_000_000_000 + 30_000);

    assert!(!controller.is_running());
    assert!(controller.is_open());

    let stats = controller.statistics();
    assert_eq!(stats.packets_received, 31);
    assert_eq!(stats.frames_sealed, 3);
    assert_eq!(stats.packets_skipped(), 0);
}

#[test]
fn test_trailing_partial_rotation_is_discarded() {
    let controller = controller(None);
    let mut packets = sweeps(2, Model::Vlp16);
    packets.push(packet(3600, BLOCK_STEP, 500, Model::Vlp16));
    packets.push(packet(7200, BLOCK_STEP, 500, Model::Vlp16));
    controller.open(memory(packets), None).unwrap();

    let mut count = 0;
    while controller.retrieve_blocking().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    assert_eq!(controller.statistics().frames_sealed, 2);
}

#[test]
fn test_bad_packets_are_skipped() {
    let mut packets = Vec::new();
    for (i, good) in sweeps(2, Model::Vlp16).into_iter().enumerate() {
        packets.push(good);
        match i % 3 {
            0 => packets.push(vec![0u8; 554]),
            1 => packets.push(packet(0, BLOCK_STEP, 500, Model::Hdl32e)),
            _ => {
                let mut bad = packet(0, BLOCK_STEP, 500, Model::Vlp16);
                bad[2..4].copy_from_slice(&40000u16.to_le_bytes());
                packets.push(bad);
            }
        }
    }

    let controller = controller(None);
    controller.open(memory(packets), None).unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = controller.retrieve_blocking() {
        frames.push(frame);
    }
    assert_eq!(frames.len(), 2);
    assert!(frames
        .iter()
        .all(|f| f.point_count() == POINTS_PER_ROTATION));

    let stats = controller.statistics();
    assert_eq!(stats.packets_received, 42);
    assert_eq!(stats.length_mismatches, 7);
    assert_eq!(stats.sensor_mismatches, 7);
    assert_eq!(stats.azimuth_errors, 7);
}

#[test]
fn test_zero_distance_returns_produce_empty_frames() {
    let mut packets: Vec<Vec<u8>> = (0..PACKETS_PER_ROTATION * 2)
        .map(|i| {
            let start = (i % PACKETS_PER_ROTATION) as u16 * BLOCK_STEP * 12;
            packet(start, BLOCK_STEP, 0, Model::Vlp16)
        })
        .collect();
    packets.push(packet(0, BLOCK_STEP, 0, Model::Vlp16));

    let controller = controller(None);
    controller.open(memory(packets), None).unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = controller.retrieve_blocking() {
        frames.push(frame);
    }
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.is_empty()));
}

#[test]
fn test_open_failure() {
    let controller = controller(None);
    let err = controller.open(FailingSource, None).unwrap_err();
    match err {
        OpenError::Source { identifier, source } => {
            assert_eq!(identifier, "failing");
            assert!(matches!(source, SourceError::Io(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert!(!controller.is_open());
    assert!(!controller.is_running());
    assert_eq!(controller.state(), CaptureState::Idle);
    assert!(controller.retrieve_blocking().is_none());
}

#[test]
fn test_source_opened_on_capture_thread() {
    let source = RecordingSource::default();
    let controller = controller(None);
    controller.open(source.clone(), None).unwrap();
    assert_eq!(
        source.opened_on.lock().unwrap().as_deref(),
        Some("velocap-capture")
    );
    assert!(controller.is_open());

    controller.close();
    controller.close();
    assert_eq!(source.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_open_is_not_closed() {
    let source = RecordingSource {
        fail_open: true,
        ..Default::default()
    };
    let controller = controller(None);
    assert!(matches!(
        controller.open(source.clone(), None),
        Err(OpenError::Source { .. })
    ));
    assert!(source.opened_on.lock().unwrap().is_some());

    controller.close();
    assert_eq!(source.closes.load(Ordering::SeqCst), 0);
    assert!(!controller.is_running());
}

#[test]
fn test_capture_thread_panic_ends_stream() {
    let controller = controller(None);
    controller
        .open(PanickingSource(memory(sweeps(2, Model::Vlp16))), None)
        .unwrap();

    let mut count = 0;
    while controller.retrieve_blocking().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    assert!(!controller.is_running());

    controller.close();
    assert_eq!(controller.state(), CaptureState::Closed);
    assert!(!controller.is_open());
}

#[test]
fn test_backpressure_limits_queue_depth() {
    let controller = controller(Some(2));
    controller.open(memory(sweeps(5, Model::Vlp16)), None).unwrap();

    assert!(wait_until(|| controller.statistics().frames_sealed == 3));
    // third frame is sealed but held back by the producer
    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.queue_depth(), 2);
    assert_eq!(controller.statistics().frames_sealed, 3);
    assert!(controller.is_running());

    let mut ids = Vec::new();
    while let Some(frame) = controller.retrieve_blocking() {
        assert!(controller.queue_depth() <= 2);
        ids.push(frame.frame_id());
    }
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_close_unblocks_full_queue() {
    let controller = controller(Some(1));
    controller.open(memory(sweeps(5, Model::Vlp16)), None).unwrap();
    assert!(wait_until(|| controller.statistics().frames_sealed == 2));

    let started = Instant::now();
    controller.close();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(!controller.is_open());
    assert_eq!(controller.queue_depth(), 0);
    assert_eq!(controller.state(), CaptureState::Closed);
    assert!(controller.retrieve().is_none());
}

#[test]
fn test_close_with_silent_source() {
    let controller = controller(None);
    controller.open(SilentSource, None).unwrap();
    assert!(controller.is_running());
    assert!(controller.retrieve().is_none());

    controller.close();
    assert!(!controller.is_running());
    assert!(!controller.is_open());
}

#[test]
fn test_close_then_reopen() {
    let controller = controller(None);
    controller.open(memory(sweeps(2, Model::Vlp16)), None).unwrap();
    assert!(wait_until(|| !controller.is_running() || controller.queue_depth() == 2));
    controller.close();
    controller.close();

    assert!(!controller.is_open());
    assert_eq!(controller.queue_depth(), 0);
    assert_eq!(controller.state(), CaptureState::Closed);

    controller.open(memory(sweeps(1, Model::Vlp16)), None).unwrap();
    assert!(controller.is_open());
    assert_eq!(controller.state(), CaptureState::Capturing);

    let frame = controller.retrieve_blocking().unwrap();
    assert_eq!(frame.frame_id(), 0);
    assert!(controller.retrieve_blocking().is_none());
    assert_eq!(controller.statistics().frames_sealed, 1);
}

#[test]
fn test_open_replaces_running_session() {
    let controller = controller(None);
    controller.open(SilentSource, None).unwrap();
    controller.open(memory(sweeps(1, Model::Vlp16)), None).unwrap();

    assert!(controller.retrieve_blocking().is_some());
    assert!(controller.retrieve_blocking().is_none());
}

#[test]
fn test_concurrent_consumers() {
    let controller = Arc::new(controller(None));
    controller.open(memory(sweeps(6, Model::Vlp16)), None).unwrap();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let controller = controller.clone();
            thread::spawn(move || {
                let mut ids = Vec::new();
                while let Some(frame) = controller.retrieve_blocking() {
                    ids.push(frame.frame_id());
                }
                ids
            })
        })
        .collect();

    let mut ids: Vec<u64> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_transform_is_applied() {
    let plain = controller(None);
    plain.open(memory(sweeps(1, Model::Vlp16)), None).unwrap();
    let reference = plain.retrieve_blocking().unwrap();

    let shifted = controller(None);
    let transform =
        RigidTransform::from_translation_quaternion([100.0, -50.0, 2000.0], [0.0, 0.0, 0.0, 1.0]);
    shifted.open(memory(sweeps(1, Model::Vlp16)), Some(transform)).unwrap();
    let frame = shifted.retrieve_blocking().unwrap();

    assert_eq!(frame.len(), reference.len());
    for (a, b) in reference.points().iter().zip(frame.points()).step_by(97) {
        assert!((b.x() - (a.x() + 100.0)).abs() < 1e-2);
        assert!((b.y() - (a.y() - 50.0)).abs() < 1e-2);
        assert!((b.z() - (a.z() + 2000.0)).abs() < 1e-2);
    }
}

#[test]
fn test_hdl32e_with_array_points() {
    let queue = FrameQueue::new()
        .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(1));
    let controller: CaptureController<[f32; 3]> =
        CaptureController::with_queue(LaserGeometry::for_model(Model::Hdl32e), queue);
    controller.open(memory(sweeps(2, Model::Hdl32e)), None).unwrap();

    let mut count = 0;
    while let Some(frame) = controller.retrieve_blocking() {
        assert_eq!(frame.len(), POINTS_PER_ROTATION);
        // all lasers fire at the raw block position, ranges follow the vertical angle
        let geometry = LaserGeometry::hdl32e();
        let p = frame.points()[0];
        let xy = (p[0] as f64).hypot(p[1] as f64);
        assert!((xy - 1000.0 * geometry.cos(0)).abs() < 1e-3);
        count += 1;
    }
    assert_eq!(count, 2);
}

/// Ethernet/IPv4/UDP frame around `payload`
fn udp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(42 + payload.len());
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&[0x60, 0x76, 0x88, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&((28 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(&[192, 168, 1, 201, 255, 255, 255, 255]);
    frame.extend_from_slice(&2368u16.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

#[test]
fn test_pcap_replay() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[
        0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    ])
    .unwrap();

    for (i, payload) in sweeps(2, Model::Vlp16).iter().enumerate() {
        // position packets on port 8308 are interleaved and filtered out
        for data in [udp_frame(2368, payload), udp_frame(8308, &[0u8; 512])] {
            let len = data.len() as u32;
            file.write_all(&1_600_000_000u32.to_le_bytes()).unwrap();
            file.write_all(&(i as u32 * 1000).to_le_bytes()).unwrap();
            file.write_all(&len.to_le_bytes()).unwrap();
            file.write_all(&len.to_le_bytes()).unwrap();
            file.write_all(&data).unwrap();
        }
    }
    file.flush().unwrap();

    let controller = controller(None);
    controller
        .open(PcapSource::new(file.path()).with_port(Some(2368)), None)
        .unwrap();

    let first = controller.retrieve_blocking().unwrap();
    assert_eq!(first.point_count(), POINTS_PER_ROTATION);
    assert_eq!(first.timestamp_us(), 1_600_000_000_000_000 + 10_000);
    assert!(controller.retrieve_blocking().is_some());
    assert!(controller.retrieve_blocking().is_none());

    let stats = controller.statistics();
    assert_eq!(stats.packets_received, 21);
    assert_eq!(stats.packets_skipped(), 0);
}
