//! # Velocap Core
//!
//! Platform-independent decoding and frame assembly for Velodyne VLP-16 and
//! HDL-32E lidar data packets.
//!
//! This crate contains pure parsing and geometry logic with **zero I/O
//! dependencies**: no threads, no sockets, no files. Packet sources, the frame
//! queue and the capture thread live in the `velocap` crate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  velocap-core (pure, no I/O)                                │
//! │  ├── protocol/    (1206 byte data packet decoding)          │
//! │  ├── geometry     (laser models, vertical angle tables)     │
//! │  ├── azimuth      (second firing interpolation)             │
//! │  ├── segmenter    (rotation wraparound detection)           │
//! │  ├── projection   (polar → cartesian, rigid transform)      │
//! │  ├── frame        (Point trait, Frame, FrameBuilder)        │
//! │  └── assembler    (per packet pipeline)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!    ┌────────────┴────────────────────────────┐
//!    │  velocap                                │
//!    │  (pcap/UDP sources, FrameQueue,         │
//!    │   CaptureController, CLI)               │
//!    └─────────────────────────────────────────┘
//! ```
//!
//! ## Supported Sensors
//!
//! | Model    | Lasers | Sensor type byte |
//! |----------|--------|------------------|
//! | VLP-16   | 16     | 0x22             |
//! | HDL-32E  | 32     | 0x21             |
//!
//! Only single return modes are decoded.
//!
//! ## Example: Assembling Frames
//!
//! ```rust
//! use velocap_core::{FrameAssembler, LaserGeometry, Model};
//!
//! let mut assembler: FrameAssembler = FrameAssembler::new(LaserGeometry::for_model(Model::Vlp16), None);
//! let payload = [0u8; 1206]; // Real payload from network or pcap
//!
//! let mut frames = Vec::new();
//! match assembler.process_packet(&payload, 0, |frame| frames.push(frame)) {
//!     Ok(summary) => println!("{} points", summary.points),
//!     Err(e) => println!("Skipped packet: {}", e),
//! }
//! ```

pub mod assembler;
pub mod azimuth;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod projection;
pub mod protocol;
pub mod segmenter;

// Re-export commonly used types
pub use assembler::{FrameAssembler, PacketSummary};
pub use azimuth::AzimuthInterpolator;
pub use error::ParseError;
pub use frame::{Frame, FrameBuilder, Point, PointXYZ};
pub use geometry::{LaserGeometry, Model};
pub use projection::{CoordinateProjector, RigidTransform};
pub use protocol::velodyne::{DataPacket, FiringBlock, LaserReturn, PACKET_SIZE};
pub use segmenter::RotationSegmenter;
