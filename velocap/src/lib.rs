//! # Velocap
//!
//! Capture of Velodyne VLP-16 and HDL-32E point clouds from a pcap file or a
//! live sensor, one full rotation at a time.
//!
//! This crate provides the I/O side of the pipeline; decoding and frame
//! assembly live in `velocap-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────────────────────┐   ┌────────────┐   ┌──────────┐
//! │ PacketSource  │──►│ capture thread               │──►│ FrameQueue │──►│ consumer │
//! │ (pcap / UDP / │   │ FrameAssembler (velocap-core)│   │ (Mutex)    │   │ retrieve │
//! │  memory)      │   └──────────────────────────────┘   └────────────┘   └──────────┘
//! └───────────────┘                 ▲
//!                                   │ open / close / stop flag
//!                        ┌──────────┴──────────┐
//!                        │  CaptureController  │
//!                        └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use velocap::source::PcapSource;
//! use velocap::CaptureController;
//! use velocap_core::LaserGeometry;
//!
//! let controller: CaptureController = CaptureController::new(LaserGeometry::vlp16());
//! controller.open(PcapSource::new("drive.pcap"), None)?;
//!
//! while let Some(frame) = controller.retrieve_blocking() {
//!     println!("frame {}: {} points", frame.frame_id(), frame.len());
//! }
//! # Ok::<(), velocap::OpenError>(())
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `TARGET` - pcap file to replay, or UDP address (or bare port) to listen on
//! - `-m, --model` - `vlp16` (default) or `hdl32e`
//! - `--max-queue` - bound the frame queue and apply backpressure
//! - `--tf-vec`, `--tf-quat` - sensor mounting pose
//! - `-v` - Increase verbosity (use multiple times)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info};
use miette::{miette, IntoDiagnostic, Result};
use velocap_core::Model;

pub mod capture;
pub mod config;
pub mod queue;
pub mod report;
pub mod source;

pub use capture::{CaptureController, CaptureState, OpenError, StatisticsSnapshot};
pub use config::{CaptureConfig, ConfigError, TransformConfig};
pub use queue::FrameQueue;
pub use report::FrameSummary;
pub use source::{MemorySource, PacketSource, RawPacket, SourceError};

use source::udp::{parse_listen_address, DEFAULT_DATA_PORT};
use source::{PcapSource, UdpSource};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Pcap file to replay, or UDP address to listen on.
    ///
    /// If TARGET names an existing file it is replayed as a pcap capture,
    /// otherwise it is parsed as `address:port` or a bare port.
    #[arg(default_value_t = DEFAULT_DATA_PORT.to_string())]
    pub target: String,

    /// Sensor model
    #[arg(short, long)]
    pub model: Option<Model>,

    /// Maximum number of queued frames before the capture thread waits
    #[arg(long)]
    pub max_queue: Option<usize>,

    /// Only replay pcap records sent to this UDP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Sensor translation from the base frame, millimeters
    #[arg(long, num_args = 3, value_delimiter = ' ', allow_negative_numbers = true)]
    pub tf_vec: Option<Vec<f32>>,

    /// Sensor rotation from the base frame, quaternion x y z w
    #[arg(long, num_args = 4, value_delimiter = ' ', allow_negative_numbers = true)]
    pub tf_quat: Option<Vec<f32>>,

    /// Configuration file, defaults to the platform config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    pub frames: Option<u64>,

    /// Write a JSON summary of every frame to stdout
    #[arg(long, default_value_t = false)]
    pub output: bool,
}

impl Cli {
    /// Command line options win over the configuration file
    pub fn apply_overrides(&self, config: &mut CaptureConfig) {
        if let Some(model) = self.model {
            config.model = model;
        }
        if self.max_queue.is_some() {
            config.max_queue_depth = self.max_queue;
        }
        if self.tf_vec.is_some() || self.tf_quat.is_some() {
            let translation = match self.tf_vec.as_deref() {
                Some(&[x, y, z]) => [x, y, z],
                _ => [0.0; 3],
            };
            let rotation = match self.tf_quat.as_deref() {
                Some(&[x, y, z, w]) => [x, y, z, w],
                _ => [0.0, 0.0, 0.0, 1.0],
            };
            config.transform = Some(TransformConfig::Pose {
                translation,
                rotation,
            });
        }
    }
}

/// Where packets come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pcap(PathBuf),
    Udp(SocketAddr),
}

impl Target {
    pub fn parse(target: &str) -> Option<Target> {
        let path = Path::new(target);
        if path.is_file() {
            return Some(Target::Pcap(path.to_path_buf()));
        }
        parse_listen_address(target).map(Target::Udp)
    }
}

/// Run a capture session as configured on the command line
pub fn run(args: Cli) -> Result<()> {
    let mut config = CaptureConfig::load(args.config.as_deref()).into_diagnostic()?;
    args.apply_overrides(&mut config);
    debug!("Configuration: {:?}", config);

    let target = Target::parse(&args.target).ok_or_else(|| {
        miette!(
            "{} is neither a pcap file nor a listen address",
            args.target
        )
    })?;

    let controller: CaptureController = CaptureController::from_config(&config);
    let transform = config.transform();
    match target {
        Target::Pcap(path) => {
            controller.open(PcapSource::new(path).with_port(args.port), transform)
        }
        Target::Udp(addr) => controller.open(UdpSource::new(addr), transform),
    }
    .into_diagnostic()?;

    let mut retrieved = 0u64;
    while let Some(frame) = controller.retrieve_blocking() {
        retrieved += 1;
        if args.output {
            println!("{}", FrameSummary::from_frame(&frame).to_json());
        } else {
            debug!(
                "Frame {}: {} points, queue depth {}",
                frame.frame_id(),
                frame.len(),
                controller.queue_depth()
            );
        }
        if args.frames.is_some_and(|limit| retrieved >= limit) {
            break;
        }
    }

    let stats = controller.statistics();
    controller.close();
    info!(
        "Retrieved {} frames; {} packets, {} length mismatches, {} sensor mismatches, {} bad azimuths, {} points",
        retrieved,
        stats.packets_received,
        stats.length_mismatches,
        stats.sensor_mismatches,
        stats.azimuth_errors,
        stats.points_emitted
    );
    Ok(())
}
