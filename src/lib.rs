/// IMU Relay Core - full-body IMU snapshots over fixed-layout UDP frames
///
/// Streams one frame per sampling cycle from a set of wearable trackers to
/// a real-time controller. Each frame is a headerless run of channel
/// blocks whose length depends only on the tracker count and the enabled
/// optional blocks, both agreed with the receiver out of band.
///
/// # Design Principles
/// - Deterministic row assignment from configuration order
/// - NaN/zero sentinels for trackers that missed a cycle, never stale data
/// - One datagram per cycle, no acknowledgment or retransmission
/// - Resources released exactly once on every exit path

pub mod errors;
pub mod contracts;
pub mod registry;
pub mod assembler;
pub mod codec;
pub mod transmitter;
pub mod receiver;
pub mod retry;
pub mod facade;
pub mod stop;
pub mod session;
pub mod config;
pub mod logging;

pub use assembler::{ChannelMatrices, SnapshotAssembler};
pub use codec::{Channel, DecodedFrame, FrameCodec, FrameLayout};
pub use config::StreamConfig;
pub use contracts::{SensorPacket, Snapshot};
pub use errors::{Result, StreamError};
pub use facade::{SensorFacade, SimulatedFacade};
pub use registry::DeviceRegistry;
pub use session::{ExitReason, RunSummary, Session, SessionOptions, StreamState};
pub use stop::StopSignal;
pub use transmitter::{FrameSink, UdpTransport};

/// Maximum frame size (in bytes) - one UDP datagram on a 1500-byte MTU path
pub const MAX_PAYLOAD_SIZE: usize = 1472;

/// Default number of sensor network initialization attempts
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Default delay after the first failed initialization, in milliseconds
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 250;

/// Default cap on the initialization backoff, in milliseconds
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 8000;

/// Backoff multiplier for reconnection (exponential)
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Pause after a cycle without a snapshot, in microseconds
pub const DEFAULT_GAP_PAUSE_US: u64 = 500;
