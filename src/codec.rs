/// Frame codec - fixed-layout binary framing of channel matrices
///
/// # Wire Layout
/// Consecutive channel blocks, no header, no length prefix, no checksum:
///
/// ```text
/// ┌──────────┬──────────┬──────────┬───────────────┬─────────────┐
/// │ acc N×3  │ gyr N×3  │ mag N×3  │ [quat N×4]    │ [counter N] │
/// │ f32      │ f32      │ f32      │ f32, optional │ u32, opt.   │
/// └──────────┴──────────┴──────────┴───────────────┴─────────────┘
/// ```
///
/// Each block is tracker-major, axis-minor. Values use the host's native
/// byte order; sender and receiver are assumed to share it. The receiver
/// must know N and the active flags out of band.
use ndarray::{Array1, Array2};

use crate::assembler::ChannelMatrices;
use crate::contracts::{QUATERNION_WIDTH, VECTOR_WIDTH};
use crate::errors::{Result, StreamError};

/// Size of one float slot on the wire
pub const FLOAT_SIZE: usize = std::mem::size_of::<f32>();

/// Size of one counter slot on the wire
pub const COUNTER_SIZE: usize = std::mem::size_of::<u32>();

/// Channel blocks in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Acceleration,
    Gyroscope,
    Magnetometer,
    Orientation,
    Counter,
}

impl Channel {
    /// Components per tracker in this block.
    pub const fn width(self) -> usize {
        match self {
            Self::Acceleration | Self::Gyroscope | Self::Magnetometer => VECTOR_WIDTH,
            Self::Orientation => QUATERNION_WIDTH,
            Self::Counter => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Acceleration => "acceleration",
            Self::Gyroscope => "gyroscope",
            Self::Magnetometer => "magnetometer",
            Self::Orientation => "orientation",
            Self::Counter => "counter",
        }
    }
}

/// FrameLayout - tracker count plus the optional block flags
///
/// Frame length is a pure function of this value and never changes
/// during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub trackers: usize,
    pub orientation: bool,
    pub counters: bool,
}

impl FrameLayout {
    pub fn new(trackers: usize, orientation: bool, counters: bool) -> Self {
        Self {
            trackers,
            orientation,
            counters,
        }
    }

    /// Blocks present in this layout, in wire order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        [
            Channel::Acceleration,
            Channel::Gyroscope,
            Channel::Magnetometer,
            Channel::Orientation,
            Channel::Counter,
        ]
        .into_iter()
        .filter(move |c| self.has_channel(*c))
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        match channel {
            Channel::Orientation => self.orientation,
            Channel::Counter => self.counters,
            _ => true,
        }
    }

    /// Byte length of one channel block (zero when the block is disabled).
    pub fn block_len(&self, channel: Channel) -> usize {
        if !self.has_channel(channel) {
            return 0;
        }
        let slot = match channel {
            Channel::Counter => COUNTER_SIZE,
            _ => FLOAT_SIZE,
        };
        self.trackers * channel.width() * slot
    }

    /// Total frame length L.
    pub fn frame_len(&self) -> usize {
        self.channels().map(|c| self.block_len(c)).sum()
    }

    /// Byte offset where `channel`'s block starts, `None` if disabled.
    pub fn block_offset(&self, channel: Channel) -> Option<usize> {
        if !self.has_channel(channel) {
            return None;
        }
        Some(
            self.channels()
                .take_while(|c| *c != channel)
                .map(|c| self.block_len(c))
                .sum(),
        )
    }

    /// Byte offset of `row`'s slots inside the frame.
    pub fn row_offset(&self, channel: Channel, row: usize) -> Option<usize> {
        if row >= self.trackers {
            return None;
        }
        let per_row = self.block_len(channel) / self.trackers.max(1);
        self.block_offset(channel).map(|start| start + row * per_row)
    }
}

/// Decoded frame contents, as seen by the receiver
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub acceleration: Array2<f32>,
    pub gyroscope: Array2<f32>,
    pub magnetometer: Array2<f32>,
    pub orientation: Option<Array2<f32>>,
    pub counter: Option<Array1<u32>>,
}

/// FrameCodec - encoder/decoder for one fixed layout
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    layout: FrameLayout,
}

impl FrameCodec {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn frame_len(&self) -> usize {
        self.layout.frame_len()
    }

    /// Encode one cycle's matrices into a frame of exactly `frame_len()` bytes.
    ///
    /// # Errors
    /// `LayoutMismatch` if a matrix shape disagrees with the layout or an
    /// enabled block has no data.
    pub fn encode(&self, matrices: &ChannelMatrices) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(self.frame_len());

        self.put_floats(&mut frame, Channel::Acceleration, &matrices.acceleration)?;
        self.put_floats(&mut frame, Channel::Gyroscope, &matrices.gyroscope)?;
        self.put_floats(&mut frame, Channel::Magnetometer, &matrices.magnetometer)?;

        if self.layout.orientation {
            let orientation = matrices.orientation.as_ref().ok_or(StreamError::LayoutMismatch {
                channel: Channel::Orientation.name(),
                expected: (self.layout.trackers, QUATERNION_WIDTH),
                actual: (0, 0),
            })?;
            self.put_floats(&mut frame, Channel::Orientation, orientation)?;
        }

        if self.layout.counters {
            if matrices.counter.len() != self.layout.trackers {
                return Err(StreamError::LayoutMismatch {
                    channel: Channel::Counter.name(),
                    expected: (self.layout.trackers, 1),
                    actual: (matrices.counter.len(), 1),
                });
            }
            for value in matrices.counter.iter() {
                frame.extend_from_slice(&value.to_ne_bytes());
            }
        }

        debug_assert_eq!(frame.len(), self.frame_len());
        Ok(frame)
    }

    /// Decode a frame produced by [`FrameCodec::encode`] with the same layout.
    ///
    /// # Errors
    /// `FrameLengthMismatch` unless `bytes.len() == frame_len()`; the buffer
    /// is never truncated or padded.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedFrame> {
        let expected = self.frame_len();
        if bytes.len() != expected {
            return Err(StreamError::FrameLengthMismatch {
                expected,
                received: bytes.len(),
            });
        }

        let mut cursor = 0;
        let acceleration = self.take_floats(bytes, &mut cursor, Channel::Acceleration)?;
        let gyroscope = self.take_floats(bytes, &mut cursor, Channel::Gyroscope)?;
        let magnetometer = self.take_floats(bytes, &mut cursor, Channel::Magnetometer)?;
        let orientation = if self.layout.orientation {
            Some(self.take_floats(bytes, &mut cursor, Channel::Orientation)?)
        } else {
            None
        };
        let counter = self.layout.counters.then(|| {
            let block = &bytes[cursor..cursor + self.layout.block_len(Channel::Counter)];
            block
                .chunks_exact(COUNTER_SIZE)
                .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect::<Array1<u32>>()
        });

        Ok(DecodedFrame {
            acceleration,
            gyroscope,
            magnetometer,
            orientation,
            counter,
        })
    }

    fn put_floats(&self, frame: &mut Vec<u8>, channel: Channel, matrix: &Array2<f32>) -> Result<()> {
        let expected = (self.layout.trackers, channel.width());
        if matrix.dim() != expected {
            return Err(StreamError::LayoutMismatch {
                channel: channel.name(),
                expected,
                actual: matrix.dim(),
            });
        }
        // Logical iteration order is row-major regardless of memory layout
        for value in matrix.iter() {
            frame.extend_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }

    fn take_floats(&self, bytes: &[u8], cursor: &mut usize, channel: Channel) -> Result<Array2<f32>> {
        let len = self.layout.block_len(channel);
        let block = &bytes[*cursor..*cursor + len];
        *cursor += len;

        let values: Vec<f32> = block
            .chunks_exact(FLOAT_SIZE)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Array2::from_shape_vec((self.layout.trackers, channel.width()), values).map_err(|_| {
            StreamError::LayoutMismatch {
                channel: channel.name(),
                expected: (self.layout.trackers, channel.width()),
                actual: (len / FLOAT_SIZE, 1),
            }
        })
    }
}
