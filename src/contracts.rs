/// Core data structures exchanged between the sensor facade and the pump
///
/// A `SensorPacket` is one tracker's reading for one sampling cycle; a
/// `Snapshot` collects whatever packets arrived for that cycle.
use std::collections::HashMap;

/// Number of axes in the acceleration, gyroscope and magnetometer channels
pub const VECTOR_WIDTH: usize = 3;

/// Number of components in an orientation quaternion (w, x, y, z)
pub const QUATERNION_WIDTH: usize = 4;

/// SensorPacket - one tracker's reading for one cycle
///
/// All three IMU channels are always present together; a facade that only
/// received part of a reading must report the device as absent instead.
///
/// # Fields
/// - acceleration: m/s², calibrated
/// - gyroscope: deg/s, calibrated
/// - magnetometer: arbitrary units, calibrated
/// - orientation: only filled when orientation capture is enabled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPacket {
    pub acceleration: [f32; VECTOR_WIDTH],
    pub gyroscope: [f32; VECTOR_WIDTH],
    pub magnetometer: [f32; VECTOR_WIDTH],
    pub orientation: Option<[f32; QUATERNION_WIDTH]>,

    /// Fine-grained device clock (microsecond ticks, wraps at u32::MAX)
    pub timestamp_fine: u32,

    /// Host time-of-arrival in seconds
    pub time_of_arrival_s: f64,

    /// Per-device packet counter, increases monotonically
    pub counter: u32,
}

impl SensorPacket {
    /// Create a packet carrying the three IMU channels.
    pub fn new(
        acceleration: [f32; VECTOR_WIDTH],
        gyroscope: [f32; VECTOR_WIDTH],
        magnetometer: [f32; VECTOR_WIDTH],
        timestamp_fine: u32,
        time_of_arrival_s: f64,
        counter: u32,
    ) -> Self {
        Self {
            acceleration,
            gyroscope,
            magnetometer,
            orientation: None,
            timestamp_fine,
            time_of_arrival_s,
            counter,
        }
    }

    /// Attach an orientation quaternion.
    pub fn with_orientation(mut self, quaternion: [f32; QUATERNION_WIDTH]) -> Self {
        self.orientation = Some(quaternion);
        self
    }
}

/// Snapshot - sparse set of per-device readings for one sampling cycle
///
/// A device may be missing entirely or mapped to `None`; both mean "no
/// fresh data this cycle".
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<String, Option<SensorPacket>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a device's packet (or explicit absence) for this cycle.
    pub fn insert(&mut self, device_id: impl Into<String>, packet: Option<SensorPacket>) {
        self.entries.insert(device_id.into(), packet);
    }

    /// Builder-style variant of [`Snapshot::insert`].
    pub fn with(mut self, device_id: impl Into<String>, packet: Option<SensorPacket>) -> Self {
        self.insert(device_id, packet);
        self
    }

    pub fn get(&self, device_id: &str) -> Option<&SensorPacket> {
        self.entries.get(device_id).and_then(Option::as_ref)
    }

    /// Iterate over every reported entry, present or not.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&SensorPacket>)> {
        self.entries
            .iter()
            .map(|(id, packet)| (id.as_str(), packet.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of devices that delivered a packet this cycle.
    pub fn present_count(&self) -> usize {
        self.entries.values().filter(|p| p.is_some()).count()
    }
}

impl FromIterator<(String, Option<SensorPacket>)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Option<SensorPacket>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
