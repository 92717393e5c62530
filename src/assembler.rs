/// Snapshot assembler - sparse snapshot to dense channel matrices
///
/// Every cycle starts from freshly allocated sentinel matrices: NaN for the
/// floating channels, zero for the integer ones. Rows of devices that did
/// not report keep those sentinels, so stale data never leaks forward.
use ndarray::{Array1, Array2};

use crate::contracts::{Snapshot, QUATERNION_WIDTH, VECTOR_WIDTH};
use crate::registry::DeviceRegistry;

/// Dense per-cycle channel data, one row per tracker
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMatrices {
    /// [N, 3]
    pub acceleration: Array2<f32>,
    /// [N, 3]
    pub gyroscope: Array2<f32>,
    /// [N, 3]
    pub magnetometer: Array2<f32>,
    /// [N, 4], only when orientation capture is enabled
    pub orientation: Option<Array2<f32>>,
    pub timestamp: Array1<u32>,
    pub time_of_arrival: Array1<f64>,
    pub counter: Array1<u32>,
}

impl ChannelMatrices {
    /// All-sentinel matrices for `trackers` rows.
    pub fn sentinel(trackers: usize, orientation: bool) -> Self {
        Self {
            acceleration: Array2::from_elem((trackers, VECTOR_WIDTH), f32::NAN),
            gyroscope: Array2::from_elem((trackers, VECTOR_WIDTH), f32::NAN),
            magnetometer: Array2::from_elem((trackers, VECTOR_WIDTH), f32::NAN),
            orientation: orientation
                .then(|| Array2::from_elem((trackers, QUATERNION_WIDTH), f32::NAN)),
            timestamp: Array1::zeros(trackers),
            time_of_arrival: Array1::from_elem(trackers, f64::NAN),
            counter: Array1::zeros(trackers),
        }
    }

    pub fn trackers(&self) -> usize {
        self.acceleration.nrows()
    }

    /// Whether `row` still holds the missing-data sentinel.
    pub fn is_row_missing(&self, row: usize) -> bool {
        self.acceleration.row(row).iter().all(|v| v.is_nan()) && self.counter[row] == 0
    }
}

/// SnapshotAssembler - places packets into rows chosen by the registry
pub struct SnapshotAssembler {
    registry: DeviceRegistry,
    orientation: bool,
}

impl SnapshotAssembler {
    pub fn new(registry: DeviceRegistry, orientation: bool) -> Self {
        Self {
            registry,
            orientation,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn orientation_enabled(&self) -> bool {
        self.orientation
    }

    /// Build this cycle's channel matrices.
    ///
    /// Row placement depends only on the registry, never on the snapshot's
    /// iteration order. Devices unknown to the registry are skipped.
    pub fn assemble(&self, snapshot: &Snapshot) -> ChannelMatrices {
        let mut out = ChannelMatrices::sentinel(self.registry.len(), self.orientation);

        for (device_id, packet) in snapshot.iter() {
            let Some(row) = self.registry.row_of(device_id) else {
                log::warn!("Ignoring packet from unregistered device {}", device_id);
                continue;
            };
            let Some(packet) = packet else {
                continue;
            };

            copy_row(&mut out.acceleration, row, &packet.acceleration);
            copy_row(&mut out.gyroscope, row, &packet.gyroscope);
            copy_row(&mut out.magnetometer, row, &packet.magnetometer);
            if let (Some(matrix), Some(quaternion)) = (out.orientation.as_mut(), packet.orientation)
            {
                copy_row(matrix, row, &quaternion);
            }
            out.timestamp[row] = packet.timestamp_fine;
            out.time_of_arrival[row] = packet.time_of_arrival_s;
            out.counter[row] = packet.counter;
        }

        out
    }
}

#[inline]
fn copy_row(matrix: &mut Array2<f32>, row: usize, values: &[f32]) {
    for (dst, src) in matrix.row_mut(row).iter_mut().zip(values) {
        *dst = *src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::SensorPacket;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::assign(["knee_right", "foot_right", "pelvis", "knee_left", "foot_left"])
    }

    fn packet(seed: f32, counter: u32) -> SensorPacket {
        SensorPacket::new(
            [seed, seed + 1.0, seed + 2.0],
            [seed * 10.0; 3],
            [-seed; 3],
            counter * 100,
            f64::from(counter) * 0.01,
            counter,
        )
    }

    #[test]
    fn test_sentinel_fill() {
        let m = ChannelMatrices::sentinel(5, false);
        assert_eq!(m.acceleration.dim(), (5, 3));
        assert!(m.acceleration.iter().all(|v| v.is_nan()));
        assert!(m.gyroscope.iter().all(|v| v.is_nan()));
        assert!(m.magnetometer.iter().all(|v| v.is_nan()));
        assert!(m.orientation.is_none());
        assert!(m.counter.iter().all(|&c| c == 0));
        assert!(m.timestamp.iter().all(|&t| t == 0));
        assert!(m.time_of_arrival.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_missing_device_keeps_sentinel() {
        let assembler = SnapshotAssembler::new(registry(), false);
        let snapshot = Snapshot::new()
            .with("pelvis", Some(packet(1.0, 3)))
            .with("knee_left", None);

        let m = assembler.assemble(&snapshot);

        assert_eq!(m.acceleration.row(2).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(m.counter[2], 3);
        assert_eq!(m.timestamp[2], 300);
        for row in [0, 1, 3, 4] {
            assert!(m.is_row_missing(row), "row {} should be sentinel", row);
            assert_eq!(m.timestamp[row], 0);
        }
    }

    #[test]
    fn test_placement_independent_of_snapshot_order() {
        let assembler = SnapshotAssembler::new(registry(), false);
        let forward: Snapshot = ["knee_right", "foot_right", "pelvis"]
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), Some(packet(i as f32, i as u32 + 1))))
            .collect();
        let reverse: Snapshot = ["pelvis", "foot_right", "knee_right"]
            .iter()
            .map(|id| {
                let i = registry().row_of(id).unwrap();
                (id.to_string(), Some(packet(i as f32, i as u32 + 1)))
            })
            .collect();

        let a = assembler.assemble(&forward);
        let b = assembler.assemble(&reverse);
        assert_eq!(a.counter, b.counter);
        assert_eq!(a.acceleration.row(1).to_vec(), b.acceleration.row(1).to_vec());
    }

    #[test]
    fn test_orientation_arity() {
        let snapshot = Snapshot::new()
            .with("pelvis", Some(packet(1.0, 1).with_orientation([1.0, 0.0, 0.0, 0.0])))
            .with("foot_left", Some(packet(2.0, 2)));

        let without = SnapshotAssembler::new(registry(), false).assemble(&snapshot);
        assert!(without.orientation.is_none());

        let with = SnapshotAssembler::new(registry(), true).assemble(&snapshot);
        let q = with.orientation.expect("orientation enabled");
        assert_eq!(q.dim(), (5, 4));
        assert_eq!(q.row(2).to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
        // foot_left reported without a quaternion
        assert!(q.row(4).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_unregistered_device_ignored() {
        let assembler = SnapshotAssembler::new(registry(), false);
        let snapshot = Snapshot::new().with("head", Some(packet(5.0, 9)));

        let m = assembler.assemble(&snapshot);
        assert!((0..5).all(|row| m.is_row_missing(row)));
    }

    #[test]
    fn test_fresh_matrices_each_cycle() {
        let assembler = SnapshotAssembler::new(registry(), false);
        let first = Snapshot::new().with("knee_left", Some(packet(4.0, 1)));
        let second = Snapshot::new().with("knee_left", None);

        assert!(!assembler.assemble(&first).is_row_missing(3));
        assert!(assembler.assemble(&second).is_row_missing(3));
    }
}
