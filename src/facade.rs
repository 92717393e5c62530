/// Sensor facade - the pump's view of the wireless sensor network
///
/// The real implementation wraps a vendor SDK (discovery, connection,
/// clock sync, per-device packet alignment). The pump only needs the five
/// calls below. `SimulatedFacade` stands in for hardware during loop-back
/// runs and tests.
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::contracts::{SensorPacket, Snapshot};

/// Lifecycle and data calls exposed by a sensor network driver
pub trait SensorFacade {
    /// Discover, connect, configure and start streaming. `false` on any failure.
    fn initialize(&mut self) -> bool;

    /// Stop measurement and release device handles. Safe to call repeatedly.
    fn cleanup(&mut self);

    /// Shut the driver down for good.
    fn close(&mut self);

    /// Oldest aligned snapshot, or `None` if nothing is ready.
    fn get_snapshot(&mut self) -> Option<Snapshot>;

    /// Whether more snapshots may still arrive.
    fn is_more(&self) -> bool;
}

/// Knobs for the simulated sensor network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Probability a device misses a cycle
    pub dropout_probability: f64,

    /// Probability a whole cycle yields no snapshot while the stream goes on
    pub gap_probability: f64,

    /// Number of `initialize()` calls that fail before one succeeds
    pub fail_first_connects: u32,

    /// End the stream after this many snapshots
    pub max_cycles: Option<u64>,

    /// Standard deviation of the additive sensor noise
    pub noise_std: f32,

    /// RNG seed; random when absent
    pub seed: Option<u64>,

    /// Sleep to the sampling period between snapshots
    pub realtime: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dropout_probability: 0.05,
            gap_probability: 0.0,
            fail_first_connects: 0,
            max_cycles: None,
            noise_std: 0.02,
            seed: None,
            realtime: true,
        }
    }
}

const GRAVITY: [f32; 3] = [0.0, 0.0, 9.81];
const MAGNETIC_REFERENCE: [f32; 3] = [0.3, 0.0, 0.5];
/// Largest emulated clock skew between unsynchronised trackers (µs)
const MAX_CLOCK_SKEW_TICKS: u32 = 1_000_000;

pub struct SimulatedFacade {
    device_ids: Vec<String>,
    master_id: String,
    period: Duration,
    orientation: bool,
    sync_devices: bool,
    settings: SimulationSettings,
    rng: StdRng,
    noise: Option<Normal<f32>>,
    counters: Vec<u32>,
    clock_offsets: Vec<u32>,
    cycle: u64,
    connects_failed: u32,
    connected: bool,
    more: bool,
    started: Instant,
    next_tick: Instant,
}

impl SimulatedFacade {
    /// Create a simulated network for `device_ids` (in row order).
    ///
    /// `master_id` is the relay device, started last as the real driver does.
    pub fn new(
        device_ids: Vec<String>,
        master_id: impl Into<String>,
        sampling_rate_hz: u32,
        orientation: bool,
        sync_devices: bool,
        settings: SimulationSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, settings.noise_std).ok();
        if noise.is_none() {
            log::warn!("Invalid noise_std {}, simulating without noise", settings.noise_std);
        }
        let now = Instant::now();
        let device_count = device_ids.len();

        Self {
            device_ids,
            master_id: master_id.into(),
            period: Duration::from_secs(1) / sampling_rate_hz.max(1),
            orientation,
            sync_devices,
            settings,
            rng,
            noise,
            counters: vec![0; device_count],
            clock_offsets: vec![0; device_count],
            cycle: 0,
            connects_failed: 0,
            connected: false,
            more: false,
            started: now,
            next_tick: now,
        }
    }

    /// Build from the process configuration.
    pub fn from_config(config: &crate::config::StreamConfig) -> Self {
        let master = config
            .master_serial()
            .map(str::to_string)
            .unwrap_or_default();
        Self::new(
            config.device_ids().map(str::to_string).collect(),
            master,
            config.sampling_rate_hz,
            config.orientation,
            config.sync_devices,
            config.simulation.clone(),
        )
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    fn noisy(&mut self, reference: [f32; 3]) -> [f32; 3] {
        let mut out = reference;
        if let Some(noise) = &self.noise {
            for v in out.iter_mut() {
                *v += noise.sample(&mut self.rng);
            }
        }
        out
    }

    fn make_packet(&mut self, index: usize) -> SensorPacket {
        self.counters[index] = self.counters[index].wrapping_add(1);
        // Device clock ticks in microseconds and wraps like the real one
        let elapsed_ticks = self.period.as_micros() as u64 * self.cycle;
        let timestamp_fine = (elapsed_ticks as u32).wrapping_add(self.clock_offsets[index]);

        let acceleration = self.noisy(GRAVITY);
        let gyroscope = self.noisy([0.0; 3]);
        let magnetometer = self.noisy(MAGNETIC_REFERENCE);
        let packet = SensorPacket::new(
            acceleration,
            gyroscope,
            magnetometer,
            timestamp_fine,
            self.started.elapsed().as_secs_f64(),
            self.counters[index],
        );

        if self.orientation {
            packet.with_orientation([1.0, 0.0, 0.0, 0.0])
        } else {
            packet
        }
    }
}

impl SensorFacade for SimulatedFacade {
    fn initialize(&mut self) -> bool {
        if self.connects_failed < self.settings.fail_first_connects {
            self.connects_failed += 1;
            log::warn!(
                "Simulated connection failure {} of {}",
                self.connects_failed,
                self.settings.fail_first_connects
            );
            return false;
        }

        for id in &self.device_ids {
            log::info!("Connected to {}", id);
        }

        // Unsynchronised devices drift apart; emulate with fixed clock offsets
        if self.sync_devices {
            log::info!("Synchronising trackers to master {}", self.master_id);
            self.clock_offsets.iter_mut().for_each(|o| *o = 0);
        } else {
            for offset in self.clock_offsets.iter_mut() {
                *offset = self.rng.gen_range(0..MAX_CLOCK_SKEW_TICKS);
            }
        }

        let start_order = self
            .device_ids
            .iter()
            .filter(|id| **id != self.master_id)
            .chain(self.device_ids.iter().filter(|id| **id == self.master_id));
        for id in start_order {
            log::debug!("Starting measurement on {}", id);
        }

        self.connected = true;
        self.more = true;
        self.started = Instant::now();
        self.next_tick = self.started;
        true
    }

    fn cleanup(&mut self) {
        if self.connected {
            log::info!("Stopping measurement on {} trackers", self.device_ids.len());
        }
        self.connected = false;
        self.more = false;
    }

    fn close(&mut self) {
        log::info!("Simulated sensor network closed after {} cycles", self.cycle);
    }

    fn get_snapshot(&mut self) -> Option<Snapshot> {
        if !self.connected || !self.more {
            return None;
        }
        if let Some(max) = self.settings.max_cycles {
            if self.cycle >= max {
                log::info!("Simulated stream ended after {} cycles", self.cycle);
                self.more = false;
                return None;
            }
        }

        if self.settings.realtime {
            let now = Instant::now();
            if self.next_tick > now {
                std::thread::sleep(self.next_tick - now);
            }
            self.next_tick += self.period;
        }

        if self.rng.gen_bool(self.settings.gap_probability.clamp(0.0, 1.0)) {
            return None;
        }
        self.cycle += 1;

        let mut snapshot = Snapshot::new();
        for index in 0..self.device_ids.len() {
            if self.rng.gen_bool(self.settings.dropout_probability.clamp(0.0, 1.0)) {
                // Half the dropouts report the device with no packet
                if self.rng.gen_bool(0.5) {
                    snapshot.insert(self.device_ids[index].clone(), None);
                }
                continue;
            }
            let packet = self.make_packet(index);
            snapshot.insert(self.device_ids[index].clone(), Some(packet));
        }
        Some(snapshot)
    }

    fn is_more(&self) -> bool {
        self.more
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facade(settings: SimulationSettings) -> SimulatedFacade {
        SimulatedFacade::new(
            vec!["a".into(), "b".into(), "c".into()],
            "b",
            60,
            false,
            true,
            settings,
        )
    }

    fn offline(max_cycles: u64) -> SimulationSettings {
        SimulationSettings {
            dropout_probability: 0.0,
            max_cycles: Some(max_cycles),
            seed: Some(7),
            realtime: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_data_before_initialize() {
        let mut sim = facade(offline(3));
        assert!(sim.get_snapshot().is_none());
        assert!(!sim.is_more());
    }

    #[test]
    fn test_stream_ends_after_max_cycles() {
        let mut sim = facade(offline(3));
        assert!(sim.initialize());

        for _ in 0..3 {
            let snapshot = sim.get_snapshot().expect("snapshot");
            assert_eq!(snapshot.present_count(), 3);
        }
        assert!(sim.get_snapshot().is_none());
        assert!(!sim.is_more());
        assert_eq!(sim.cycles(), 3);
    }

    #[test]
    fn test_counters_increase_per_device() {
        let mut sim = facade(offline(2));
        sim.initialize();

        let first = sim.get_snapshot().unwrap();
        let second = sim.get_snapshot().unwrap();
        assert_eq!(first.get("a").unwrap().counter, 1);
        assert_eq!(second.get("a").unwrap().counter, 2);
    }

    #[test]
    fn test_fail_first_connects() {
        let mut sim = facade(SimulationSettings {
            fail_first_connects: 2,
            ..offline(1)
        });
        assert!(!sim.initialize());
        sim.cleanup();
        assert!(!sim.initialize());
        sim.cleanup();
        assert!(sim.initialize());
    }

    #[test]
    fn test_full_dropout_yields_empty_rows() {
        let mut sim = facade(SimulationSettings {
            dropout_probability: 1.0,
            ..offline(1)
        });
        sim.initialize();

        let snapshot = sim.get_snapshot().unwrap();
        assert_eq!(snapshot.present_count(), 0);
    }

    #[test]
    fn test_cleanup_ends_stream() {
        let mut sim = facade(offline(10));
        sim.initialize();
        sim.cleanup();
        assert!(!sim.is_more());
        assert!(sim.get_snapshot().is_none());
    }
}
