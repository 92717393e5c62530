/// Session - the acquire → assemble → encode → send pump
///
/// # State Machine
///
/// ```text
/// Connecting ──initialize() ok──▶ Streaming ──stream ended / stop──▶ Draining ──▶ Closed
///     │  ▲                            │                                  ▲
///     └──┘ fail: cleanup + backoff    └──── fatal error ─────────────────┘
/// ```
///
/// Draining runs `cleanup()`, `close()` and the transport close exactly
/// once on every exit path, including a panic unwinding through the pump.
use std::fmt;
use std::time::Duration;

use crate::assembler::SnapshotAssembler;
use crate::codec::FrameCodec;
use crate::contracts::Snapshot;
use crate::errors::{Result, StreamError};
use crate::facade::SensorFacade;
use crate::retry::{ConnectAttempts, RetryPolicy};
use crate::stop::StopSignal;
use crate::transmitter::FrameSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Draining,
    Closed,
}

/// How Streaming was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The facade reported no more data
    StreamEnded,
    /// A stop request was observed at a cycle boundary
    Stopped,
}

/// Per-run counters, logged at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub connect_attempts: u32,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub gaps: u64,
    pub exit: Option<ExitReason>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames ({} bytes) sent, {} empty cycles, {} connect attempts",
            self.frames_sent, self.bytes_sent, self.gaps, self.connect_attempts
        )
    }
}

/// Pump settings that are not part of the wire contract
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub retry: RetryPolicy,
    /// Pause after an empty cycle while the stream continues
    pub gap_pause: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            gap_pause: Duration::from_micros(crate::DEFAULT_GAP_PAUSE_US),
        }
    }
}

pub struct Session<F: SensorFacade, T: FrameSink> {
    facade: F,
    transport: T,
    assembler: SnapshotAssembler,
    codec: FrameCodec,
    stop: StopSignal,
    options: SessionOptions,
    state: StreamState,
    summary: RunSummary,
}

impl<F: SensorFacade, T: FrameSink> Session<F, T> {
    pub fn new(
        facade: F,
        transport: T,
        assembler: SnapshotAssembler,
        codec: FrameCodec,
        stop: StopSignal,
        options: SessionOptions,
    ) -> Self {
        Self {
            facade,
            transport,
            assembler,
            codec,
            stop,
            options,
            state: StreamState::Connecting,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Drive the session to `Closed`.
    ///
    /// # Errors
    /// `ConnectRetriesExhausted` if the facade never initialises, or the
    /// first fatal transport/framing error hit while streaming. Resources
    /// are released before the error is returned.
    pub fn run(mut self) -> Result<RunSummary> {
        let outcome = match self.connect() {
            Ok(true) => self.stream(),
            Ok(false) => Ok(ExitReason::Stopped),
            Err(e) => Err(e),
        };

        self.finish(outcome)
    }

    /// Drain, then log the counters whether the run succeeded or not.
    fn finish(&mut self, outcome: Result<ExitReason>) -> Result<RunSummary> {
        match &outcome {
            Ok(exit) => log::info!("Leaving stream: {:?}", exit),
            Err(e) => log::error!("Stream aborted: {}", e),
        }
        self.drain();

        if let Ok(exit) = &outcome {
            self.summary.exit = Some(*exit);
        }
        log::info!("Run summary: {}", self.summary);
        outcome.map(|_| self.summary)
    }

    /// Connecting: bounded retries with cleanup and backoff between attempts.
    ///
    /// Returns `Ok(false)` if a stop was requested before a connection was
    /// established.
    fn connect(&mut self) -> Result<bool> {
        self.state = StreamState::Connecting;
        let mut attempts = ConnectAttempts::new(self.options.retry);

        loop {
            if self.stop.is_requested() {
                log::info!("Stop requested while connecting");
                return Ok(false);
            }

            let attempt = attempts.begin();
            self.summary.connect_attempts = attempt;
            log::info!("Initializing sensor network (attempt {})", attempt);

            if self.facade.initialize() {
                log::info!("Sensor network ready after {} attempt(s)", attempt);
                return Ok(true);
            }

            self.facade.cleanup();
            if attempts.is_exhausted() {
                return Err(StreamError::ConnectRetriesExhausted { attempts: attempt });
            }

            let delay = attempts.next_delay();
            log::warn!("Initialization failed, retrying in {:?}", delay);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }

    /// Streaming: one snapshot per cycle until the stream ends or a stop
    /// is observed between cycles.
    fn stream(&mut self) -> Result<ExitReason> {
        self.state = StreamState::Streaming;
        log::info!(
            "Streaming {} trackers, {} byte frames",
            self.assembler.registry().len(),
            self.codec.frame_len()
        );

        loop {
            if self.stop.is_requested() {
                return Ok(ExitReason::Stopped);
            }

            match self.facade.get_snapshot() {
                Some(snapshot) => self.pump_cycle(&snapshot)?,
                None if self.facade.is_more() => {
                    self.summary.gaps += 1;
                    log::trace!("No snapshot this cycle");
                    if !self.options.gap_pause.is_zero() {
                        std::thread::sleep(self.options.gap_pause);
                    }
                }
                None => return Ok(ExitReason::StreamEnded),
            }
        }
    }

    fn pump_cycle(&mut self, snapshot: &Snapshot) -> Result<()> {
        let matrices = self.assembler.assemble(snapshot);
        let frame = self.codec.encode(&matrices)?;
        let sent = self.transport.send_frame(&frame)?;

        self.summary.frames_sent += 1;
        self.summary.bytes_sent += sent as u64;
        log::debug!("Sent counters {:?}", matrices.counter.as_slice().unwrap_or_default());
        Ok(())
    }

    /// Draining → Closed. Idempotent; only the first call releases anything.
    fn drain(&mut self) {
        if matches!(self.state, StreamState::Draining | StreamState::Closed) {
            return;
        }
        self.state = StreamState::Draining;
        self.facade.cleanup();
        self.facade.close();
        self.transport.close();
        self.state = StreamState::Closed;
        log::info!("Session closed");
    }
}

impl<F: SensorFacade, T: FrameSink> Drop for Session<F, T> {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::SensorPacket;
    use crate::registry::DeviceRegistry;
    use crate::codec::FrameLayout;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Calls {
        initialize: u32,
        cleanup: u32,
        close: u32,
    }

    struct ScriptedFacade {
        init_results: VecDeque<bool>,
        snapshots: VecDeque<Option<Snapshot>>,
        calls: Calls,
    }

    impl SensorFacade for ScriptedFacade {
        fn initialize(&mut self) -> bool {
            self.calls.initialize += 1;
            self.init_results.pop_front().unwrap_or(true)
        }
        fn cleanup(&mut self) {
            self.calls.cleanup += 1;
        }
        fn close(&mut self) {
            self.calls.close += 1;
        }
        fn get_snapshot(&mut self) -> Option<Snapshot> {
            self.snapshots.pop_front().flatten()
        }
        fn is_more(&self) -> bool {
            !self.snapshots.is_empty()
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: Vec<Vec<u8>>,
        closes: u32,
    }

    impl FrameSink for CountingSink {
        fn send_frame(&mut self, frame: &[u8]) -> Result<usize> {
            self.frames.push(frame.to_vec());
            Ok(frame.len())
        }
        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new().with(
            "a",
            Some(SensorPacket::new([1.0; 3], [2.0; 3], [3.0; 3], 10, 0.1, 1)),
        )
    }

    fn session(
        init_results: Vec<bool>,
        snapshots: Vec<Option<Snapshot>>,
        max_attempts: u32,
    ) -> Session<ScriptedFacade, CountingSink> {
        let registry = DeviceRegistry::assign(["a", "b"]);
        Session::new(
            ScriptedFacade {
                init_results: init_results.into(),
                snapshots: snapshots.into(),
                calls: Calls::default(),
            },
            CountingSink::default(),
            SnapshotAssembler::new(registry, false),
            FrameCodec::new(FrameLayout::new(2, false, true)),
            StopSignal::new(),
            SessionOptions {
                retry: RetryPolicy::immediate(max_attempts),
                gap_pause: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_states_progress_to_closed() {
        let mut s = session(vec![true], vec![Some(snapshot()), None, Some(snapshot())], 1);
        assert_eq!(s.state(), StreamState::Connecting);

        assert!(s.connect().unwrap());
        assert_eq!(s.stream().unwrap(), ExitReason::StreamEnded);
        assert_eq!(s.state(), StreamState::Streaming);
        assert_eq!(s.transport.frames.len(), 2);
        assert_eq!(s.summary().gaps, 1);

        s.drain();
        s.drain();
        assert_eq!(s.state(), StreamState::Closed);
        assert_eq!(s.facade.calls.cleanup, 1);
        assert_eq!(s.facade.calls.close, 1);
        assert_eq!(s.transport.closes, 1);
    }

    #[test]
    fn test_connect_gives_up_after_bound() {
        let mut s = session(vec![false; 5], vec![], 3);

        let err = s.connect().unwrap_err();
        assert!(matches!(err, StreamError::ConnectRetriesExhausted { attempts: 3 }));
        assert_eq!(s.facade.calls.initialize, 3);
        assert_eq!(s.facade.calls.cleanup, 3);
        assert!(s.transport.frames.is_empty());
    }

    #[test]
    fn test_stop_before_connect() {
        let mut s = session(vec![true], vec![Some(snapshot())], 1);
        s.stop.request(crate::stop::StopTrigger::Command);

        assert!(!s.connect().unwrap());
        assert_eq!(s.facade.calls.initialize, 0);
    }

    #[test]
    fn test_failed_run_keeps_counters() {
        let mut s = session(vec![false, false], vec![], 2);
        let outcome = s.connect().map(|_| ExitReason::Stopped);

        assert!(s.finish(outcome).is_err());
        assert_eq!(s.state(), StreamState::Closed);
        assert_eq!(s.summary().connect_attempts, 2);
        assert_eq!(s.summary().exit, None);
        assert_eq!(
            s.summary().to_string(),
            "0 frames (0 bytes) sent, 0 empty cycles, 2 connect attempts"
        );
    }

    #[test]
    fn test_frames_have_constant_length() {
        let mut s = session(vec![true], vec![Some(snapshot()), Some(Snapshot::new())], 1);
        s.connect().unwrap();
        s.stream().unwrap();

        assert!(s.transport.frames.iter().all(|f| f.len() == 80));
    }
}
