/// Stop module - stop signal shared between the pump and its listener tasks
///
/// The pump only reads the flag at cycle boundaries; listeners only set it.
/// A blocked facade call is never interrupted, the next cycle is simply
/// not started.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Words accepted on the command input as a stop request.
pub const STOP_COMMANDS: [&str; 4] = ["stop", "q", "quit", "exit"];

/// Why the stop was requested, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Interrupt,
    Command,
}

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, trigger: StopTrigger) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            log::info!("Stop requested ({:?}), finishing current cycle", trigger);
        }
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Wait for Ctrl-C and request a stop.
pub async fn watch_interrupt(stop: StopSignal) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => stop.request(StopTrigger::Interrupt),
        Err(e) => log::warn!("Unable to listen for Ctrl-C: {}", e),
    }
}

/// Read command lines until a stop word arrives.
///
/// Returns `true` if a stop was requested, `false` if the input closed
/// first. A closed input (e.g. running detached) never stops the stream.
pub async fn watch_commands<R>(reader: R, stop: StopSignal) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let command = line.trim().to_ascii_lowercase();
                if STOP_COMMANDS.contains(&command.as_str()) {
                    stop.request(StopTrigger::Command);
                    return true;
                }
                if !command.is_empty() {
                    log::warn!("Unknown command {:?}, type 'stop' to end streaming", command);
                }
            }
            Ok(None) => {
                log::debug!("Command input closed");
                return false;
            }
            Err(e) => {
                log::warn!("Command input error: {}", e);
                return false;
            }
        }
    }
}
