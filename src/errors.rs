/// Error types for the IMU relay pipeline
///
/// One enum covers every failure the pump can observe, from socket errors
/// through frame-length violations to an uninitialisable sensor network.
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Relay error enumeration
///
/// Only `Transport`, `FrameLengthMismatch` and `ConnectRetriesExhausted`
/// end a streaming run; gaps in the snapshot stream are not errors at all.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Socket send/receive failure (fatal for the run)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Received or decoded buffer does not match the configured frame layout
    #[error("Frame length mismatch: expected {expected} bytes, received {received}")]
    FrameLengthMismatch { expected: usize, received: usize },

    /// Channel matrix shape disagrees with the frame layout
    #[error("Layout mismatch in {channel}: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        channel: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Frame would not fit in a single UDP datagram
    #[error("Payload too large: {required} bytes, limit {available}")]
    PayloadTooLarge { required: usize, available: usize },

    /// Sensor facade never initialised within the retry bound
    #[error("Sensor network failed to initialize after {attempts} attempts")]
    ConnectRetriesExhausted { attempts: u32 },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Local I/O failure outside the datagram path (config files, binding)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Async runtime or task failure
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl StreamError {
    /// Whether this error must stop a streaming run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::FrameLengthMismatch { .. }
                | Self::PayloadTooLarge { .. }
                | Self::ConnectRetriesExhausted { .. }
                | Self::LayoutMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = StreamError::FrameLengthMismatch { expected: 200, received: 180 };
        assert_eq!(
            err.to_string(),
            "Frame length mismatch: expected 200 bytes, received 180"
        );

        let err = StreamError::ConnectRetriesExhausted { attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StreamError::Transport("closed".into()).is_fatal());
        assert!(StreamError::FrameLengthMismatch { expected: 1, received: 2 }.is_fatal());
        assert!(!StreamError::Config("bad".into()).is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StreamError = io.into();
        assert!(matches!(err, StreamError::Io(_)));
    }
}
