// src/error.rs
//
// Error taxonomy for serial acquisition.

use thiserror::Error;

use crate::protocol::ReadMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    /// Device could not be opened or went away. Recoverable through reconnection.
    #[error("serial port {port} unavailable: {reason}")]
    TransportUnavailable { port: String, reason: String },

    /// Byte arrived with the fill index outside the frame buffer. The byte is dropped.
    #[error("cannot store byte at index {index} of a {frame_length}-byte frame")]
    ByteStorageFault { index: usize, frame_length: usize },

    /// Configured read mode is declared but not implemented
    #[error("read mode {0} is not implemented")]
    UnimplementedMode(ReadMode),

    /// Reconnection gave up
    #[error("serial port {port} could not be opened after {attempts} attempts")]
    RetriesExhausted { port: String, attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stop was requested while an operation was in progress
    #[error("acquisition stopped")]
    Stopped,

    /// The acquisition worker panicked or was cancelled
    #[error("acquisition worker ended abnormally: {0}")]
    WorkerAborted(String),
}

impl AcquisitionError {
    /// Whether this error ends the acquisition pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcquisitionError::RetriesExhausted { .. }
                | AcquisitionError::InvalidConfig(_)
                | AcquisitionError::WorkerAborted(_)
        )
    }
}
