// src/protocol/mod.rs
//
// Reader protocol descriptors.
// A descriptor declares how many bytes make up one frame for a reader model,
// which read mode the model uses, and how a received frame is rendered.

mod kingjoin;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::ProtocolSettings;

pub use kingjoin::{KingJoinProtocol, KINGJOIN_FRAME_LENGTH};

// ============================================================================
// Types
// ============================================================================

/// How bytes are obtained from the reader
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Reader streams frames on its own, bytes are consumed as they arrive
    Direct,
    /// Command/response exchange with the reader. Declared but not implemented.
    Negotiated,
}

impl Default for ReadMode {
    fn default() -> Self {
        ReadMode::Direct
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Direct => f.write_str("direct"),
            ReadMode::Negotiated => f.write_str("negotiated"),
        }
    }
}

/// One complete frame read from the serial link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    /// Completion time, microseconds since the Unix epoch
    timestamp_us: u64,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, timestamp_us: u64) -> Self {
        Self { bytes, timestamp_us }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Upper-case hex without separators
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Render bytes as upper-case hex octets joined with `-` (e.g. `CC-FF-10`)
pub fn render_octets(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Descriptor contract
// ============================================================================

/// Capability record for a reader model.
///
/// Selected once at startup and owned by the acquisition worker. The worker
/// writes each completed frame into the descriptor with `receive_frame` and
/// asks it for a human-readable rendering for diagnostics.
pub trait ReaderProtocol: Send {
    /// Reader model name, used in log lines
    fn name(&self) -> &str;

    /// Number of bytes in one complete frame
    fn frame_length(&self) -> usize;

    fn read_mode(&self) -> ReadMode;

    /// Store the most recently completed frame
    fn receive_frame(&mut self, frame: Frame);

    fn received_frame(&self) -> Option<&Frame>;

    /// Human-readable view of the last received frame. Empty when nothing was received.
    fn render_frame(&self) -> String {
        self.received_frame()
            .map(|frame| render_octets(frame.bytes()))
            .unwrap_or_default()
    }
}

/// Descriptor for reader models that only differ by frame length and read mode
#[derive(Debug, Clone)]
pub struct FixedLengthProtocol {
    name: String,
    frame_length: usize,
    read_mode: ReadMode,
    received: Option<Frame>,
}

impl FixedLengthProtocol {
    pub fn new(name: impl Into<String>, frame_length: usize, read_mode: ReadMode) -> Self {
        Self {
            name: name.into(),
            frame_length,
            read_mode,
            received: None,
        }
    }
}

impl ReaderProtocol for FixedLengthProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    fn receive_frame(&mut self, frame: Frame) {
        self.received = Some(frame);
    }

    fn received_frame(&self) -> Option<&Frame> {
        self.received.as_ref()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Build the descriptor for the configured reader model
pub fn protocol_for_settings(
    settings: &ProtocolSettings,
) -> Result<Box<dyn ReaderProtocol>, String> {
    match settings.model.to_lowercase().as_str() {
        "kingjoin" | "king_join" => Ok(Box::new(KingJoinProtocol::new())),
        "fixed" => {
            let frame_length = settings
                .frame_length
                .ok_or("Protocol model 'fixed' requires frame_length")?;
            if frame_length == 0 {
                return Err("Protocol frame_length must be at least 1".to_string());
            }
            Ok(Box::new(FixedLengthProtocol::new(
                settings.name.clone().unwrap_or_else(|| "fixed".to_string()),
                frame_length,
                settings.read_mode,
            )))
        }
        other => Err(format!("Unknown reader protocol model: {}", other)),
    }
}
