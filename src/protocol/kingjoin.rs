// src/protocol/kingjoin.rs
//
// KingJoin UHF reader descriptor.
// The reader pushes tag reads on its own (direct auto-read). Each frame is
// 20 bytes: `CC FFFF 10 32 0D`, 13 payload bytes and a trailing checksum.

use super::{Frame, ReadMode, ReaderProtocol};

/// Bytes per KingJoin auto-read frame
pub const KINGJOIN_FRAME_LENGTH: usize = 20;

/// First byte of every KingJoin frame
pub const KINGJOIN_HEADER: u8 = 0xCC;

#[derive(Debug, Clone, Default)]
pub struct KingJoinProtocol {
    received: Option<Frame>,
}

impl KingJoinProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the frame starts with the KingJoin header byte
    pub fn has_header(frame: &Frame) -> bool {
        frame.bytes().first() == Some(&KINGJOIN_HEADER)
    }
}

impl ReaderProtocol for KingJoinProtocol {
    fn name(&self) -> &str {
        "KingJoin"
    }

    fn frame_length(&self) -> usize {
        KINGJOIN_FRAME_LENGTH
    }

    fn read_mode(&self) -> ReadMode {
        ReadMode::Direct
    }

    fn receive_frame(&mut self, frame: Frame) {
        self.received = Some(frame);
    }

    fn received_frame(&self) -> Option<&Frame> {
        self.received.as_ref()
    }
}
