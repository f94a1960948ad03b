// src/io/serial/assembler.rs
//
// Fixed-length frame assembly and the per-connection read loop.
//
// Bytes are pulled one at a time from an open link and stored in a buffer
// sized by the reader protocol. A frame is published only when a single
// unbroken run of available bytes fills the buffer; a gap in availability
// discards the partial frame. Frames are all-or-nothing, never padded.
//
// Decoding and logging of a published frame run inline on the worker thread,
// so a slow consumer throttles the reader. At serial data rates this is fine.

use std::time::Duration;

use super::connection::SerialLink;
use super::utils::is_timeout;
use crate::error::AcquisitionError;
use crate::io::{now_us, ConnectionState, StopSignal};
use crate::logging::{LogSink, Severity};
use crate::protocol::{Frame, ReadMode, ReaderProtocol};

/// Pause between polls when no byte is waiting
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Frame Assembler
// ============================================================================

/// Accumulates bytes into fixed-length frames.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_length: usize,
    buffer: Vec<u8>,
    fill: usize,
}

impl FrameAssembler {
    pub fn new(frame_length: usize) -> Self {
        Self {
            frame_length,
            buffer: vec![0; frame_length],
            fill: 0,
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Index the next byte will be stored at
    pub fn fill_index(&self) -> usize {
        self.fill
    }

    pub fn state(&self) -> ConnectionState {
        if self.fill == 0 {
            ConnectionState::Idle
        } else {
            ConnectionState::Filling(self.fill)
        }
    }

    /// Store one byte.
    ///
    /// Returns the completed frame when this byte fills the buffer and the
    /// link is still open. The fill index is back at zero whenever a frame
    /// completes, published or not, and a fresh buffer is allocated.
    pub fn push(&mut self, byte: u8, link_open: bool) -> Result<Option<Frame>, AcquisitionError> {
        let Some(slot) = self.buffer.get_mut(self.fill) else {
            return Err(AcquisitionError::ByteStorageFault {
                index: self.fill,
                frame_length: self.frame_length,
            });
        };
        *slot = byte;

        if self.fill + 1 < self.frame_length {
            self.fill += 1;
            return Ok(None);
        }

        self.fill = 0;
        let bytes = std::mem::replace(&mut self.buffer, vec![0; self.frame_length]);
        if !link_open {
            return Ok(None);
        }
        Ok(Some(Frame::new(bytes, now_us())))
    }

    /// Byte availability was interrupted. Drops any partial frame and
    /// returns how many bytes were discarded.
    pub fn interrupt(&mut self) -> usize {
        let discarded = self.fill;
        self.fill = 0;
        discarded
    }
}

/// Strip separator characters from a rendered frame for the hex diagnostic
pub fn hex_diagnostic(rendered: &str) -> String {
    rendered
        .chars()
        .filter(|c| !matches!(c, '-' | ':') && !c.is_whitespace())
        .collect()
}

// ============================================================================
// Read Loop
// ============================================================================

/// Why the read loop returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop signal observed
    Stopped,
    /// Link is no longer open, reconnection is needed
    TransportLost,
}

/// Receives progress from the read loop
pub trait LoopObserver {
    fn on_state(&mut self, _state: ConnectionState) {}
    fn on_frame(&mut self, _frame: &Frame) {}
}

impl LoopObserver for () {}

/// Forwards state changes only when they differ from the last one sent
struct StateTracker<'a> {
    last: Option<ConnectionState>,
    observer: &'a mut dyn LoopObserver,
}

impl StateTracker<'_> {
    fn set(&mut self, state: ConnectionState) {
        if self.last != Some(state) {
            self.last = Some(state);
            self.observer.on_state(state);
        }
    }
}

/// Run the read loop on an open link until stop is requested or the link is lost.
///
/// Per-byte problems (storage faults, read errors) are logged and the byte is
/// skipped; nothing on this path unwinds out of the loop. The caller owns the
/// link and closes it when this returns.
pub fn run_read_loop(
    link: &mut dyn SerialLink,
    protocol: &mut dyn ReaderProtocol,
    stop: &StopSignal,
    log: &dyn LogSink,
    observer: &mut dyn LoopObserver,
) -> LoopExit {
    let mut assembler = FrameAssembler::new(protocol.frame_length());
    let mut mode_reported = false;
    let mut tracker = StateTracker {
        last: None,
        observer,
    };
    tracker.set(ConnectionState::Idle);

    loop {
        if stop.is_stopped() {
            return LoopExit::Stopped;
        }

        let mode = protocol.read_mode();
        if mode != ReadMode::Direct {
            if !mode_reported {
                log.log(
                    Severity::Warning,
                    &AcquisitionError::UnimplementedMode(mode).to_string(),
                );
                mode_reported = true;
            }
            stop.sleep(IDLE_POLL_INTERVAL);
            continue;
        }

        if !link.is_open() {
            log.log(
                Severity::Warning,
                &format!(
                    "Serial connection {} is not open, reconnecting",
                    link.port_name()
                ),
            );
            return LoopExit::TransportLost;
        }

        match link.bytes_to_read() {
            Ok(n) if n > 0 => {}
            Ok(_) => {
                let discarded = assembler.interrupt();
                if discarded > 0 {
                    log.log(
                        Severity::Debug,
                        &format!(
                            "Discarded partial frame ({} of {} bytes)",
                            discarded,
                            assembler.frame_length()
                        ),
                    );
                }
                tracker.set(ConnectionState::Idle);
                stop.sleep(IDLE_POLL_INTERVAL);
                continue;
            }
            Err(e) => {
                // A closed link is picked up at the top of the next iteration
                if link.is_open() {
                    log.log(
                        Severity::Warning,
                        &format!("Failed to query {}: {}", link.port_name(), e),
                    );
                    stop.sleep(IDLE_POLL_INTERVAL);
                }
                continue;
            }
        }

        let byte = match link.read_byte() {
            Ok(byte) => byte,
            Err(e) if is_timeout(&e) => {
                log.log(
                    Severity::Warning,
                    &format!("Read timed out on {}, byte skipped", link.port_name()),
                );
                continue;
            }
            Err(e) => {
                log.log(
                    Severity::Warning,
                    &format!("Read error on {}: {}", link.port_name(), e),
                );
                continue;
            }
        };

        match assembler.push(byte, link.is_open()) {
            Ok(Some(frame)) => {
                tracker.set(ConnectionState::FrameReady);
                publish_frame(frame, protocol, log, tracker.observer);
                tracker.set(ConnectionState::Idle);
            }
            Ok(None) => tracker.set(assembler.state()),
            Err(e) => log.log(Severity::Error, &e.to_string()),
        }
    }
}

/// Hand a completed frame to the protocol descriptor and downstream observers
fn publish_frame(
    frame: Frame,
    protocol: &mut dyn ReaderProtocol,
    log: &dyn LogSink,
    observer: &mut dyn LoopObserver,
) {
    protocol.receive_frame(frame.clone());
    log.log(
        Severity::Info,
        &format!("Received HEX: {}", hex_diagnostic(&protocol.render_frame())),
    );
    observer.on_frame(&frame);
}
