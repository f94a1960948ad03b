// src/io/serial/testing.rs
//
// Scripted links and connectors for exercising the acquisition engine
// without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use super::assembler::LoopObserver;
use super::connection::{Connector, SerialLink};
use crate::error::AcquisitionError;
use crate::io::{ConnectionState, StopSignal};
use crate::protocol::Frame;
use crate::settings::ConnectionConfig;

/// One step of line activity
#[derive(Clone, Debug)]
pub enum Step {
    /// Bytes that arrive as one unbroken run
    Burst(Vec<u8>),
    /// Bytes that arrive, then the device disappears right after the last one
    BurstThenClose(Vec<u8>),
    /// One poll that finds no bytes waiting
    Gap,
    /// The device disappears
    Close,
    /// Bytes are reported waiting but the read fails
    ReadError(std::io::ErrorKind),
}

/// Link that plays back a script. When the script runs out it raises `stop`
/// (if given) and reports an idle line.
pub struct ScriptedLink {
    port_name: String,
    steps: VecDeque<Step>,
    open: bool,
    closed_flag: Arc<AtomicBool>,
    stop_when_done: Option<StopSignal>,
}

impl ScriptedLink {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            port_name: "/dev/scripted".to_string(),
            steps: steps.into(),
            open: true,
            closed_flag: Arc::new(AtomicBool::new(false)),
            stop_when_done: None,
        }
    }

    pub fn stop_when_done(mut self, stop: StopSignal) -> Self {
        self.stop_when_done = Some(stop);
        self
    }

    /// Flag set once `close()` has been called
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed_flag.clone()
    }

    fn script_done(&self) {
        if let Some(stop) = &self.stop_when_done {
            stop.stop();
        }
    }
}

impl SerialLink for ScriptedLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bytes_to_read(&mut self) -> std::io::Result<usize> {
        if !self.open {
            return Err(std::io::ErrorKind::NotConnected.into());
        }
        match self.steps.front() {
            Some(Step::Burst(bytes)) | Some(Step::BurstThenClose(bytes)) => Ok(bytes.len()),
            Some(Step::ReadError(_)) => Ok(1),
            Some(Step::Gap) => {
                self.steps.pop_front();
                Ok(0)
            }
            Some(Step::Close) => {
                self.steps.pop_front();
                self.open = false;
                Err(std::io::ErrorKind::BrokenPipe.into())
            }
            None => {
                self.script_done();
                Ok(0)
            }
        }
    }

    fn read_byte(&mut self) -> std::io::Result<u8> {
        if !self.open {
            return Err(std::io::ErrorKind::NotConnected.into());
        }
        let (byte, exhausted, close_after) = match self.steps.front_mut() {
            Some(Step::Burst(bytes)) if !bytes.is_empty() => {
                let b = bytes.remove(0);
                (b, bytes.is_empty(), false)
            }
            Some(Step::BurstThenClose(bytes)) if !bytes.is_empty() => {
                let b = bytes.remove(0);
                let done = bytes.is_empty();
                (b, done, done)
            }
            Some(Step::ReadError(kind)) => {
                let kind = *kind;
                self.steps.pop_front();
                return Err(kind.into());
            }
            _ => return Err(std::io::ErrorKind::TimedOut.into()),
        };
        if exhausted {
            self.steps.pop_front();
        }
        if close_after {
            self.open = false;
        }
        Ok(byte)
    }

    fn close(&mut self) {
        self.open = false;
        self.closed_flag.store(true, Ordering::SeqCst);
    }
}

/// Connector whose open attempts follow a script: `None` fails, `Some(steps)`
/// opens a `ScriptedLink`. Attempts past the end of the script fail.
pub struct ScriptedConnector {
    outcomes: VecDeque<Option<Vec<Step>>>,
    attempts: Arc<AtomicU32>,
    ports: Vec<String>,
    stop_when_done: Option<StopSignal>,
    opened_ports: Arc<Mutex<Vec<String>>>,
    closed_flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl ScriptedConnector {
    pub fn new(outcomes: Vec<Option<Vec<Step>>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            attempts: Arc::new(AtomicU32::new(0)),
            ports: vec!["/dev/ttyS0".to_string(), "/dev/cu.usbserial-A1".to_string()],
            stop_when_done: None,
            opened_ports: Arc::new(Mutex::new(Vec::new())),
            closed_flags: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn stop_when_done(mut self, stop: StopSignal) -> Self {
        self.stop_when_done = Some(stop);
        self
    }

    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }

    pub fn opened_ports(&self) -> Arc<Mutex<Vec<String>>> {
        self.opened_ports.clone()
    }

    /// One close flag per link handed out, in open order
    pub fn closed_flags(&self) -> Arc<Mutex<Vec<Arc<AtomicBool>>>> {
        self.closed_flags.clone()
    }
}

impl Connector for ScriptedConnector {
    fn available_ports(&self) -> Result<Vec<String>, String> {
        Ok(self.ports.clone())
    }

    fn open(
        &mut self,
        port: &str,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn SerialLink>, AcquisitionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut opened) = self.opened_ports.lock() {
            opened.push(port.to_string());
        }
        match self.outcomes.pop_front() {
            Some(Some(steps)) => {
                let mut link = ScriptedLink::new(steps);
                if let Some(stop) = &self.stop_when_done {
                    link = link.stop_when_done(stop.clone());
                }
                if let Ok(mut flags) = self.closed_flags.lock() {
                    flags.push(link.closed_flag());
                }
                Ok(Box::new(link))
            }
            _ => Err(AcquisitionError::TransportUnavailable {
                port: port.to_string(),
                reason: "No such file or directory".to_string(),
            }),
        }
    }
}

/// Observer that records everything the read loop reports
#[derive(Default)]
pub struct RecordingObserver {
    pub frames: Vec<Frame>,
    pub states: Vec<ConnectionState>,
}

impl LoopObserver for RecordingObserver {
    fn on_state(&mut self, state: ConnectionState) {
        self.states.push(state);
    }

    fn on_frame(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }
}
