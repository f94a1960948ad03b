// src/io/serial/simulated.rs
//
// Simulation mode: a link that replays a fixed payload as one unbroken burst,
// then stays quiet for an interval. Lets the full acquisition pipeline run
// without a reader attached.

use std::time::{Duration, Instant};

use super::connection::{Connector, SerialLink};
use crate::error::AcquisitionError;
use crate::settings::ConnectionConfig;

pub const SIMULATED_PORT: &str = "simulated";

pub struct SimulatedLink {
    port_name: String,
    payload: Vec<u8>,
    interval: Duration,
    cursor: usize,
    next_burst: Instant,
    open: bool,
}

impl SimulatedLink {
    pub fn new(port_name: impl Into<String>, payload: Vec<u8>, interval: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            payload,
            interval,
            cursor: 0,
            next_burst: Instant::now(),
            open: true,
        }
    }
}

impl SerialLink for SimulatedLink {
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
        if self.cursor < self.payload.len() {
            return Ok(self.payload.len() - self.cursor);
        }
        if Instant::now() >= self.next_burst {
            self.cursor = 0;
            return Ok(self.payload.len());
        }
        Ok(0)
    }

    fn read_byte(&mut self) -> std::io::Result<u8> {
        if !self.open {
            return Err(std::io::ErrorKind::NotConnected.into());
        }
        let Some(&byte) = self.payload.get(self.cursor) else {
            return Err(std::io::ErrorKind::TimedOut.into());
        };
        self.cursor += 1;
        if self.cursor == self.payload.len() {
            self.next_burst = Instant::now() + self.interval;
        }
        Ok(byte)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Connector that always succeeds with a `SimulatedLink`
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    payload: Vec<u8>,
    interval: Duration,
}

impl SimulatedConnector {
    pub fn new(payload: Vec<u8>, interval: Duration) -> Self {
        Self { payload, interval }
    }

    /// Reject a payload that cannot be cut into whole frames. The trailing
    /// partial frame would be discarded on every burst and nothing would
    /// ever be published.
    pub fn check_frame_length(&self, frame_length: usize) -> Result<(), String> {
        if frame_length == 0 || self.payload.len() % frame_length != 0 {
            return Err(format!(
                "Simulation payload is {} bytes, not a whole number of {}-byte frames",
                self.payload.len(),
                frame_length
            ));
        }
        Ok(())
    }
}

impl Connector for SimulatedConnector {
    fn available_ports(&self) -> Result<Vec<String>, String> {
        Ok(vec![SIMULATED_PORT.to_string()])
    }

    fn open(
        &mut self,
        port: &str,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn SerialLink>, AcquisitionError> {
        crate::tlog!(
            "[Serial] Simulation mode: replaying {} bytes on {} every {} ms",
            self.payload.len(),
            port,
            self.interval.as_millis()
        );
        Ok(Box::new(SimulatedLink::new(
            port,
            self.payload.clone(),
            self.interval,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::assembler::run_read_loop;
    use crate::io::serial::testing::RecordingObserver;
    use crate::io::StopSignal;
    use crate::logging::testing::RecordingSink;
    use crate::logging::Severity;
    use crate::protocol::{KingJoinProtocol, ReaderProtocol, KINGJOIN_FRAME_LENGTH};
    use crate::settings::DEFAULT_SIMULATION_PAYLOAD;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("auto", 57600, 8, 0, Duration::ZERO, true).unwrap()
    }

    #[test]
    fn test_simulated_payload_published() {
        let payload = hex::decode(DEFAULT_SIMULATION_PAYLOAD).unwrap();
        let mut connector = SimulatedConnector::new(payload.clone(), Duration::from_millis(40));
        connector.check_frame_length(KINGJOIN_FRAME_LENGTH).unwrap();
        let mut link = connector.open(SIMULATED_PORT, &config()).unwrap();

        let mut protocol = KingJoinProtocol::new();
        let stop = StopSignal::new();
        let sink = RecordingSink::default();
        let mut observer = RecordingObserver::default();

        let stopper = stop.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            stopper.stop();
        });
        run_read_loop(link.as_mut(), &mut protocol, &stop, &sink, &mut observer);
        handle.join().unwrap();

        // One burst immediately, then one per interval
        assert!(observer.frames.len() >= 2, "got {} frames", observer.frames.len());
        assert!(observer.frames.len() <= 5, "got {} frames", observer.frames.len());
        assert!(observer.frames.iter().all(|f| f.bytes() == payload.as_slice()));
        assert_eq!(protocol.received_frame().unwrap().bytes(), payload.as_slice());
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn test_payload_must_fill_whole_frames() {
        let connector = SimulatedConnector::new(vec![0xCC, 0x01, 0x02], Duration::ZERO);
        let err = connector
            .check_frame_length(KINGJOIN_FRAME_LENGTH)
            .unwrap_err();
        assert!(err.contains("3 bytes"));

        let two_frames = SimulatedConnector::new(vec![0; 40], Duration::ZERO);
        assert!(two_frames.check_frame_length(KINGJOIN_FRAME_LENGTH).is_ok());
        assert!(two_frames.check_frame_length(0).is_err());
    }

    #[test]
    fn test_burst_then_quiet() {
        let mut link = SimulatedLink::new("sim", vec![1, 2, 3], Duration::from_secs(60));
        assert_eq!(link.bytes_to_read().unwrap(), 3);
        assert_eq!(link.read_byte().unwrap(), 1);
        assert_eq!(link.bytes_to_read().unwrap(), 2);
        assert_eq!(link.read_byte().unwrap(), 2);
        assert_eq!(link.read_byte().unwrap(), 3);
        assert_eq!(link.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_burst_repeats_after_interval() {
        let mut link = SimulatedLink::new("sim", vec![7, 8], Duration::ZERO);
        link.read_byte().unwrap();
        link.read_byte().unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 2);
        assert_eq!(link.read_byte().unwrap(), 7);
    }

    #[test]
    fn test_closed_link() {
        let mut link = SimulatedLink::new("sim", vec![1], Duration::ZERO);
        link.close();
        assert!(!link.is_open());
        assert!(link.bytes_to_read().is_err());
        assert!(link.read_byte().is_err());
    }
}
