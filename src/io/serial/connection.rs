// src/io/serial/connection.rs
//
// Connection builder and the link abstraction used by the read loop.
//
// Two timeouts are in play and they are deliberately separate:
// - TRANSPORT_TIMEOUT bounds every read/write on an open port (fixed 500 ms).
// - ConnectionConfig::max_timeout is the pause between reopen attempts and
//   is only used by the reconnection supervisor.

use serialport::SerialPort;
use std::io::Read;
use std::time::Duration;

use super::resolver::list_port_names;
use super::utils::{
    is_timeout, line_label, to_serialport_data_bits, LINE_FLOW_CONTROL, LINE_PARITY,
    LINE_STOP_BITS,
};
use crate::error::AcquisitionError;
use crate::settings::ConnectionConfig;

/// Per-operation read/write timeout on an open port
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Traits
// ============================================================================

/// An exclusively owned byte channel to a reader.
pub trait SerialLink: Send {
    fn port_name(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Bytes waiting in the receive buffer
    fn bytes_to_read(&mut self) -> std::io::Result<usize>;

    /// Blocking read of exactly one byte, bounded by the transport timeout
    fn read_byte(&mut self) -> std::io::Result<u8>;

    /// Release the OS handle. Safe to call more than once.
    fn close(&mut self);
}

/// Opens links. The reconnection supervisor holds one of these.
pub trait Connector: Send {
    /// Device identifiers exposed by the host, for port auto-selection
    fn available_ports(&self) -> Result<Vec<String>, String>;

    fn open(
        &mut self,
        port: &str,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn SerialLink>, AcquisitionError>;
}

// ============================================================================
// Native serial port
// ============================================================================

/// Link backed by an OS serial port
pub struct NativeLink {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl NativeLink {
    fn not_connected(&self) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            format!("{} is closed", self.port_name),
        )
    }
}

impl SerialLink for NativeLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_to_read(&mut self) -> std::io::Result<usize> {
        let result = match self.port.as_ref() {
            Some(port) => port.bytes_to_read(),
            None => return Err(self.not_connected()),
        };
        match result {
            Ok(n) => Ok(n as usize),
            Err(e) => {
                // Device unplugged or handle invalidated
                self.close();
                Err(std::io::Error::from(e))
            }
        }
    }

    fn read_byte(&mut self) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        let result = match self.port.as_mut() {
            Some(port) => port.read(&mut buf),
            None => return Err(self.not_connected()),
        };
        match result {
            Ok(1) => Ok(buf[0]),
            Ok(_) => {
                // EOF - port closed/disconnected
                self.close();
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} disconnected", self.port_name),
                ))
            }
            Err(e) if is_timeout(&e) => Err(e),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        // Dropping the boxed port releases the OS handle
        self.port = None;
    }
}

/// Open a serial port with the fixed line settings.
///
/// No parity, one stop bit, DTR and RTS asserted, 500 ms read/write timeout.
/// The handle is released on every error path.
pub fn build_connection(
    port_name: &str,
    config: &ConnectionConfig,
) -> Result<NativeLink, AcquisitionError> {
    let data_bits =
        to_serialport_data_bits(config.data_bits()).map_err(AcquisitionError::InvalidConfig)?;

    let unavailable = |e: serialport::Error| AcquisitionError::TransportUnavailable {
        port: port_name.to_string(),
        reason: e.to_string(),
    };

    let mut port = serialport::new(port_name, config.baud_rate())
        .data_bits(data_bits)
        .parity(LINE_PARITY)
        .stop_bits(LINE_STOP_BITS)
        .flow_control(LINE_FLOW_CONTROL)
        .timeout(TRANSPORT_TIMEOUT)
        .open()
        .map_err(unavailable)?;

    // On failure `port` is dropped here, which closes it
    port.write_data_terminal_ready(true).map_err(unavailable)?;
    port.write_request_to_send(true).map_err(unavailable)?;

    crate::tlog!(
        "[Serial] Opened {} at {} (DTR/RTS on, timeout {} ms)",
        port_name,
        line_label(config.baud_rate(), config.data_bits()),
        TRANSPORT_TIMEOUT.as_millis()
    );

    Ok(NativeLink {
        port_name: port_name.to_string(),
        port: Some(port),
    })
}

/// Connector for real hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConnector;

impl Connector for NativeConnector {
    fn available_ports(&self) -> Result<Vec<String>, String> {
        list_port_names()
    }

    fn open(
        &mut self,
        port: &str,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn SerialLink>, AcquisitionError> {
        build_connection(port, config).map(|link| Box::new(link) as Box<dyn SerialLink>)
    }
}
