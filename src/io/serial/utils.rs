// src/io/serial/utils.rs
//
// Shared helpers for the serialport crate: fixed line settings and
// conversions from configuration values.

use serialport::{DataBits, FlowControl, Parity, StopBits};

// ============================================================================
// Fixed line settings
// ============================================================================

pub const LINE_PARITY: Parity = Parity::None;
pub const LINE_STOP_BITS: StopBits = StopBits::One;
/// DTR/RTS are driven explicitly after open, not by the flow-control engine
pub const LINE_FLOW_CONTROL: FlowControl = FlowControl::None;

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert data bits count to serialport crate's DataBits type.
/// Anything outside 5..=8 is rejected rather than defaulted.
pub fn to_serialport_data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(format!("unsupported data bits: {} (expected 5-8)", other)),
    }
}

/// Read timeouts are routine on a quiet line
pub fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Short label for a line configuration, e.g. `57600 8N1`
pub fn line_label(baud_rate: u32, data_bits: u8) -> String {
    format!("{} {}N1", baud_rate, data_bits)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_serialport_data_bits() {
        assert!(matches!(to_serialport_data_bits(5), Ok(DataBits::Five)));
        assert!(matches!(to_serialport_data_bits(6), Ok(DataBits::Six)));
        assert!(matches!(to_serialport_data_bits(7), Ok(DataBits::Seven)));
        assert!(matches!(to_serialport_data_bits(8), Ok(DataBits::Eight)));
        assert!(to_serialport_data_bits(9).is_err());
        assert!(to_serialport_data_bits(0).is_err());
    }

    #[test]
    fn test_is_timeout() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(is_timeout(&timeout));
        assert!(!is_timeout(&broken));
    }

    #[test]
    fn test_line_label() {
        assert_eq!(line_label(57600, 8), "57600 8N1");
    }
}
