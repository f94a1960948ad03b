// src/io/serial/resolver.rs
//
// Port discovery. Enumerates the host's serial devices and, when no port is
// configured, picks the first one that looks like a USB serial or UART adapter.

use crate::settings::is_auto_port_name;

/// Used when auto-selection finds nothing suitable
pub const DEFAULT_PORT: &str = "/dev/tty.usb_serial";

/// Case-sensitive name fragments that identify a reader adapter
const PORT_HINTS: [&str; 2] = ["serial", "uart"];

/// List available serial port names
pub fn list_port_names() -> Result<Vec<String>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Pick the first port whose name contains a hint, or the fixed default.
pub fn suggest_port<S: AsRef<str>>(ports: &[S]) -> String {
    ports
        .iter()
        .map(AsRef::as_ref)
        .find(|name| PORT_HINTS.iter().any(|hint| name.contains(hint)))
        .unwrap_or(DEFAULT_PORT)
        .to_string()
}

/// Resolve the configured port name to a device identifier.
///
/// Explicit names are returned unchanged and `enumerate` is not called.
/// Never fails: an enumeration error is treated as an empty device list.
pub fn resolve_port<F>(requested: &str, enumerate: F) -> String
where
    F: FnOnce() -> Result<Vec<String>, String>,
{
    if !is_auto_port_name(requested) {
        return requested.to_string();
    }
    let ports = enumerate().unwrap_or_default();
    suggest_port(&ports)
}

/// Text for the port listing command: a header line and one port per line
pub fn format_port_listing(ports: &[String]) -> String {
    let mut out = format!("---- {} Serial ports available ----", ports.len());
    for port in ports {
        out.push('\n');
        out.push_str(port);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suggest_first_serial_match() {
        let ports = names(&["/dev/ttyS0", "/dev/cu.usbserial-A1", "/dev/tty.Bluetooth"]);
        assert_eq!(suggest_port(&ports), "/dev/cu.usbserial-A1");
    }

    #[test]
    fn test_suggest_uart_match() {
        let ports = names(&["/dev/ttyS0", "/dev/ttyAMA0-uart", "/dev/cu.usbserial-B"]);
        assert_eq!(suggest_port(&ports), "/dev/ttyAMA0-uart");
    }

    #[test]
    fn test_suggest_is_case_sensitive() {
        let ports = names(&["COM3", "/dev/USBSERIAL"]);
        assert_eq!(suggest_port(&ports), DEFAULT_PORT);
    }

    #[test]
    fn test_suggest_falls_back_to_default() {
        let ports = names(&["/dev/ttyS0", "/dev/tty.Bluetooth"]);
        assert_eq!(suggest_port(&ports), DEFAULT_PORT);
        assert_eq!(suggest_port::<String>(&[]), DEFAULT_PORT);
    }

    #[test]
    fn test_resolve_explicit_port_skips_enumeration() {
        let resolved = resolve_port("/dev/ttyUSB3", || panic!("enumeration must not run"));
        assert_eq!(resolved, "/dev/ttyUSB3");
    }

    #[test]
    fn test_resolve_auto_port() {
        let resolved = resolve_port("auto", || Ok(names(&["/dev/ttyS0", "/dev/cu.usbserial-A1"])));
        assert_eq!(resolved, "/dev/cu.usbserial-A1");
    }

    #[test]
    fn test_resolve_survives_enumeration_failure() {
        let resolved = resolve_port("auto", || Err("no permission".to_string()));
        assert_eq!(resolved, DEFAULT_PORT);
    }

    #[test]
    fn test_format_port_listing() {
        let listing = format_port_listing(&names(&["/dev/ttyS0", "/dev/ttyUSB0"]));
        assert_eq!(
            listing,
            "---- 2 Serial ports available ----\n/dev/ttyS0\n/dev/ttyUSB0"
        );
        assert_eq!(
            format_port_listing(&[]),
            "---- 0 Serial ports available ----"
        );
    }
}
