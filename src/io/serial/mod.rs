// src/io/serial/mod.rs
//
// Serial acquisition engine for UHF RFID readers.
//
// Features:
// - Port discovery with heuristic auto-selection
// - Fixed-parameter connection builder (8N1 style, DTR/RTS asserted, 500 ms timeouts)
// - Fixed-length frame assembly driven by the reader protocol descriptor
// - Bounded reconnection with a fixed pause between attempts
// - Simulation mode for running without hardware

pub mod assembler;
pub mod connection;
pub mod reader;
pub mod resolver;
pub mod simulated;
pub mod supervisor;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{run_read_loop, FrameAssembler, LoopExit};
pub use connection::{
    build_connection, Connector, NativeConnector, NativeLink, SerialLink, TRANSPORT_TIMEOUT,
};
pub use reader::{ReaderDevice, RfidReader};
pub use resolver::{format_port_listing, list_port_names, resolve_port, suggest_port, DEFAULT_PORT};
pub use simulated::{SimulatedConnector, SimulatedLink};
pub use supervisor::ReconnectSupervisor;
