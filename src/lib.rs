#[macro_use]
pub mod logging;
mod cli;
pub mod error;
pub mod io;
pub mod protocol;
pub mod settings;

pub use cli::{run, Cli, Command, RunArgs};
pub use error::AcquisitionError;
pub use io::serial::{ReaderDevice, RfidReader};
pub use io::{ConnectionState, StopSignal};
pub use protocol::{Frame, ReadMode, ReaderProtocol};
pub use settings::{ConnectionConfig, ReaderSettings};
