// src/cli.rs
//
// Command line front end: list ports, or run the acquisition worker until
// Ctrl-C or a fatal reconnection failure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::io::serial::resolver::{format_port_listing, list_port_names};
use crate::io::serial::{Connector, NativeConnector, ReaderDevice, RfidReader, SimulatedConnector};
use crate::logging::{init_file_logging, stop_file_logging, LogSink, Severity, TlogSink};
use crate::protocol::{protocol_for_settings, Frame};
use crate::settings::{default_settings_path, load_settings, ReaderSettings};

/// Capacity of the downstream frame queue
const FRAME_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "proton-frequency", version, about = "UHF RFID serial acquisition")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the serial ports visible to the host
    Ports,
    /// Connect to the reader and stream tag frames
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Serial port, or "auto" to pick one
    #[arg(long, env = "PROTON_READER_PORT")]
    pub port: Option<String>,

    /// Replay a canned payload instead of opening hardware
    #[arg(long)]
    pub simulate: bool,

    /// Show debug events, including every received frame
    #[arg(long, short)]
    pub verbose: bool,
}

impl RunArgs {
    fn apply(&self, settings: &mut ReaderSettings) {
        if let Some(port) = &self.port {
            settings.reader.port = port.clone();
        }
        if self.simulate {
            settings.simulation.enabled = true;
        }
        if self.verbose {
            settings.logging.verbose = true;
        }
    }
}

/// Parse arguments and run. Returns the process exit status.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match cli.command {
        Command::Ports => print_ports(),
        Command::Run(args) => match run_reader(args).await {
            Ok(()) => 0,
            Err(e) => {
                crate::tlog!("[main] {}", e);
                1
            }
        },
    }
}

fn print_ports() -> i32 {
    println!("{}", port_listing(list_port_names()));
    0
}

/// Informational only: an enumeration failure prints an empty listing
fn port_listing(enumerated: Result<Vec<String>, String>) -> String {
    let ports = enumerated.unwrap_or_else(|e| {
        crate::tlog!("[main] {}", e);
        Vec::new()
    });
    format_port_listing(&ports)
}

async fn run_reader(args: RunArgs) -> Result<(), String> {
    let path = args.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&path)?;
    args.apply(&mut settings);

    if let Some(dir) = &settings.logging.dir {
        init_file_logging(dir)?;
    }

    let result = run_with_settings(&settings).await;
    stop_file_logging();
    result
}

async fn run_with_settings(settings: &ReaderSettings) -> Result<(), String> {
    let min_severity = if settings.logging.verbose {
        Severity::Debug
    } else {
        Severity::Info
    };
    let log: Arc<dyn LogSink> =
        Arc::new(TlogSink::new("Serial").with_min_severity(min_severity));

    let config = settings.connection_config().map_err(|e| e.to_string())?;
    let protocol = protocol_for_settings(&settings.protocol)?;
    let connector: Box<dyn Connector> = if settings.simulation.enabled {
        let simulated = SimulatedConnector::new(
            settings.simulation.payload_bytes()?,
            settings.simulation.interval(),
        );
        simulated.check_frame_length(protocol.frame_length())?;
        Box::new(simulated)
    } else {
        Box::new(NativeConnector)
    };

    let (frames_tx, mut frames_rx) = mpsc::channel::<Frame>(FRAME_QUEUE_DEPTH);
    let consumer_log = log.clone();
    let consumer = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            consumer_log.log(
                Severity::Debug,
                &format!("Frame {} @ {} us", frame.to_hex(), frame.timestamp_us()),
            );
        }
    });

    let mut reader =
        RfidReader::new(config, protocol, connector, log).with_frame_channel(frames_tx);
    reader.start().await?;

    let stop = reader.stop_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crate::tlog!("[main] Interrupted, stopping reader");
            stop.stop();
        }
    });

    let outcome = reader.wait().await.map_err(|e| e.to_string());
    interrupt.abort();

    // Dropping the reader releases the last sender, so the consumer drains and ends
    drop(reader);
    let _ = consumer.await;
    outcome
}
