// src/io/serial/reader.rs
//
// Hosted acquisition worker. Owns the reader link for its whole lifetime,
// drives the read loop on a blocking thread and reconnects when the link
// drops. One worker per physical reader; links are never shared.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::assembler::{run_read_loop, LoopExit, LoopObserver};
use super::connection::Connector;
use super::supervisor::ReconnectSupervisor;
use crate::error::AcquisitionError;
use crate::io::{ConnectionState, StopSignal};
use crate::logging::{LogSink, Severity};
use crate::protocol::{Frame, ReaderProtocol};
use crate::settings::ConnectionConfig;

// ============================================================================
// Device trait
// ============================================================================

/// Lifecycle of a long-running reader worker
#[async_trait]
pub trait ReaderDevice: Send {
    async fn start(&mut self) -> Result<(), String>;

    /// Request stop and wait for the worker to release the port
    async fn stop(&mut self) -> Result<(), String>;

    fn state(&self) -> ConnectionState;
}

// ============================================================================
// RFID Reader
// ============================================================================

/// Acquisition worker for one RFID reader
pub struct RfidReader {
    config: ConnectionConfig,
    protocol: Option<Box<dyn ReaderProtocol>>,
    connector: Option<Box<dyn Connector>>,
    log: Arc<dyn LogSink>,
    frames_tx: Option<mpsc::Sender<Frame>>,
    stop: StopSignal,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    task_handle: Option<JoinHandle<Result<(), AcquisitionError>>>,
}

impl RfidReader {
    pub fn new(
        config: ConnectionConfig,
        protocol: Box<dyn ReaderProtocol>,
        connector: Box<dyn Connector>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            protocol: Some(protocol),
            connector: Some(connector),
            log,
            frames_tx: None,
            stop: StopSignal::new(),
            state_tx,
            state_rx,
            task_handle: None,
        }
    }

    /// Forward every published frame to a downstream consumer.
    /// A full channel blocks the worker until the consumer catches up.
    pub fn with_frame_channel(mut self, frames_tx: mpsc::Sender<Frame>) -> Self {
        self.frames_tx = Some(frames_tx);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the worker to end on its own.
    /// `Ok` after a stop request, `Err` when reconnection was exhausted or the task panicked.
    pub async fn wait(&mut self) -> Result<(), AcquisitionError> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                crate::tlog!("[Serial] Acquisition task panicked: {:?}", e);
                let _ = self.state_tx.send_replace(ConnectionState::Failed);
                Err(AcquisitionError::WorkerAborted(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl ReaderDevice for RfidReader {
    async fn start(&mut self) -> Result<(), String> {
        if self.task_handle.is_some() {
            return Err("Reader is already running".to_string());
        }
        let (Some(protocol), Some(connector)) = (self.protocol.take(), self.connector.take())
        else {
            return Err("Reader has already been used and cannot be restarted".to_string());
        };

        let task = AcquisitionTask {
            config: self.config.clone(),
            protocol,
            connector,
            log: self.log.clone(),
            stop: self.stop.clone(),
            observer: WorkerObserver {
                state_tx: self.state_tx.clone(),
                frames_tx: self.frames_tx.clone(),
                log: self.log.clone(),
                downstream_closed: false,
            },
        };

        // Serial I/O blocks, run it on the blocking pool
        self.task_handle = Some(tokio::task::spawn_blocking(move || task.run()));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), String> {
        self.stop.stop();
        match self.wait().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.to_string()),
            Err(e) => {
                crate::tlog!("[Serial] Reader stopped after error: {}", e);
                Ok(())
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}

// ============================================================================
// Blocking worker
// ============================================================================

struct WorkerObserver {
    state_tx: watch::Sender<ConnectionState>,
    frames_tx: Option<mpsc::Sender<Frame>>,
    log: Arc<dyn LogSink>,
    downstream_closed: bool,
}

impl LoopObserver for WorkerObserver {
    fn on_state(&mut self, state: ConnectionState) {
        let _ = self.state_tx.send_replace(state);
    }

    fn on_frame(&mut self, frame: &Frame) {
        if self.downstream_closed {
            return;
        }
        if let Some(tx) = &self.frames_tx {
            if tx.blocking_send(frame.clone()).is_err() {
                self.log.log(
                    Severity::Warning,
                    "Frame consumer has gone away, frames are no longer forwarded",
                );
                self.downstream_closed = true;
            }
        }
    }
}

struct AcquisitionTask {
    config: ConnectionConfig,
    protocol: Box<dyn ReaderProtocol>,
    connector: Box<dyn Connector>,
    log: Arc<dyn LogSink>,
    stop: StopSignal,
    observer: WorkerObserver,
}

impl AcquisitionTask {
    fn run(mut self) -> Result<(), AcquisitionError> {
        if !self.config.auto_read() {
            self.log.log(
                Severity::Info,
                "Auto-read is disabled, serial acquisition not started",
            );
            return Ok(());
        }

        let supervisor = ReconnectSupervisor::from_config(&self.config);
        self.log.log(
            Severity::Info,
            &format!(
                "Starting {} acquisition on {} ({} byte frames, {} retries, {} ms pause)",
                self.protocol.name(),
                self.config.port_name(),
                self.protocol.frame_length(),
                self.config.max_retry(),
                self.config.max_timeout().as_millis()
            ),
        );

        loop {
            self.observer.on_state(ConnectionState::Connecting);
            let mut link = match supervisor.connect(
                self.connector.as_mut(),
                &self.config,
                &self.stop,
                self.log.as_ref(),
            ) {
                Ok(link) => link,
                Err(AcquisitionError::Stopped) => {
                    self.observer.on_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(e) => {
                    self.observer.on_state(ConnectionState::Failed);
                    return Err(e);
                }
            };

            self.log.log(
                Severity::Info,
                &format!("Reading frames from {}", link.port_name()),
            );

            // Fresh assembler per connection: a partial frame never survives a reconnect
            let exit = run_read_loop(
                link.as_mut(),
                self.protocol.as_mut(),
                &self.stop,
                self.log.as_ref(),
                &mut self.observer,
            );
            link.close();
            self.observer.on_state(ConnectionState::Disconnected);

            match exit {
                LoopExit::Stopped => {
                    self.log.log(
                        Severity::Info,
                        &format!("Serial acquisition stopped, {} closed", link.port_name()),
                    );
                    return Ok(());
                }
                LoopExit::TransportLost => continue,
            }
        }
    }
}
