// src/io/serial/supervisor.rs
//
// Reconnection supervisor. Opens (or reopens) the reader link with a bounded
// number of retries and a fixed pause between attempts.

use std::time::Duration;

use super::connection::{Connector, SerialLink};
use super::resolver::resolve_port;
use crate::error::AcquisitionError;
use crate::io::StopSignal;
use crate::logging::{LogSink, Severity};
use crate::settings::ConnectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSupervisor {
    max_retry: u32,
    retry_delay: Duration,
}

impl ReconnectSupervisor {
    pub fn new(max_retry: u32, retry_delay: Duration) -> Self {
        Self {
            max_retry,
            retry_delay,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.max_retry(), config.max_timeout())
    }

    /// One initial attempt plus `max_retry` retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retry.saturating_add(1)
    }

    /// Open a link, retrying on failure.
    ///
    /// The port is resolved again on every attempt since an adapter can come
    /// back under a different name. Exhausting the attempts logs a single
    /// fatal event and returns `RetriesExhausted`. A stop request during the
    /// pause returns `Stopped` without a fatal report.
    pub fn connect(
        &self,
        connector: &mut dyn Connector,
        config: &ConnectionConfig,
        stop: &StopSignal,
        log: &dyn LogSink,
    ) -> Result<Box<dyn SerialLink>, AcquisitionError> {
        let attempts = self.max_attempts();
        let mut last_port = config.port_name().to_string();

        for attempt in 1..=attempts {
            if stop.is_stopped() {
                return Err(AcquisitionError::Stopped);
            }

            let port = resolve_port(config.port_name(), || connector.available_ports());
            match connector.open(&port, config) {
                Ok(link) => {
                    if attempt > 1 {
                        log.log(
                            Severity::Info,
                            &format!("Connected to {} on attempt {}/{}", port, attempt, attempts),
                        );
                    }
                    return Ok(link);
                }
                Err(e @ AcquisitionError::InvalidConfig(_)) => {
                    log.log(Severity::Fatal, &e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    log.log(
                        Severity::Error,
                        &format!(
                            "Serial connection failed to open: {} (attempt {}/{})",
                            e, attempt, attempts
                        ),
                    );
                    last_port = port;
                }
            }

            if attempt < attempts {
                log.log(
                    Severity::Warning,
                    &format!("Retrying in {} ms", self.retry_delay.as_millis()),
                );
                if stop.sleep(self.retry_delay) {
                    return Err(AcquisitionError::Stopped);
                }
            }
        }

        let err = AcquisitionError::RetriesExhausted {
            port: last_port,
            attempts,
        };
        log.log(Severity::Fatal, &format!("{}, giving up", err));
        Err(err)
    }
}
