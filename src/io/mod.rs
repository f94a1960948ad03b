// src/io/mod.rs
//
// Acquisition I/O: connection state, stop signalling and the serial driver.

pub mod serial;

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Granularity at which sleeping workers re-check the stop signal
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Current time in microseconds since the Unix epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Connection State
// ============================================================================

/// Lifecycle of one reader connection.
///
/// `Filling(count)` only exists while `0 < count < frame_length`.
/// `FrameReady` is reported at the instant a frame is published and is
/// followed by `Idle` on the next byte or poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Port open, no partial frame held
    Idle,
    Filling(usize),
    FrameReady,
    /// Reconnection exhausted, acquisition has ended
    Failed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Filling(_) | ConnectionState::FrameReady
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Idle => f.write_str("open/idle"),
            ConnectionState::Filling(count) => write!(f, "filling({})", count),
            ConnectionState::FrameReady => f.write_str("frame-ready"),
            ConnectionState::Failed => f.write_str("failed"),
        }
    }
}

// ============================================================================
// Stop Signal
// ============================================================================

/// Cooperative stop signal handed to the worker when it starts.
/// Cloning shares the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if stop is requested.
    /// Returns true when the sleep was cut short by a stop.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }
}
