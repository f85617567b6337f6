//! Process-wide liveness flag shared by the accept loop and every session.
//!
//! A session that runs `REBOOT` or `SHUTDOWN` records *why* the server should
//! stop and clears the running flag.  The accept loop polls the flag between
//! accepts and returns the recorded [`StopReason`] to `main`, which decides
//! whether to start a fresh server or exit.  Sessions that are already
//! connected are left alone.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Why the accept loop stopped admitting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A client ran `REBOOT`; the binary restarts with a fresh store.
    Reboot,
    /// A client ran `SHUTDOWN`.
    Shutdown,
    /// The process received Ctrl-C.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Reboot => f.write_str("reboot"),
            StopReason::Shutdown => f.write_str("shutdown"),
            StopReason::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Running flag plus the first stop reason that was raised.
#[derive(Debug)]
pub struct SystemControl {
    running: AtomicBool,
    reason: Mutex<Option<StopReason>>,
}

impl Default for SystemControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reason: Mutex::new(None),
        }
    }

    /// `true` until someone calls [`request_stop`](Self::request_stop).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Asks the accept loop to stop.  The first reason raised wins; later
    /// requests only clear the flag again.
    pub fn request_stop(&self, reason: StopReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.running.store(false, Ordering::Relaxed);
    }

    /// The reason recorded by the first stop request, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_control_is_running_without_reason() {
        let control = SystemControl::new();
        assert!(control.is_running());
        assert_eq!(control.stop_reason(), None);
    }

    #[test]
    fn test_request_stop_clears_flag_and_records_reason() {
        // Arrange
        let control = SystemControl::new();

        // Act
        control.request_stop(StopReason::Reboot);

        // Assert
        assert!(!control.is_running());
        assert_eq!(control.stop_reason(), Some(StopReason::Reboot));
    }

    #[test]
    fn test_first_stop_reason_wins() {
        let control = SystemControl::new();
        control.request_stop(StopReason::Shutdown);
        control.request_stop(StopReason::Interrupted);
        assert_eq!(control.stop_reason(), Some(StopReason::Shutdown));
    }
}
