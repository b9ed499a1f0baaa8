//! Scan session controller.
//!
//! Owns the rig-wide `scanning`/`abort` state and enforces that at most one
//! scan session runs at a time across all connections.
//!
//! # State machine
//!
//! ```text
//! Idle --start--> Running --abort--> Aborting
//!   ^                |                   |
//!   +----finish------+-------finish------+
//! ```
//!
//! Every run is issued a [`ScanTicket`] with a fresh scan id and
//! [`CancellationToken`]. Abort cancels the token; the scan engine observes it
//! at its own step granularity. `finish` returns to `Idle` no matter how the
//! engine ended.
//!
//! The controller is synchronous and lives inside the driver, so the
//! check-then-set in [`SessionController::start`] can never be interleaved
//! with another connection's command.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from session transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `start` while a session is already running or aborting.
    #[error("scan {scan_id} already in progress")]
    AlreadyRunning {
        /// Session currently holding the rig
        scan_id: u64,
    },
}

/// Externally visible session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No scan running
    Idle,
    /// Scan engine is working
    Running,
    /// Abort requested, engine has not returned yet
    Aborting,
}

/// Handle given to the scan engine for one run.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    /// Monotonic id of this run
    pub scan_id: u64,
    /// Cancelled when the run is aborted
    pub cancel: CancellationToken,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Running(ScanTicket),
    Aborting(ScanTicket),
}

/// Single-flight scan session state.
#[derive(Debug)]
pub struct SessionController {
    phase: Phase,
    next_scan_id: u64,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    /// Create an idle controller.
    pub fn new() -> Self {
        Self { phase: Phase::Idle, next_scan_id: 1 }
    }

    /// Begin a session.
    ///
    /// Fails without side effects if a session is already running or
    /// aborting.
    pub fn start(&mut self) -> Result<ScanTicket, SessionError> {
        if let Some(scan_id) = self.current_scan() {
            return Err(SessionError::AlreadyRunning { scan_id });
        }

        let ticket = ScanTicket { scan_id: self.next_scan_id, cancel: CancellationToken::new() };
        self.next_scan_id += 1;
        self.phase = Phase::Running(ticket.clone());

        Ok(ticket)
    }

    /// Request cancellation of the running session.
    ///
    /// Returns `true` if a running session was signalled. Idempotent: while
    /// idle or already aborting this does nothing and returns `false`.
    pub fn abort(&mut self) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Running(ticket) => {
                ticket.cancel.cancel();
                self.phase = Phase::Aborting(ticket);
                true
            },
            other => {
                self.phase = other;
                false
            },
        }
    }

    /// Mark the session with `scan_id` as ended.
    ///
    /// Returns `false` (and changes nothing) if `scan_id` is not the current
    /// session, e.g. a late completion from an earlier run.
    pub fn finish(&mut self, scan_id: u64) -> bool {
        if self.current_scan() != Some(scan_id) {
            return false;
        }

        self.phase = Phase::Idle;
        true
    }

    /// `true` while a session holds the rig (running or aborting).
    pub fn scanning(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// `true` once abort was requested for the current session. Cleared when
    /// the next session starts.
    pub fn abort_requested(&self) -> bool {
        matches!(self.phase, Phase::Aborting(_))
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Running(_) => SessionPhase::Running,
            Phase::Aborting(_) => SessionPhase::Aborting,
        }
    }

    /// Id of the session holding the rig, if any.
    pub fn current_scan(&self) -> Option<u64> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Running(ticket) | Phase::Aborting(ticket) => Some(ticket.scan_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_moves_to_running() {
        let mut controller = SessionController::new();

        let ticket = controller.start().unwrap();

        assert!(controller.scanning());
        assert!(!controller.abort_requested());
        assert_eq!(controller.phase(), SessionPhase::Running);
        assert_eq!(controller.current_scan(), Some(ticket.scan_id));
        assert!(!ticket.cancel.is_cancelled());
    }

    #[test]
    fn second_start_is_rejected_without_side_effects() {
        let mut controller = SessionController::new();
        let first = controller.start().unwrap();

        let result = controller.start();

        assert_eq!(result.unwrap_err(), SessionError::AlreadyRunning { scan_id: first.scan_id });
        assert_eq!(controller.current_scan(), Some(first.scan_id));
        assert_eq!(controller.phase(), SessionPhase::Running);
    }

    #[test]
    fn abort_while_idle_is_a_no_op() {
        let mut controller = SessionController::new();

        assert!(!controller.abort());
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(!controller.abort_requested());
    }

    #[test]
    fn abort_cancels_the_running_ticket() {
        let mut controller = SessionController::new();
        let ticket = controller.start().unwrap();

        assert!(controller.abort());

        assert!(ticket.cancel.is_cancelled());
        assert!(controller.abort_requested());
        assert!(controller.scanning());
        assert!(!controller.abort(), "second abort is idempotent");
    }

    #[test]
    fn start_is_rejected_while_aborting() {
        let mut controller = SessionController::new();
        controller.start().unwrap();
        controller.abort();

        assert!(controller.start().is_err());
    }

    #[test]
    fn finish_returns_to_idle_after_abort() {
        let mut controller = SessionController::new();
        let ticket = controller.start().unwrap();
        controller.abort();

        assert!(controller.finish(ticket.scan_id));

        assert!(!controller.scanning());
        assert!(!controller.abort_requested());
    }

    #[test]
    fn new_session_gets_a_fresh_token() {
        let mut controller = SessionController::new();
        let first = controller.start().unwrap();
        controller.abort();
        controller.finish(first.scan_id);

        let second = controller.start().unwrap();

        assert!(second.scan_id > first.scan_id);
        assert!(!second.cancel.is_cancelled());
        assert!(!controller.abort_requested());
    }

    #[test]
    fn stale_finish_is_ignored() {
        let mut controller = SessionController::new();
        let first = controller.start().unwrap();
        controller.finish(first.scan_id);
        let second = controller.start().unwrap();

        assert!(!controller.finish(first.scan_id));
        assert_eq!(controller.current_scan(), Some(second.scan_id));
    }
}
