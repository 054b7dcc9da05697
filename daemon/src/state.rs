//! Daemon state definitions.

/// Daemon operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Daemon is constructed but its timers are not running.
    Starting,
    /// Timers are running.
    Running,
    /// Shutdown requested; timers are draining.
    ShuttingDown,
    /// Daemon is stopped.
    Stopped,
}

impl DaemonState {
    /// Check if the daemon is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, DaemonState::Running)
    }

    /// Check if the daemon is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DaemonState::Stopped)
    }
}
