//! Unified error types for the HomeNode firmware.
//!
//! One enum per layer, plain `Display` impls, no panicking paths.
//! Bus operations surface failures to the caller and log the operation
//! name at the failing boundary; nothing here carries heap allocations
//! so errors pass cheaply between tasks.

use core::fmt;

use crate::bus::TaskId;

// ---------------------------------------------------------------------------
// Message bus errors
// ---------------------------------------------------------------------------

/// Failures at the bus boundary. Validation errors never propagate past
/// the failing call; backpressure and timeouts are the caller's to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// `initialize()` has not been called yet.
    NotInitialized,
    /// Mailbox capacity of zero requested at registration.
    InvalidCapacity,
    /// The addressed identity has no registered mailbox.
    MailboxMissing(TaskId),
    /// Destination mailbox stayed full for the whole send timeout.
    Full(TaskId),
    /// No envelope arrived within the receive timeout.
    Timeout,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "message bus not initialized"),
            Self::InvalidCapacity => write!(f, "mailbox capacity must be positive"),
            Self::MailboxMissing(id) => write!(f, "no mailbox registered for {id:?}"),
            Self::Full(id) => write!(f, "mailbox for {id:?} full (backpressure)"),
            Self::Timeout => write!(f, "receive timed out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bring-up errors
// ---------------------------------------------------------------------------

/// Short reason string copied out of a failing worker's reply.
pub type FailReason = heapless::String<64>;

/// Why a bring-up stage failed. Any of these sends the sequencer to
/// its terminal `Aborted` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BringupError {
    /// The stage request could not even be enqueued.
    SendFailed(TaskId),
    /// The expected response never arrived within the stage bound.
    ResponseTimeout(TaskId),
    /// The worker reported failure via `TaskError` (fail-fast).
    TaskFailed(FailReason),
}

impl fmt::Display for BringupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed(id) => write!(f, "request send to {id:?} failed"),
            Self::ResponseTimeout(id) => write!(f, "no response from {id:?} within bound"),
            Self::TaskFailed(reason) => write!(f, "task reported error: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_identity() {
        let msg = format!("{}", BusError::MailboxMissing(TaskId::Wifi));
        assert!(msg.contains("Wifi"));
        let msg = format!("{}", BusError::Full(TaskId::MessageBroker));
        assert!(msg.contains("MessageBroker"));
    }

    #[test]
    fn task_failed_carries_reason() {
        let mut reason = FailReason::new();
        let _ = reason.push_str("auth failure");
        let msg = format!("{}", BringupError::TaskFailed(reason));
        assert!(msg.contains("auth failure"));
    }
}
