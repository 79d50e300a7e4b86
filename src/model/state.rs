use std::fmt;

use crate::chain::TxReceipt;

/// Controller state machine.
///
/// ```text
/// Disconnected → Connecting → Ready(unapproved) → Approving → Ready(approved)
///                                                     Ready(approved) → Migrating → Ready(approved)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Disconnected,
    /// Handshake in progress, or loading data for a newly active account.
    Connecting,
    Ready { approved: bool },
    Approving,
    Migrating,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Disconnected => write!(f, "disconnected"),
            ControllerState::Connecting => write!(f, "connecting"),
            ControllerState::Ready { approved: true } => write!(f, "ready (approved)"),
            ControllerState::Ready { approved: false } => write!(f, "ready (unapproved)"),
            ControllerState::Approving => write!(f, "approving"),
            ControllerState::Migrating => write!(f, "migrating"),
        }
    }
}

/// What happened to a controller action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Connect or refresh finished and its reads were applied.
    Completed,
    /// Transaction mined and follow-up reads applied.
    Confirmed(TxReceipt),
    /// The controller was busy or the action did not apply to the current
    /// state. Nothing was sent.
    Ignored,
    /// The account changed or disconnected while the action was in flight;
    /// its result was dropped.
    Superseded,
}
