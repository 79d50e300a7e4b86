use alloy::primitives::U256;
use alloy::primitives::utils::format_units;

use crate::error::MigrationError;
use crate::model::{ControllerState, MigrationSession};

/// The single action a user can take next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Connect,
    Approve,
    Migrate,
    /// Connected, but the last load failed; data must be re-read first.
    Refresh,
    /// Something is in flight.
    Wait,
}

/// Read-only projection of the controller for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub session: MigrationSession,
    pub state: ControllerState,
    pub busy: bool,
    pub next_action: NextAction,
    pub last_error: Option<MigrationError>,
}

impl ViewState {
    pub fn project(
        session: &MigrationSession,
        state: ControllerState,
        last_error: Option<&MigrationError>,
    ) -> Self {
        ViewState {
            session: session.clone(),
            state,
            busy: session.busy,
            next_action: next_action(session, state),
            last_error: last_error.cloned(),
        }
    }

    /// Balances are only shown once both are known.
    pub fn balances(&self) -> Option<(U256, U256)> {
        self.session.flip_balance.zip(self.session.ryno_balance)
    }
}

pub fn next_action(session: &MigrationSession, state: ControllerState) -> NextAction {
    if session.busy {
        return NextAction::Wait;
    }
    match state {
        ControllerState::Disconnected => NextAction::Connect,
        ControllerState::Connecting | ControllerState::Approving | ControllerState::Migrating => {
            NextAction::Wait
        }
        ControllerState::Ready { .. } if !session.is_loaded() => NextAction::Refresh,
        ControllerState::Ready { approved: true } => NextAction::Migrate,
        ControllerState::Ready { approved: false } => NextAction::Approve,
    }
}

/// Human-readable token amount with trailing zeros dropped
/// (`1000000000000000000` at 18 decimals → `"1"`).
pub fn format_amount(amount: U256, decimals: u8) -> String {
    let Ok(formatted) = format_units(amount, decimals) else {
        return amount.to_string();
    };
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => formatted,
    }
}
