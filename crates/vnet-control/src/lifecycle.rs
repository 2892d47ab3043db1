//! Switch lifecycle state machine.
//!
//! The store holds no status field for a switch. The state is derived from
//! which rows exist: the definition, a run instance pointing at it, and a
//! mux connection named after the switch.
//!
//! # State Machine
//!
//! ```text
//!     ┌───────────┐  add   ┌───────────┐  start  ┌───────────┐
//!     │ Undefined │───────▶│  Defined  │────────▶│ Starting  │
//!     └───────────┘        └───────────┘         └─────┬─────┘
//!           ▲                 ▲     ▲                  │ (connected)
//!           │ delete          │     │ stop             ▼
//!           │                 │     │            ┌───────────┐
//!           └─────────────────┘     └────────────│  Running  │
//!           ▲                                    └─────┬─────┘
//!           │             delete (cascade)             │
//!           └──────────────────────────────────────────┘
//! ```
//!
//! A start that times out leaves the switch in `Starting`: the run instance
//! is kept and only `stop` returns it to `Defined`.

use serde::{Deserialize, Serialize};
use vnet_core::SwitchId;

use crate::error::{ControlError, Result};

/// Observable state of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    /// No definition exists.
    Undefined,
    /// Defined, no run instance.
    Defined,
    /// A run instance exists but the mux has not reported a connection.
    Starting,
    /// A run instance exists and the switch is connected.
    Running,
}

impl SwitchState {
    /// Derive the state from what the store holds.
    #[must_use]
    pub const fn derive(defined: bool, has_run: bool, connected: bool) -> Self {
        match (defined, has_run, connected) {
            (false, _, _) => Self::Undefined,
            (true, false, _) => Self::Defined,
            (true, true, false) => Self::Starting,
            (true, true, true) => Self::Running,
        }
    }
}

impl std::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Undefined => "undefined",
            Self::Defined => "defined",
            Self::Starting => "starting",
            Self::Running => "running",
        };
        f.write_str(s)
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: SwitchState, to: SwitchState) -> bool {
    use SwitchState::{Defined, Running, Starting, Undefined};

    matches!(
        (from, to),
        (Undefined, Defined)
            | (Defined, Starting)
            | (Starting, Running)
            // stop
            | (Starting | Running, Defined)
            // delete; from a live instance only through the cascade
            | (Defined | Starting | Running, Undefined)
    )
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ControlError::InvalidState` if the transition is not allowed.
pub fn validate_transition(
    switch_id: &SwitchId,
    from: SwitchState,
    to: SwitchState,
) -> Result<SwitchState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ControlError::InvalidState {
            switch_id: switch_id.clone(),
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SwitchState::{Defined, Running, Starting, Undefined};

    #[test]
    fn derive_from_store_contents() {
        assert_eq!(SwitchState::derive(false, true, true), Undefined);
        assert_eq!(SwitchState::derive(true, false, true), Defined);
        assert_eq!(SwitchState::derive(true, true, false), Starting);
        assert_eq!(SwitchState::derive(true, true, true), Running);
    }

    #[test]
    fn forward_path() {
        assert!(is_valid_transition(Undefined, Defined));
        assert!(is_valid_transition(Defined, Starting));
        assert!(is_valid_transition(Starting, Running));
        assert!(is_valid_transition(Running, Defined));
        assert!(is_valid_transition(Defined, Undefined));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!is_valid_transition(Undefined, Running));
        assert!(!is_valid_transition(Undefined, Starting));
        assert!(!is_valid_transition(Defined, Running));
        assert!(!is_valid_transition(Running, Starting));
    }

    #[test]
    fn validate_transition_ok() {
        let id = SwitchId::new("sw-1").unwrap();
        assert_eq!(validate_transition(&id, Running, Defined).unwrap(), Defined);
    }

    #[test]
    fn validate_transition_err() {
        let id = SwitchId::new("sw-1").unwrap();
        match validate_transition(&id, Undefined, Starting) {
            Err(ControlError::InvalidState { switch_id, from, to }) => {
                assert_eq!(switch_id, id);
                assert_eq!(from, Undefined);
                assert_eq!(to, Starting);
            }
            other => panic!("expected InvalidState error, got {other:?}"),
        }
    }
}
