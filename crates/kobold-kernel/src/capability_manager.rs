//! Capability derivation – what a robot may do in its current state.
//!
//! Capabilities are never stored.  [`capabilities_for`] is a pure function
//! of [`RobotState`], so the allowed action set cannot drift away from the
//! state it was derived from.
//!
//! | state | start | pause | resume | go to base |
//! |---|---|---|---|---|
//! | Idle | ✓ | | | |
//! | Cleaning | | ✓ | | ✓ |
//! | Paused | | | ✓ | ✓ |
//! | Error | | | | |

use kobold_types::{Capabilities, IntentKind, KoboldError, RobotState};

/// Derive the capability set for `state`.
pub fn capabilities_for(state: RobotState) -> Capabilities {
    match state {
        RobotState::Idle => Capabilities {
            can_start: true,
            can_pause: false,
            can_resume: false,
            can_go_to_base: false,
        },
        RobotState::Cleaning => Capabilities {
            can_start: false,
            can_pause: true,
            can_resume: false,
            can_go_to_base: true,
        },
        RobotState::Paused => Capabilities {
            can_start: false,
            can_pause: false,
            can_resume: true,
            can_go_to_base: true,
        },
        RobotState::Error => Capabilities {
            can_start: false,
            can_pause: false,
            can_resume: false,
            can_go_to_base: false,
        },
    }
}

/// Return `Ok(())` when `granted` holds, or
/// [`KoboldError::InvalidTransition`] for `intent` in `state` otherwise.
pub fn require(granted: bool, intent: IntentKind, state: RobotState) -> Result<(), KoboldError> {
    if granted {
        Ok(())
    } else {
        Err(KoboldError::InvalidTransition { intent, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_can_only_start() {
        let caps = capabilities_for(RobotState::Idle);
        assert!(caps.can_start);
        assert!(!caps.can_pause && !caps.can_resume && !caps.can_go_to_base);
    }

    #[test]
    fn error_allows_nothing() {
        let caps = capabilities_for(RobotState::Error);
        assert_eq!(
            caps,
            Capabilities {
                can_start: false,
                can_pause: false,
                can_resume: false,
                can_go_to_base: false,
            }
        );
    }

    #[test]
    fn start_and_resume_are_mutually_exclusive() {
        for state in RobotState::ALL {
            let caps = capabilities_for(state);
            assert!(!(caps.can_start && caps.can_resume), "{state}");
        }
    }

    #[test]
    fn go_to_base_only_while_away_from_base() {
        let with_base: Vec<RobotState> = RobotState::ALL
            .into_iter()
            .filter(|s| capabilities_for(*s).can_go_to_base)
            .collect();
        assert_eq!(with_base, vec![RobotState::Cleaning, RobotState::Paused]);
    }

    #[test]
    fn require_reports_intent_and_state() {
        assert!(require(true, IntentKind::Pause, RobotState::Idle).is_ok());
        let err = require(false, IntentKind::Pause, RobotState::Idle).unwrap_err();
        assert!(matches!(
            err,
            KoboldError::InvalidTransition {
                intent: IntentKind::Pause,
                state: RobotState::Idle
            }
        ));
    }
}
