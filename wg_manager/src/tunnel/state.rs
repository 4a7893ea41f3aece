//! The tunnel status state machine.
//!
//! [`transition`] is a pure function from the current status and a trigger
//! to the next status. The manager is the only caller; it applies the result
//! to the record and publishes the change.

use thiserror::Error;

use crate::tunnel::types::TunnelStatus;

/// Something that may move a tunnel to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A caller asked for the tunnel to come up
    ActivationRequested,
    /// A caller asked for the tunnel to go down
    DeactivationRequested,
    /// The configuration of a running tunnel was replaced
    ConfigurationChanged,
    /// Engine: the tunnel is up
    EngineActivated,
    /// Engine: the tunnel is down
    EngineDeactivated,
    /// Engine: the tunnel is renegotiating
    EngineReasserting,
    /// Engine: renegotiation finished, the tunnel is up again
    EngineReasserted,
    /// Engine: a prerequisite is missing, activation is on hold
    EngineWaiting,
    /// Engine: the missing prerequisite became available
    PrerequisiteMet,
    /// Engine (or watchdog): the in-flight operation failed
    EngineFailed,
}

/// Why a trigger was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Another transition is still in flight
    #[error("operation in progress")]
    OperationInProgress,
    /// The trigger does not apply to the current status
    #[error("invalid transition")]
    InvalidTransition,
}

/// Compute the status that follows `current` when `trigger` happens.
pub fn transition(current: TunnelStatus, trigger: Trigger) -> Result<TunnelStatus, TransitionError> {
    use TransitionError::{InvalidTransition, OperationInProgress};
    use TunnelStatus::*;

    match (trigger, current) {
        (Trigger::ActivationRequested, Inactive) => Ok(Activating),
        (Trigger::ActivationRequested, Activating | Deactivating | Restarting | Waiting) => {
            Err(OperationInProgress)
        }
        (Trigger::ActivationRequested, Active | Reasserting) => Err(InvalidTransition),

        (Trigger::DeactivationRequested, Active | Reasserting | Restarting) => Ok(Deactivating),
        (Trigger::DeactivationRequested, Waiting) => Ok(Inactive),
        (Trigger::DeactivationRequested, Activating | Deactivating) => Err(OperationInProgress),
        (Trigger::DeactivationRequested, Inactive) => Err(InvalidTransition),

        (Trigger::ConfigurationChanged, Active | Reasserting) => Ok(Restarting),
        (Trigger::ConfigurationChanged, Inactive) => Ok(Inactive),
        (Trigger::ConfigurationChanged, Activating | Deactivating | Restarting | Waiting) => {
            Err(OperationInProgress)
        }

        (Trigger::EngineActivated, Activating) => Ok(Active),
        (Trigger::EngineDeactivated, Deactivating | Active | Reasserting) => Ok(Inactive),
        (Trigger::EngineDeactivated, Restarting) => Ok(Activating),
        (Trigger::EngineReasserting, Active) => Ok(Reasserting),
        (Trigger::EngineReasserted, Reasserting) => Ok(Active),
        (Trigger::EngineWaiting, Activating) => Ok(Waiting),
        (Trigger::PrerequisiteMet, Waiting) => Ok(Activating),
        (Trigger::EngineFailed, status) if status != Inactive => Ok(Inactive),

        _ => Err(InvalidTransition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TunnelStatus::*;

    const ALL: [TunnelStatus; 7] = [
        Inactive,
        Activating,
        Active,
        Reasserting,
        Deactivating,
        Restarting,
        Waiting,
    ];

    #[test]
    fn activation_only_from_inactive() {
        for status in ALL {
            let result = transition(status, Trigger::ActivationRequested);
            if status == Inactive {
                assert_eq!(result, Ok(Activating));
            } else {
                assert!(result.is_err(), "activation from {status} must be refused");
            }
        }
    }

    #[test]
    fn deactivation_allowed_from_running_and_waiting_states() {
        assert_eq!(transition(Active, Trigger::DeactivationRequested), Ok(Deactivating));
        assert_eq!(transition(Reasserting, Trigger::DeactivationRequested), Ok(Deactivating));
        assert_eq!(transition(Restarting, Trigger::DeactivationRequested), Ok(Deactivating));
        assert_eq!(transition(Waiting, Trigger::DeactivationRequested), Ok(Inactive));
        assert_eq!(
            transition(Inactive, Trigger::DeactivationRequested),
            Err(TransitionError::InvalidTransition)
        );
    }

    #[test]
    fn pending_states_reject_requests_as_in_progress() {
        for status in [Activating, Deactivating] {
            assert_eq!(
                transition(status, Trigger::ActivationRequested),
                Err(TransitionError::OperationInProgress)
            );
            assert_eq!(
                transition(status, Trigger::DeactivationRequested),
                Err(TransitionError::OperationInProgress)
            );
        }
    }

    #[test]
    fn full_lifecycle() {
        let mut status = Inactive;
        for trigger in [
            Trigger::ActivationRequested,
            Trigger::EngineActivated,
            Trigger::EngineReasserting,
            Trigger::EngineReasserted,
            Trigger::ConfigurationChanged,
            Trigger::EngineDeactivated,
            Trigger::EngineActivated,
            Trigger::DeactivationRequested,
            Trigger::EngineDeactivated,
        ] {
            status = transition(status, trigger).unwrap();
        }
        assert_eq!(status, Inactive);
    }

    #[test]
    fn waiting_resumes_activation_when_prerequisite_met() {
        let status = transition(Activating, Trigger::EngineWaiting).unwrap();
        assert_eq!(status, Waiting);
        assert_eq!(transition(status, Trigger::PrerequisiteMet), Ok(Activating));
    }

    #[test]
    fn failure_always_settles_inactive() {
        for status in ALL {
            let result = transition(status, Trigger::EngineFailed);
            if status == Inactive {
                assert!(result.is_err());
            } else {
                assert_eq!(result, Ok(Inactive));
            }
        }
    }

    #[test]
    fn stale_engine_events_are_refused() {
        assert!(transition(Inactive, Trigger::EngineActivated).is_err());
        assert!(transition(Active, Trigger::EngineActivated).is_err());
        assert!(transition(Inactive, Trigger::EngineReasserted).is_err());
        assert!(transition(Active, Trigger::PrerequisiteMet).is_err());
    }
}
