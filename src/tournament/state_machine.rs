//! Tournament lifecycle state machine.
//!
//! ```text
//! Draft -> InstructorAssigned -> ReadyForEnrollment -> EnrollmentOpen -> InProgress -> Completed
//!   \______________________\__________________\_____________\_____________\-> Cancelled
//! ```
//!
//! [`transition`] is pure: it checks guards and names the side effect the
//! caller must perform. Persisting the new status is the manager's job.

use std::fmt;
use thiserror::Error;

use super::external::{InstructorAssignment, InstructorRole};
use super::models::TournamentStatus;

/// Requested lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    AssignLeadInstructor,
    MarkReadyForEnrollment,
    OpenEnrollment,
    Start,
    Complete { admin_override: bool },
    Cancel,
}

impl LifecycleEvent {
    /// Status the event leads to when allowed
    pub fn target(self) -> TournamentStatus {
        match self {
            LifecycleEvent::AssignLeadInstructor => TournamentStatus::InstructorAssigned,
            LifecycleEvent::MarkReadyForEnrollment => TournamentStatus::ReadyForEnrollment,
            LifecycleEvent::OpenEnrollment => TournamentStatus::EnrollmentOpen,
            LifecycleEvent::Start => TournamentStatus::InProgress,
            LifecycleEvent::Complete { .. } => TournamentStatus::Completed,
            LifecycleEvent::Cancel => TournamentStatus::Cancelled,
        }
    }

    /// Status the event must start from; `None` for cancellation
    fn source(self) -> Option<TournamentStatus> {
        match self {
            LifecycleEvent::AssignLeadInstructor => Some(TournamentStatus::Draft),
            LifecycleEvent::MarkReadyForEnrollment => Some(TournamentStatus::InstructorAssigned),
            LifecycleEvent::OpenEnrollment => Some(TournamentStatus::ReadyForEnrollment),
            LifecycleEvent::Start => Some(TournamentStatus::EnrollmentOpen),
            LifecycleEvent::Complete { .. } => Some(TournamentStatus::InProgress),
            LifecycleEvent::Cancel => None,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::AssignLeadInstructor => write!(f, "assign_lead_instructor"),
            LifecycleEvent::MarkReadyForEnrollment => write!(f, "mark_ready_for_enrollment"),
            LifecycleEvent::OpenEnrollment => write!(f, "open_enrollment"),
            LifecycleEvent::Start => write!(f, "start"),
            LifecycleEvent::Complete { admin_override: true } => write!(f, "complete (override)"),
            LifecycleEvent::Complete { .. } => write!(f, "complete"),
            LifecycleEvent::Cancel => write!(f, "cancel"),
        }
    }
}

/// Work the caller must do as part of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEffect {
    /// Freeze the roster and generate sessions in the same write as the status
    FreezeRosterAndGenerate,
    /// Run the reward pipeline after the status is stored
    DistributeRewards,
    /// Never distribute rewards for this tournament
    SuppressRewards,
}

/// Facts the guards are evaluated against
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardContext<'a> {
    pub assignments: &'a [InstructorAssignment],
    /// Location of the tournament, matched against assistant assignments
    pub location_id: Option<i64>,
    /// Sessions not yet finalized
    pub unfinalized_sessions: usize,
}

/// An allowed status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TournamentStatus,
    pub to: TournamentStatus,
    pub effect: Option<LifecycleEffect>,
}

/// Lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot {event} a tournament that is {from}")]
    InvalidTransition {
        from: TournamentStatus,
        event: LifecycleEvent,
    },

    #[error("tournament is {0} and can no longer change")]
    Terminal(TournamentStatus),

    #[error("no accepted lead instructor assignment")]
    MissingLeadInstructor,

    #[error("no accepted assistant instructor assignment for this location")]
    MissingAssistantInstructor,

    #[error("{0} sessions are not finalized")]
    UnfinalizedSessions(usize),
}

/// Check an event against the current status and guards
pub fn transition(
    current: TournamentStatus,
    event: LifecycleEvent,
    guards: &GuardContext<'_>,
) -> Result<Transition, LifecycleError> {
    if current.is_terminal() {
        return Err(LifecycleError::Terminal(current));
    }
    if let Some(source) = event.source() {
        if source != current {
            return Err(LifecycleError::InvalidTransition {
                from: current,
                event,
            });
        }
    }

    let effect = match event {
        LifecycleEvent::AssignLeadInstructor => {
            if !guards.assignments.iter().any(is_qualifying_lead) {
                return Err(LifecycleError::MissingLeadInstructor);
            }
            None
        }
        LifecycleEvent::MarkReadyForEnrollment => {
            if !guards
                .assignments
                .iter()
                .any(|a| is_matching_assistant(a, guards.location_id))
            {
                return Err(LifecycleError::MissingAssistantInstructor);
            }
            None
        }
        LifecycleEvent::OpenEnrollment => None,
        LifecycleEvent::Start => Some(LifecycleEffect::FreezeRosterAndGenerate),
        LifecycleEvent::Complete { admin_override } => {
            if guards.unfinalized_sessions > 0 && !admin_override {
                return Err(LifecycleError::UnfinalizedSessions(guards.unfinalized_sessions));
            }
            Some(LifecycleEffect::DistributeRewards)
        }
        LifecycleEvent::Cancel => Some(LifecycleEffect::SuppressRewards),
    };

    Ok(Transition {
        from: current,
        to: event.target(),
        effect,
    })
}

fn is_qualifying_lead(assignment: &InstructorAssignment) -> bool {
    assignment.accepted && assignment.role == InstructorRole::Lead
}

fn is_matching_assistant(assignment: &InstructorAssignment, location_id: Option<i64>) -> bool {
    let same_location = match (assignment.location_id, location_id) {
        (Some(assigned), Some(tournament)) => assigned == tournament,
        _ => true,
    };
    assignment.accepted && assignment.role == InstructorRole::Assistant && same_location
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guards(assignments: &[InstructorAssignment]) -> GuardContext<'_> {
        GuardContext {
            assignments,
            location_id: Some(5),
            unfinalized_sessions: 0,
        }
    }

    #[test]
    fn test_happy_path() {
        let staff = [
            InstructorAssignment::lead(1),
            InstructorAssignment::assistant(2, Some(5)),
        ];
        let ctx = guards(&staff);
        let mut status = TournamentStatus::Draft;
        for event in [
            LifecycleEvent::AssignLeadInstructor,
            LifecycleEvent::MarkReadyForEnrollment,
            LifecycleEvent::OpenEnrollment,
            LifecycleEvent::Start,
            LifecycleEvent::Complete { admin_override: false },
        ] {
            status = transition(status, event, &ctx).expect("allowed").to;
        }
        assert_eq!(status, TournamentStatus::Completed);
    }

    #[test]
    fn test_lead_must_be_accepted() {
        let staff = [InstructorAssignment::lead(1).pending()];
        assert_eq!(
            transition(TournamentStatus::Draft, LifecycleEvent::AssignLeadInstructor, &guards(&staff)),
            Err(LifecycleError::MissingLeadInstructor)
        );
    }

    #[test]
    fn test_assistant_role_does_not_count_as_lead() {
        let staff = [InstructorAssignment::assistant(1, None)];
        assert_eq!(
            transition(TournamentStatus::Draft, LifecycleEvent::AssignLeadInstructor, &guards(&staff)),
            Err(LifecycleError::MissingLeadInstructor)
        );
    }

    #[test]
    fn test_assistant_location_must_match() {
        let elsewhere = [InstructorAssignment::assistant(2, Some(9))];
        assert_eq!(
            transition(
                TournamentStatus::InstructorAssigned,
                LifecycleEvent::MarkReadyForEnrollment,
                &guards(&elsewhere)
            ),
            Err(LifecycleError::MissingAssistantInstructor)
        );

        let unspecified = [InstructorAssignment::assistant(2, None)];
        assert!(transition(
            TournamentStatus::InstructorAssigned,
            LifecycleEvent::MarkReadyForEnrollment,
            &guards(&unspecified)
        )
        .is_ok());
    }

    #[test]
    fn test_start_requests_generation() {
        let t = transition(TournamentStatus::EnrollmentOpen, LifecycleEvent::Start, &guards(&[]))
            .expect("allowed");
        assert_eq!(t.effect, Some(LifecycleEffect::FreezeRosterAndGenerate));
    }

    #[test]
    fn test_completion_requires_all_finalized_or_override() {
        let ctx = GuardContext {
            unfinalized_sessions: 2,
            ..guards(&[])
        };
        assert_eq!(
            transition(
                TournamentStatus::InProgress,
                LifecycleEvent::Complete { admin_override: false },
                &ctx
            ),
            Err(LifecycleError::UnfinalizedSessions(2))
        );
        let forced = transition(
            TournamentStatus::InProgress,
            LifecycleEvent::Complete { admin_override: true },
            &ctx,
        )
        .expect("override allowed");
        assert_eq!(forced.effect, Some(LifecycleEffect::DistributeRewards));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        assert_eq!(
            transition(TournamentStatus::Draft, LifecycleEvent::Start, &guards(&[])),
            Err(LifecycleError::InvalidTransition {
                from: TournamentStatus::Draft,
                event: LifecycleEvent::Start,
            })
        );
    }

    #[test]
    fn test_cancel_from_any_open_state() {
        for status in [
            TournamentStatus::Draft,
            TournamentStatus::InstructorAssigned,
            TournamentStatus::ReadyForEnrollment,
            TournamentStatus::EnrollmentOpen,
            TournamentStatus::InProgress,
        ] {
            let t = transition(status, LifecycleEvent::Cancel, &guards(&[])).expect("cancellable");
            assert_eq!(t.to, TournamentStatus::Cancelled);
            assert_eq!(t.effect, Some(LifecycleEffect::SuppressRewards));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [TournamentStatus::Completed, TournamentStatus::Cancelled] {
            assert_eq!(
                transition(status, LifecycleEvent::Cancel, &guards(&[])),
                Err(LifecycleError::Terminal(status))
            );
        }
    }
}
