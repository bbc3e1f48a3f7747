use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::cycle::{Cycle, CycleId, CycleStatus};
use crate::phases::states::{Phase, PhaseAction, TransitionOutcome, TransitionRequest};
use crate::tally::{self, Standing};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("cycle {cycle_id} is not active")]
    NotActive { cycle_id: CycleId },
    #[error("cycle {cycle_id} is in discussion and awaits manual completion")]
    AwaitingCompletion { cycle_id: CycleId },
    #[error("cycle {cycle_id} can only be completed from discussion (current phase {phase})")]
    NotInDiscussion { cycle_id: CycleId, phase: Phase },
    #[error("`{operation}` requires the {required} phase (current phase {actual})")]
    WrongPhase { operation: &'static str, required: Phase, actual: Phase },
    #[error("cycle {cycle_id} is already active")]
    CycleAlreadyActive { cycle_id: CycleId },
    #[error("cycle {cycle_id} is already in the {phase} phase")]
    AlreadyInPhase { cycle_id: CycleId, phase: Phase },
    #[error("cycle {cycle_id} left the {expected} phase before the transition was written")]
    Superseded { cycle_id: CycleId, expected: Phase },
}

impl PhaseTransitionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotActive { .. } => "This cycle is no longer active.".to_owned(),
            Self::AwaitingCompletion { .. } => {
                "The cycle is in discussion. Use `complete` to finish it.".to_owned()
            }
            Self::NotInDiscussion { phase, .. } => {
                format!("A cycle can only be completed during discussion (currently {phase}).")
            }
            Self::WrongPhase { operation, required, actual } => {
                format!("You can only {operation} during the {required} phase (currently {actual}).")
            }
            Self::CycleAlreadyActive { .. } => {
                "A cycle is already running. Complete or reset it first.".to_owned()
            }
            Self::AlreadyInPhase { phase, .. } => {
                format!("The cycle is already in the {phase} phase.")
            }
            Self::Superseded { .. } => {
                "The phase changed while your request was processed. Check `status` and retry."
                    .to_owned()
            }
        }
    }
}

/// Phase rules for a book club cycle. Stateless; the cycle carries everything.
#[derive(Clone, Debug, Default)]
pub struct PhaseEngine;

impl PhaseEngine {
    pub fn new() -> Self {
        Self
    }

    /// Resolves and validates the phase a request would move the cycle into.
    pub fn target(
        &self,
        cycle: &Cycle,
        request: &TransitionRequest,
    ) -> Result<Phase, PhaseTransitionError> {
        if cycle.status != CycleStatus::Active {
            return Err(PhaseTransitionError::NotActive { cycle_id: cycle.id.clone() });
        }

        match request {
            TransitionRequest::Advance => cycle
                .current_phase
                .next()
                .ok_or_else(|| PhaseTransitionError::AwaitingCompletion { cycle_id: cycle.id.clone() }),
            // The current phase's start time only moves when the phase changes.
            TransitionRequest::Override(phase) if *phase == cycle.current_phase => {
                Err(PhaseTransitionError::AlreadyInPhase {
                    cycle_id: cycle.id.clone(),
                    phase: *phase,
                })
            }
            TransitionRequest::Override(phase) => Ok(*phase),
        }
    }

    /// Plans a transition. `standings` is only consulted when the target is
    /// reading, where the top standing becomes the pinned winner.
    pub fn apply(
        &self,
        cycle: &Cycle,
        request: &TransitionRequest,
        standings: &[Standing],
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PhaseTransitionError> {
        let to = self.target(cycle, request)?;

        let (winner, actions) = match to {
            Phase::Reading => (
                tally::winner(standings).map(|standing| standing.suggestion.id.clone()),
                vec![PhaseAction::AnnouncePhase, PhaseAction::PinWinner],
            ),
            Phase::Discussion => {
                (None, vec![PhaseAction::AnnouncePhase, PhaseAction::PromptDiscussion])
            }
            Phase::Suggestion | Phase::Voting => (None, vec![PhaseAction::AnnouncePhase]),
        };

        Ok(TransitionOutcome {
            cycle_id: cycle.id.clone(),
            from: cycle.current_phase,
            to,
            request: request.clone(),
            started_at: now,
            winner,
            actions,
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        cycle: &Cycle,
        request: &TransitionRequest,
        standings: &[Standing],
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, PhaseTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(cycle, request, standings, now);
        match &result {
            Ok(outcome) => {
                let mut event = AuditEvent::new(
                    Some(cycle.id.clone()),
                    audit.correlation_id.clone(),
                    "phase.transition_planned",
                    AuditCategory::Phase,
                    audit.actor.clone(),
                    AuditOutcome::Success,
                )
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str())
                .with_metadata("request", format!("{:?}", outcome.request));
                if let Some(winner) = &outcome.winner {
                    event = event.with_metadata("winner", winner.0.clone());
                }
                sink.emit(event);
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(cycle.id.clone()),
                        audit.correlation_id.clone(),
                        "phase.transition_rejected",
                        AuditCategory::Phase,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// `now >= start + duration` for the current phase. Inactive cycles and
    /// cycles without a start recorded for the current phase never expire.
    pub fn is_expired(&self, cycle: &Cycle, now: DateTime<Utc>) -> bool {
        if !cycle.is_active() {
            return false;
        }
        cycle.current_phase_deadline().is_some_and(|deadline| now >= deadline)
    }

    pub fn ensure_phase(
        &self,
        cycle: &Cycle,
        required: Phase,
        operation: &'static str,
    ) -> Result<(), PhaseTransitionError> {
        if !cycle.is_active() {
            return Err(PhaseTransitionError::NotActive { cycle_id: cycle.id.clone() });
        }
        if cycle.current_phase != required {
            return Err(PhaseTransitionError::WrongPhase {
                operation,
                required,
                actual: cycle.current_phase,
            });
        }
        Ok(())
    }

    /// Validates that the cycle may be archived and returns the archived copy.
    pub fn complete(&self, cycle: &Cycle, now: DateTime<Utc>) -> Result<Cycle, PhaseTransitionError> {
        if !cycle.is_active() {
            return Err(PhaseTransitionError::NotActive { cycle_id: cycle.id.clone() });
        }
        if cycle.current_phase != Phase::Discussion {
            return Err(PhaseTransitionError::NotInDiscussion {
                cycle_id: cycle.id.clone(),
                phase: cycle.current_phase,
            });
        }

        let mut archived = cycle.clone();
        archived.status = CycleStatus::Archived;
        archived.completed_at = Some(now);
        Ok(archived)
    }
}

/// Applies a committed outcome to an in-memory copy of the cycle.
pub fn commit(cycle: &Cycle, outcome: &TransitionOutcome) -> Cycle {
    let mut updated = cycle.clone();
    updated.current_phase = outcome.to;
    updated.phase_timings.record_start(outcome.to, outcome.started_at);
    if outcome.pins_winner() {
        updated.winner = outcome.winner.clone();
    }
    updated
}
