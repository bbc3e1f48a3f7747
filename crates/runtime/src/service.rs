//! Book club operations behind the slash commands and the scheduler.
//!
//! Every phase change funnels through [`BookClubService::commit_transition`]:
//! the engine plans it from a snapshot, the store applies it with a
//! conditional write keyed on the phase the snapshot saw, and only a write
//! that landed is announced. A lost write is reported as superseded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use bookclub_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use bookclub_core::domain::cycle::Cycle;
use bookclub_core::domain::rating::{Rating, RatingSummary};
use bookclub_core::domain::suggestion::{Suggestion, SuggestionId, SuggestionInput};
use bookclub_core::domain::vote::{Ballot, Rank};
use bookclub_core::errors::{ApplicationError, DomainError};
use bookclub_core::notify::{Notification, Notifier};
use bookclub_core::phases::engine::commit;
use bookclub_core::phases::{
    Phase, PhaseDurations, PhaseEngine, PhaseTransitionError, TransitionOutcome,
    TransitionRequest,
};
use bookclub_core::tally::{self, Standing};
use bookclub_db::repositories::{CreateCycleOutcome, RepositorySet};

use crate::announcements::phase_announcement;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleStatusView {
    pub cycle: Cycle,
    pub phase_started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    /// The current phase has run its length and waits for the next check.
    pub overdue: bool,
    pub suggestion_count: usize,
}

/// A suggestion as shown to members: numbered, without the proposer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListedSuggestion {
    pub position: usize,
    pub id: SuggestionId,
    pub book_name: String,
    pub author: String,
    pub link: Option<String>,
    pub notes: Option<String>,
}

impl ListedSuggestion {
    fn from_suggestion(position: usize, suggestion: &Suggestion) -> Self {
        Self {
            position,
            id: suggestion.id.clone(),
            book_name: suggestion.book_name.clone(),
            author: suggestion.author.clone(),
            link: suggestion.link.clone(),
            notes: suggestion.notes.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    pub picks: Vec<(Rank, ListedSuggestion)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultsView {
    pub cycle: Cycle,
    pub standings: Vec<Standing>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseChange {
    pub cycle: Cycle,
    pub outcome: TransitionOutcome,
    pub winner: Option<Suggestion>,
    pub notified: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommitResult {
    Applied(PhaseChange),
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RatingReceipt {
    pub book: Suggestion,
    pub rating: u8,
    pub recommend: bool,
    pub summary: RatingSummary,
}

pub struct BookClubService {
    repos: RepositorySet,
    engine: PhaseEngine,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    default_durations: PhaseDurations,
}

impl BookClubService {
    pub fn new(
        repos: RepositorySet,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        default_durations: PhaseDurations,
    ) -> Self {
        Self { repos, engine: PhaseEngine::new(), notifier, audit, default_durations }
    }

    pub fn engine(&self) -> &PhaseEngine {
        &self.engine
    }

    pub fn repositories(&self) -> &RepositorySet {
        &self.repos
    }

    pub fn audit_sink(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    pub async fn start_cycle(
        &self,
        name: &str,
        durations: Option<PhaseDurations>,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<Cycle, ApplicationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("a cycle needs a name".to_owned()).into());
        }

        let cycle = Cycle::start(name, durations.unwrap_or(self.default_durations), now);
        match self.repos.cycles.create_active(cycle).await? {
            CreateCycleOutcome::Created(cycle) => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(cycle.id.clone()),
                        ctx.correlation_id.clone(),
                        "cycle.started",
                        AuditCategory::Cycle,
                        ctx.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("name", cycle.name.clone()),
                );
                info!(
                    event_name = "cycle.started",
                    correlation_id = %ctx.correlation_id,
                    cycle_id = %cycle.id,
                    actor = %ctx.actor,
                    "book club cycle started"
                );
                Ok(cycle)
            }
            CreateCycleOutcome::ActiveCycleExists(cycle_id) => {
                Err(PhaseTransitionError::CycleAlreadyActive { cycle_id }.into())
            }
        }
    }

    pub async fn current_cycle(&self) -> Result<Cycle, ApplicationError> {
        self.repos
            .cycles
            .find_active()
            .await?
            .ok_or_else(|| DomainError::not_found("active cycle", "none").into())
    }

    pub async fn status(&self, now: DateTime<Utc>) -> Result<CycleStatusView, ApplicationError> {
        let cycle = self.current_cycle().await?;
        let suggestion_count = self.repos.suggestions.list_for_cycle(&cycle.id).await?.len();

        Ok(CycleStatusView {
            phase_started_at: cycle.current_phase_started_at(),
            deadline: cycle.current_phase_deadline(),
            overdue: self.engine.is_expired(&cycle, now),
            suggestion_count,
            cycle,
        })
    }

    pub async fn suggest_book(
        &self,
        user_id: &str,
        input: SuggestionInput,
        now: DateTime<Utc>,
    ) -> Result<ListedSuggestion, ApplicationError> {
        let cycle = self.current_cycle().await?;
        self.engine.ensure_phase(&cycle, Phase::Suggestion, "suggest books")?;

        let suggestion = Suggestion::new(cycle.id.clone(), user_id, input, now)?;
        let stored = self.repos.suggestions.insert(suggestion).await?;
        let position = self.repos.suggestions.list_for_cycle(&cycle.id).await?.len();

        info!(
            event_name = "cycle.suggestion.added",
            cycle_id = %cycle.id,
            suggestion_id = %stored.id,
            "book suggested"
        );
        Ok(ListedSuggestion::from_suggestion(position, &stored))
    }

    pub async fn list_suggestions(&self) -> Result<(Cycle, Vec<ListedSuggestion>), ApplicationError> {
        let cycle = self.current_cycle().await?;
        let listed = self
            .repos
            .suggestions
            .list_for_cycle(&cycle.id)
            .await?
            .iter()
            .enumerate()
            .map(|(index, suggestion)| ListedSuggestion::from_suggestion(index + 1, suggestion))
            .collect();
        Ok((cycle, listed))
    }

    /// Casts a ballot given 1-based positions in the suggestion listing.
    pub async fn cast_vote_by_position(
        &self,
        user_id: &str,
        positions: &[usize],
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, ApplicationError> {
        let (_, listed) = self.list_suggestions().await?;
        let picks = positions
            .iter()
            .map(|position| {
                listed
                    .iter()
                    .find(|entry| entry.position == *position)
                    .map(|entry| entry.id.clone())
                    .ok_or_else(|| {
                        DomainError::Validation(format!(
                            "there is no suggestion number {position} (see `suggestions`)"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.cast_vote(user_id, Ballot::from_ranked(picks)?, now).await
    }

    pub async fn cast_vote(
        &self,
        user_id: &str,
        ballot: Ballot,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, ApplicationError> {
        let cycle = self.current_cycle().await?;
        self.engine.ensure_phase(&cycle, Phase::Voting, "vote")?;

        let suggestions = self.repos.suggestions.list_for_cycle(&cycle.id).await?;
        let mut picks = Vec::new();
        for (rank, suggestion_id) in ballot.picks() {
            let (index, suggestion) = suggestions
                .iter()
                .enumerate()
                .find(|(_, suggestion)| &suggestion.id == suggestion_id)
                .ok_or_else(|| DomainError::not_found("suggestion", suggestion_id.0.clone()))?;
            picks.push((rank, ListedSuggestion::from_suggestion(index + 1, suggestion)));
        }

        self.repos
            .votes
            .replace_ballot(&cycle.id, user_id, ballot.into_votes(&cycle.id, user_id, now))
            .await?;

        let votes = self.repos.votes.list_for_cycle(&cycle.id).await?;
        let standings = tally::tally(&suggestions, &votes);
        self.repos.suggestions.update_points(&cycle.id, &tally::point_updates(&standings)).await?;

        info!(event_name = "cycle.vote.cast", cycle_id = %cycle.id, picks = picks.len(), "ballot recorded");
        Ok(VoteReceipt { picks })
    }

    pub async fn results(&self) -> Result<ResultsView, ApplicationError> {
        let cycle = self.current_cycle().await?;
        let suggestions = self.repos.suggestions.list_for_cycle(&cycle.id).await?;
        let votes = self.repos.votes.list_for_cycle(&cycle.id).await?;
        Ok(ResultsView { standings: tally::tally(&suggestions, &votes), cycle })
    }

    pub async fn set_phase(
        &self,
        phase: Phase,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<PhaseChange, ApplicationError> {
        let cycle = self.current_cycle().await?;
        self.manual_transition(&cycle, TransitionRequest::Override(phase), now, ctx).await
    }

    pub async fn advance_phase(
        &self,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<PhaseChange, ApplicationError> {
        let cycle = self.current_cycle().await?;
        self.manual_transition(&cycle, TransitionRequest::Advance, now, ctx).await
    }

    async fn manual_transition(
        &self,
        cycle: &Cycle,
        request: TransitionRequest,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<PhaseChange, ApplicationError> {
        match self.commit_transition(cycle, request, now, ctx).await? {
            CommitResult::Applied(change) => Ok(change),
            CommitResult::Superseded => Err(PhaseTransitionError::Superseded {
                cycle_id: cycle.id.clone(),
                expected: cycle.current_phase,
            }
            .into()),
        }
    }

    /// Plans, writes and announces one transition against a cycle snapshot.
    pub async fn commit_transition(
        &self,
        cycle: &Cycle,
        request: TransitionRequest,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<CommitResult, ApplicationError> {
        let target = self.engine.target(cycle, &request).map_err(|error| {
            self.emit_rejected(cycle, ctx, &error);
            error
        })?;

        let suggestions = if matches!(target, Phase::Reading | Phase::Discussion) {
            self.repos.suggestions.list_for_cycle(&cycle.id).await?
        } else {
            Vec::new()
        };
        let standings = if target == Phase::Reading {
            let votes = self.repos.votes.list_for_cycle(&cycle.id).await?;
            let standings = tally::tally(&suggestions, &votes);
            self.repos
                .suggestions
                .update_points(&cycle.id, &tally::point_updates(&standings))
                .await?;
            standings
        } else {
            Vec::new()
        };

        let outcome = self.engine.apply_with_audit(
            cycle,
            &request,
            &standings,
            now,
            self.audit.as_ref(),
            ctx,
        )?;

        if !self.repos.cycles.apply_transition(&outcome).await? {
            self.audit.emit(
                AuditEvent::new(
                    Some(cycle.id.clone()),
                    ctx.correlation_id.clone(),
                    "phase.transition_superseded",
                    AuditCategory::Phase,
                    ctx.actor.clone(),
                    AuditOutcome::Rejected,
                )
                .with_metadata("expected_phase", cycle.current_phase.as_str()),
            );
            info!(
                event_name = "cycle.phase.superseded",
                correlation_id = %ctx.correlation_id,
                cycle_id = %cycle.id,
                expected_phase = cycle.current_phase.as_str(),
                "phase changed underneath the transition; nothing written"
            );
            return Ok(CommitResult::Superseded);
        }

        let updated = commit(cycle, &outcome);
        let winner = match &updated.winner {
            Some(winner_id) => match standings.iter().find(|s| &s.suggestion.id == winner_id) {
                Some(standing) => {
                    Some(Suggestion { vote_points: standing.points, ..standing.suggestion.clone() })
                }
                None => suggestions.iter().find(|s| &s.id == winner_id).cloned(),
            },
            None => None,
        };

        self.audit.emit(
            AuditEvent::new(
                Some(cycle.id.clone()),
                ctx.correlation_id.clone(),
                "phase.transition_applied",
                AuditCategory::Phase,
                ctx.actor.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("from", outcome.from.as_str())
            .with_metadata("to", outcome.to.as_str()),
        );
        info!(
            event_name = "cycle.phase.advanced",
            correlation_id = %ctx.correlation_id,
            cycle_id = %cycle.id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            winner = winner.as_ref().map(|book| book.id.0.as_str()).unwrap_or("none"),
            "phase transition committed"
        );

        let notified = self.announce(&updated, &outcome, winner.as_ref(), ctx).await;
        Ok(CommitResult::Applied(PhaseChange { cycle: updated, outcome, winner, notified }))
    }

    async fn announce(
        &self,
        cycle: &Cycle,
        outcome: &TransitionOutcome,
        winner: Option<&Suggestion>,
        ctx: &AuditContext,
    ) -> bool {
        let notification = Notification {
            cycle_id: cycle.id.clone(),
            phase: outcome.to,
            text: phase_announcement(cycle, outcome, winner),
        };

        match self.notifier.notify(&notification).await {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    event_name = "cycle.phase.notification_failed",
                    correlation_id = %ctx.correlation_id,
                    cycle_id = %cycle.id,
                    phase = outcome.to.as_str(),
                    error = %error,
                    "phase announcement was not delivered; transition stays committed"
                );
                false
            }
        }
    }

    fn emit_rejected(&self, cycle: &Cycle, ctx: &AuditContext, error: &PhaseTransitionError) {
        self.audit.emit(
            AuditEvent::new(
                Some(cycle.id.clone()),
                ctx.correlation_id.clone(),
                "phase.transition_rejected",
                AuditCategory::Phase,
                ctx.actor.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("error", error.to_string()),
        );
    }

    pub async fn complete_cycle(
        &self,
        now: DateTime<Utc>,
        ctx: &AuditContext,
    ) -> Result<Cycle, ApplicationError> {
        let cycle = self.current_cycle().await?;
        let archived = self.engine.complete(&cycle, now).map_err(|error| {
            self.emit_rejected(&cycle, ctx, &error);
            error
        })?;

        if !self.repos.cycles.archive(&cycle.id, now).await? {
            return Err(PhaseTransitionError::Superseded {
                cycle_id: cycle.id.clone(),
                expected: cycle.current_phase,
            }
            .into());
        }

        self.audit.emit(AuditEvent::new(
            Some(cycle.id.clone()),
            ctx.correlation_id.clone(),
            "cycle.completed",
            AuditCategory::Cycle,
            ctx.actor.clone(),
            AuditOutcome::Success,
        ));
        info!(
            event_name = "cycle.completed",
            correlation_id = %ctx.correlation_id,
            cycle_id = %cycle.id,
            "book club cycle archived"
        );
        Ok(archived)
    }

    pub async fn reset_cycle(&self, ctx: &AuditContext) -> Result<Cycle, ApplicationError> {
        let cycle = self.current_cycle().await?;
        if !self.repos.cycles.delete_cascade(&cycle.id).await? {
            return Err(DomainError::not_found("active cycle", cycle.id.0.clone()).into());
        }

        self.audit.emit(AuditEvent::new(
            Some(cycle.id.clone()),
            ctx.correlation_id.clone(),
            "cycle.reset",
            AuditCategory::Cycle,
            ctx.actor.clone(),
            AuditOutcome::Success,
        ));
        warn!(
            event_name = "cycle.reset",
            correlation_id = %ctx.correlation_id,
            cycle_id = %cycle.id,
            actor = %ctx.actor,
            "active cycle deleted with its suggestions, votes and ratings"
        );
        Ok(cycle)
    }

    pub async fn rate_book(
        &self,
        user_id: &str,
        rating: u8,
        recommend: bool,
        now: DateTime<Utc>,
    ) -> Result<RatingReceipt, ApplicationError> {
        let cycle = self.current_cycle().await?;
        self.engine.ensure_phase(&cycle, Phase::Discussion, "rate the book")?;

        let winner_id = cycle.winner.clone().ok_or_else(|| {
            DomainError::Validation("no book was chosen this cycle, so there is nothing to rate".to_owned())
        })?;
        let book = self
            .repos
            .suggestions
            .find_by_id(&winner_id)
            .await?
            .ok_or_else(|| DomainError::not_found("suggestion", winner_id.0.clone()))?;

        let entry = Rating::new(cycle.id.clone(), user_id, book.id.clone(), rating, recommend, now)?;
        self.repos.ratings.insert(entry).await?;

        let summary = self.rating_summary().await?;
        Ok(RatingReceipt { book, rating, recommend, summary })
    }

    pub async fn rating_summary(&self) -> Result<RatingSummary, ApplicationError> {
        let cycle = self.current_cycle().await?;
        let ratings = self.repos.ratings.list_for_cycle(&cycle.id).await?;
        let for_winner: Vec<Rating> = match &cycle.winner {
            Some(winner) => ratings.into_iter().filter(|r| &r.suggestion_id == winner).collect(),
            None => Vec::new(),
        };
        Ok(RatingSummary::from_ratings(&for_winner))
    }
}
