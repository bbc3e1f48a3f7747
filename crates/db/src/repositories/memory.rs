use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bookclub_core::domain::cycle::{Cycle, CycleId, CycleStatus};
use bookclub_core::domain::rating::Rating;
use bookclub_core::domain::suggestion::{Suggestion, SuggestionId};
use bookclub_core::domain::vote::Vote;
use bookclub_core::phases::{Phase, TransitionOutcome};

use super::{
    CreateCycleOutcome, CycleRepository, RatingRepository, RepositoryError, SuggestionRepository,
    VoteRepository,
};

#[derive(Default)]
struct StoreState {
    cycles: Vec<Cycle>,
    suggestions: Vec<Suggestion>,
    votes: Vec<Vote>,
    ratings: Vec<Rating>,
    next_sequence: i64,
}

/// One lock over every collection, so each trait method is as atomic as its
/// SQL counterpart.
#[derive(Default)]
pub struct InMemoryBookClubStore {
    state: RwLock<StoreState>,
}

#[async_trait::async_trait]
impl CycleRepository for InMemoryBookClubStore {
    async fn find_by_id(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.cycles.iter().find(|cycle| &cycle.id == id).cloned())
    }

    async fn find_active(&self) -> Result<Option<Cycle>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.cycles.iter().find(|cycle| cycle.is_active()).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Cycle>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.cycles.iter().filter(|cycle| cycle.is_active()).cloned().collect())
    }

    async fn create_active(&self, cycle: Cycle) -> Result<CreateCycleOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.cycles.iter().find(|cycle| cycle.is_active()) {
            return Ok(CreateCycleOutcome::ActiveCycleExists(existing.id.clone()));
        }
        state.cycles.push(cycle.clone());
        Ok(CreateCycleOutcome::Created(cycle))
    }

    async fn apply_transition(&self, outcome: &TransitionOutcome) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(cycle) = state.cycles.iter_mut().find(|cycle| {
            cycle.id == outcome.cycle_id
                && cycle.is_active()
                && cycle.current_phase == outcome.from
        }) else {
            return Ok(false);
        };

        cycle.current_phase = outcome.to;
        cycle.phase_timings.record_start(outcome.to, outcome.started_at);
        if outcome.pins_winner() {
            cycle.winner = outcome.winner.clone();
        }
        Ok(true)
    }

    async fn archive(
        &self,
        id: &CycleId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(cycle) = state.cycles.iter_mut().find(|cycle| {
            &cycle.id == id && cycle.is_active() && cycle.current_phase == Phase::Discussion
        }) else {
            return Ok(false);
        };

        cycle.status = CycleStatus::Archived;
        cycle.completed_at = Some(completed_at);
        Ok(true)
    }

    async fn delete_cascade(&self, id: &CycleId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.cycles.len();
        state.cycles.retain(|cycle| &cycle.id != id);
        state.suggestions.retain(|suggestion| &suggestion.cycle_id != id);
        state.votes.retain(|vote| &vote.cycle_id != id);
        state.ratings.retain(|rating| &rating.cycle_id != id);
        Ok(state.cycles.len() < before)
    }
}

#[async_trait::async_trait]
impl SuggestionRepository for InMemoryBookClubStore {
    async fn insert(&self, suggestion: Suggestion) -> Result<Suggestion, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.cycles.iter().any(|cycle| cycle.id == suggestion.cycle_id) {
            return Err(RepositoryError::Conflict(format!(
                "cycle {} does not exist",
                suggestion.cycle_id
            )));
        }

        state.next_sequence += 1;
        let stored = Suggestion { sequence: state.next_sequence, ..suggestion };
        state.suggestions.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &SuggestionId) -> Result<Option<Suggestion>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.suggestions.iter().find(|suggestion| &suggestion.id == id).cloned())
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Suggestion>, RepositoryError> {
        let state = self.state.read().await;
        let mut suggestions: Vec<Suggestion> = state
            .suggestions
            .iter()
            .filter(|suggestion| &suggestion.cycle_id == cycle_id)
            .cloned()
            .collect();
        suggestions.sort_by_key(|suggestion| suggestion.sequence);
        Ok(suggestions)
    }

    async fn update_points(
        &self,
        cycle_id: &CycleId,
        points: &[(SuggestionId, u32)],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        for (suggestion_id, total) in points {
            if let Some(suggestion) = state.suggestions.iter_mut().find(|suggestion| {
                &suggestion.id == suggestion_id && &suggestion.cycle_id == cycle_id
            }) {
                suggestion.vote_points = *total;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VoteRepository for InMemoryBookClubStore {
    async fn replace_ballot(
        &self,
        cycle_id: &CycleId,
        voter_id: &str,
        votes: Vec<Vote>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.votes.retain(|vote| !(&vote.cycle_id == cycle_id && vote.voter_id == voter_id));
        state.votes.extend(votes);
        Ok(())
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Vote>, RepositoryError> {
        let state = self.state.read().await;
        let mut votes: Vec<Vote> =
            state.votes.iter().filter(|vote| &vote.cycle_id == cycle_id).cloned().collect();
        votes.sort_by(|left, right| {
            left.voter_id.cmp(&right.voter_id).then_with(|| left.rank.cmp(&right.rank))
        });
        Ok(votes)
    }
}

#[async_trait::async_trait]
impl RatingRepository for InMemoryBookClubStore {
    async fn insert(&self, rating: Rating) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let duplicate = state.ratings.iter().any(|existing| {
            existing.cycle_id == rating.cycle_id
                && existing.user_id == rating.user_id
                && existing.suggestion_id == rating.suggestion_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict("you have already rated this book".to_owned()));
        }
        state.ratings.push(rating);
        Ok(())
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Rating>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.ratings.iter().filter(|rating| &rating.cycle_id == cycle_id).cloned().collect())
    }
}
