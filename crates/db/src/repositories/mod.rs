use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use bookclub_core::domain::cycle::{Cycle, CycleId};
use bookclub_core::domain::rating::Rating;
use bookclub_core::domain::suggestion::{Suggestion, SuggestionId};
use bookclub_core::domain::vote::Vote;
use bookclub_core::errors::{ApplicationError, DomainError};
use bookclub_core::phases::TransitionOutcome;

use crate::DbPool;

pub mod cycle;
pub mod memory;
pub mod rating;
pub mod suggestion;
pub mod vote;

pub use cycle::SqlCycleRepository;
pub use memory::InMemoryBookClubStore;
pub use rating::SqlRatingRepository;
pub use suggestion::SqlSuggestionRepository;
pub use vote::SqlVoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) => {
                ApplicationError::Domain(DomainError::Validation(message))
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateCycleOutcome {
    Created(Cycle),
    ActiveCycleExists(CycleId),
}

#[async_trait]
pub trait CycleRepository: Send + Sync {
    async fn find_by_id(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError>;

    async fn find_active(&self) -> Result<Option<Cycle>, RepositoryError>;

    /// Every active cycle, oldest first. The schema allows at most one, but
    /// the scheduler iterates so it never depends on that.
    async fn list_active(&self) -> Result<Vec<Cycle>, RepositoryError>;

    async fn create_active(&self, cycle: Cycle) -> Result<CreateCycleOutcome, RepositoryError>;

    /// Conditionally writes a planned transition. Applies only when the cycle
    /// is still active and still in `outcome.from`; returns whether it did.
    async fn apply_transition(&self, outcome: &TransitionOutcome) -> Result<bool, RepositoryError>;

    /// Archives an active cycle sitting in discussion. Returns whether it did.
    async fn archive(
        &self,
        id: &CycleId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Removes a cycle with its suggestions, votes and ratings.
    async fn delete_cascade(&self, id: &CycleId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    /// Stores a suggestion and returns it with its submission sequence assigned.
    async fn insert(&self, suggestion: Suggestion) -> Result<Suggestion, RepositoryError>;

    async fn find_by_id(&self, id: &SuggestionId) -> Result<Option<Suggestion>, RepositoryError>;

    /// Suggestions of a cycle in submission order.
    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Suggestion>, RepositoryError>;

    async fn update_points(
        &self,
        cycle_id: &CycleId,
        points: &[(SuggestionId, u32)],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Atomically swaps a member's whole ballot for the given votes.
    async fn replace_ballot(
        &self,
        cycle_id: &CycleId,
        voter_id: &str,
        votes: Vec<Vote>,
    ) -> Result<(), RepositoryError>;

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Vote>, RepositoryError>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Fails with `Conflict` when the member already rated that book in the cycle.
    async fn insert(&self, rating: Rating) -> Result<(), RepositoryError>;

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Rating>, RepositoryError>;
}

#[derive(Clone)]
pub struct RepositorySet {
    pub cycles: Arc<dyn CycleRepository>,
    pub suggestions: Arc<dyn SuggestionRepository>,
    pub votes: Arc<dyn VoteRepository>,
    pub ratings: Arc<dyn RatingRepository>,
}

impl RepositorySet {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            cycles: Arc::new(SqlCycleRepository::new(pool.clone())),
            suggestions: Arc::new(SqlSuggestionRepository::new(pool.clone())),
            votes: Arc::new(SqlVoteRepository::new(pool.clone())),
            ratings: Arc::new(SqlRatingRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryBookClubStore::default());
        Self {
            cycles: store.clone(),
            suggestions: store.clone(),
            votes: store.clone(),
            ratings: store,
        }
    }
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_timestamp(column, &raw)).transpose()
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}
