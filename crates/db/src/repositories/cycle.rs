use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use bookclub_core::domain::cycle::{Cycle, CycleId, CycleStatus};
use bookclub_core::domain::suggestion::SuggestionId;
use bookclub_core::phases::{Phase, PhaseDurations, PhaseTimings, TransitionOutcome};

use super::{
    is_unique_violation, parse_optional_timestamp, parse_timestamp, CreateCycleOutcome,
    CycleRepository, RepositoryError,
};
use crate::DbPool;

const CYCLE_COLUMNS: &str = "id, name, status, current_phase,
    suggestion_days, voting_days, reading_days, discussion_days,
    suggestion_started_at, voting_started_at, reading_started_at, discussion_started_at,
    winner_suggestion_id, created_at, completed_at";

pub struct SqlCycleRepository {
    pool: DbPool,
}

impl SqlCycleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn active_cycle_exists(
        &self,
        cause: Option<sqlx::Error>,
    ) -> Result<CreateCycleOutcome, RepositoryError> {
        match (self.find_active().await?, cause) {
            (Some(existing), _) => Ok(CreateCycleOutcome::ActiveCycleExists(existing.id)),
            (None, Some(error)) => Err(RepositoryError::Database(error)),
            (None, None) => Err(RepositoryError::Conflict(
                "an active cycle blocked the insert but could not be found".to_owned(),
            )),
        }
    }
}

fn started_at_column(phase: Phase) -> &'static str {
    match phase {
        Phase::Suggestion => "suggestion_started_at",
        Phase::Voting => "voting_started_at",
        Phase::Reading => "reading_started_at",
        Phase::Discussion => "discussion_started_at",
    }
}

fn days_from_row(row: &SqliteRow, column: &str) -> Result<u32, RepositoryError> {
    let days: i64 = row.try_get(column)?;
    u32::try_from(days)
        .map_err(|_| RepositoryError::Decode(format!("{column}: invalid day count {days}")))
}

fn cycle_from_row(row: &SqliteRow) -> Result<Cycle, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = CycleStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown cycle status `{status_raw}`")))?;
    let phase_raw: String = row.try_get("current_phase")?;
    let current_phase = Phase::parse(&phase_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown phase `{phase_raw}`")))?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Cycle {
        id: CycleId(row.try_get("id")?),
        name: row.try_get("name")?,
        status,
        current_phase,
        phase_durations: PhaseDurations {
            suggestion_days: days_from_row(row, "suggestion_days")?,
            voting_days: days_from_row(row, "voting_days")?,
            reading_days: days_from_row(row, "reading_days")?,
            discussion_days: days_from_row(row, "discussion_days")?,
        },
        phase_timings: PhaseTimings {
            suggestion: parse_optional_timestamp(
                "suggestion_started_at",
                row.try_get("suggestion_started_at")?,
            )?,
            voting: parse_optional_timestamp("voting_started_at", row.try_get("voting_started_at")?)?,
            reading: parse_optional_timestamp(
                "reading_started_at",
                row.try_get("reading_started_at")?,
            )?,
            discussion: parse_optional_timestamp(
                "discussion_started_at",
                row.try_get("discussion_started_at")?,
            )?,
        },
        winner: row.try_get::<Option<String>, _>("winner_suggestion_id")?.map(SuggestionId),
        created_at: parse_timestamp("created_at", &created_at)?,
        completed_at: parse_optional_timestamp("completed_at", row.try_get("completed_at")?)?,
    })
}

#[async_trait::async_trait]
impl CycleRepository for SqlCycleRepository {
    async fn find_by_id(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CYCLE_COLUMNS} FROM cycles WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(cycle_from_row).transpose()
    }

    async fn find_active(&self) -> Result<Option<Cycle>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE status = 'active'
             ORDER BY created_at ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(cycle_from_row).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Cycle>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE status = 'active' ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(cycle_from_row).collect()
    }

    /// Guarded create: the insert only lands while no cycle is active, and the
    /// partial unique index backs it up against concurrent starts.
    async fn create_active(&self, cycle: Cycle) -> Result<CreateCycleOutcome, RepositoryError> {
        let timings = cycle.phase_timings;
        let result = sqlx::query(
            "INSERT INTO cycles (id, name, status, current_phase,
                suggestion_days, voting_days, reading_days, discussion_days,
                suggestion_started_at, voting_started_at, reading_started_at, discussion_started_at,
                winner_suggestion_id, created_at, completed_at)
             SELECT ?, ?, 'active', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL
             WHERE NOT EXISTS (SELECT 1 FROM cycles WHERE status = 'active')",
        )
        .bind(&cycle.id.0)
        .bind(&cycle.name)
        .bind(cycle.current_phase.as_str())
        .bind(i64::from(cycle.phase_durations.suggestion_days))
        .bind(i64::from(cycle.phase_durations.voting_days))
        .bind(i64::from(cycle.phase_durations.reading_days))
        .bind(i64::from(cycle.phase_durations.discussion_days))
        .bind(timings.suggestion.map(|at| at.to_rfc3339()))
        .bind(timings.voting.map(|at| at.to_rfc3339()))
        .bind(timings.reading.map(|at| at.to_rfc3339()))
        .bind(timings.discussion.map(|at| at.to_rfc3339()))
        .bind(cycle.winner.as_ref().map(|winner| winner.0.clone()))
        .bind(cycle.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(CreateCycleOutcome::Created(cycle)),
            // Either the guard held or another start won the race; report the winner.
            Ok(_) => self.active_cycle_exists(None).await,
            Err(error) if is_unique_violation(&error) => self.active_cycle_exists(Some(error)).await,
            Err(error) => Err(error.into()),
        }
    }

    async fn apply_transition(&self, outcome: &TransitionOutcome) -> Result<bool, RepositoryError> {
        let column = started_at_column(outcome.to);
        let result = sqlx::query(&format!(
            "UPDATE cycles
             SET current_phase = ?,
                 {column} = ?,
                 winner_suggestion_id = CASE WHEN ? THEN ? ELSE winner_suggestion_id END
             WHERE id = ? AND status = 'active' AND current_phase = ?"
        ))
        .bind(outcome.to.as_str())
        .bind(outcome.started_at.to_rfc3339())
        .bind(outcome.pins_winner())
        .bind(outcome.winner.as_ref().map(|winner| winner.0.clone()))
        .bind(&outcome.cycle_id.0)
        .bind(outcome.from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn archive(
        &self,
        id: &CycleId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE cycles SET status = 'archived', completed_at = ?
             WHERE id = ? AND status = 'active' AND current_phase = 'discussion'",
        )
        .bind(completed_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_cascade(&self, id: &CycleId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Explicit deletes keep the cascade intact even if foreign keys are off.
        sqlx::query("DELETE FROM ratings WHERE cycle_id = ?").bind(&id.0).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM votes WHERE cycle_id = ?").bind(&id.0).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM suggestions WHERE cycle_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;
        let deleted =
            sqlx::query("DELETE FROM cycles WHERE id = ?").bind(&id.0).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use bookclub_core::domain::cycle::{Cycle, CycleStatus};
    use bookclub_core::domain::suggestion::SuggestionId;
    use bookclub_core::phases::{
        Phase, PhaseDurations, PhaseEngine, TransitionOutcome, TransitionRequest,
    };

    use super::SqlCycleRepository;
    use crate::repositories::{CreateCycleOutcome, CycleRepository};
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 8, 30, 0).single().expect("valid date")
    }

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        pool
    }

    fn advance(cycle: &Cycle, now: DateTime<Utc>) -> TransitionOutcome {
        PhaseEngine::new().apply(cycle, &TransitionRequest::Advance, &[], now).expect("plan")
    }

    #[tokio::test]
    async fn create_and_reload_preserves_cycle_fields() {
        let repo = SqlCycleRepository::new(pool().await);
        let durations = PhaseDurations { suggestion_days: 3, voting_days: 4, reading_days: 21, discussion_days: 5 };
        let cycle = Cycle::start("May", durations, at(1));

        let created = repo.create_active(cycle.clone()).await.expect("create");
        assert_eq!(created, CreateCycleOutcome::Created(cycle.clone()));

        let found = repo.find_by_id(&cycle.id).await.expect("find").expect("present");
        assert_eq!(found, cycle);
        assert_eq!(repo.find_active().await.expect("active").map(|c| c.id), Some(cycle.id));
    }

    #[tokio::test]
    async fn second_active_cycle_is_refused() {
        let repo = SqlCycleRepository::new(pool().await);
        let first = Cycle::start("May", PhaseDurations::default(), at(1));
        repo.create_active(first.clone()).await.expect("create first");

        let second = repo
            .create_active(Cycle::start("June", PhaseDurations::default(), at(2)))
            .await
            .expect("create second");

        assert_eq!(second, CreateCycleOutcome::ActiveCycleExists(first.id));
        assert_eq!(repo.list_active().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn transition_applies_once_then_loses_the_race() {
        let repo = SqlCycleRepository::new(pool().await);
        let cycle = Cycle::start("May", PhaseDurations::default(), at(1));
        repo.create_active(cycle.clone()).await.expect("create");

        let outcome = advance(&cycle, at(8));
        assert!(repo.apply_transition(&outcome).await.expect("first write"));
        assert!(!repo.apply_transition(&outcome).await.expect("second write"));

        let stored = repo.find_by_id(&cycle.id).await.expect("find").expect("present");
        assert_eq!(stored.current_phase, Phase::Voting);
        assert_eq!(stored.phase_timings.voting, Some(at(8)));
        assert_eq!(stored.phase_timings.suggestion, Some(at(1)));
    }

    #[tokio::test]
    async fn winner_is_written_only_when_entering_reading() {
        let repo = SqlCycleRepository::new(pool().await);
        let mut cycle = Cycle::start("May", PhaseDurations::default(), at(1));
        cycle.current_phase = Phase::Voting;
        cycle.phase_timings.voting = Some(at(8));
        repo.create_active(cycle.clone()).await.expect("create");

        let mut to_reading = advance(&cycle, at(15));
        to_reading.winner = Some(SuggestionId("sugg-dune".to_owned()));
        assert!(repo.apply_transition(&to_reading).await.expect("reading"));

        let reading = repo.find_by_id(&cycle.id).await.expect("find").expect("present");
        assert_eq!(reading.winner, Some(SuggestionId("sugg-dune".to_owned())));

        let to_discussion = advance(&reading, at(15) + Duration::days(30));
        assert!(repo.apply_transition(&to_discussion).await.expect("discussion"));
        let discussion = repo.find_by_id(&cycle.id).await.expect("find").expect("present");
        assert_eq!(discussion.winner, Some(SuggestionId("sugg-dune".to_owned())));
    }

    #[tokio::test]
    async fn archive_requires_discussion_and_frees_the_active_slot() {
        let repo = SqlCycleRepository::new(pool().await);
        let cycle = Cycle::start("May", PhaseDurations::default(), at(1));
        repo.create_active(cycle.clone()).await.expect("create");

        assert!(!repo.archive(&cycle.id, at(3)).await.expect("archive from suggestion"));

        let outcome = PhaseEngine::new()
            .apply(&cycle, &TransitionRequest::Override(Phase::Discussion), &[], at(4))
            .expect("plan");
        assert!(repo.apply_transition(&outcome).await.expect("override"));

        assert!(repo.archive(&cycle.id, at(5)).await.expect("archive"));
        let archived = repo.find_by_id(&cycle.id).await.expect("find").expect("present");
        assert_eq!(archived.status, CycleStatus::Archived);
        assert_eq!(archived.completed_at, Some(at(5)));
        assert!(repo.find_active().await.expect("active").is_none());

        let next = repo
            .create_active(Cycle::start("June", PhaseDurations::default(), at(6)))
            .await
            .expect("create next");
        assert!(matches!(next, CreateCycleOutcome::Created(_)));
    }

    #[tokio::test]
    async fn archived_cycle_ignores_transitions() {
        let repo = SqlCycleRepository::new(pool().await);
        let mut cycle = Cycle::start("May", PhaseDurations::default(), at(1));
        cycle.current_phase = Phase::Discussion;
        cycle.phase_timings.discussion = Some(at(1));
        repo.create_active(cycle.clone()).await.expect("create");
        assert!(repo.archive(&cycle.id, at(2)).await.expect("archive"));

        let outcome = PhaseEngine::new()
            .apply(&cycle, &TransitionRequest::Override(Phase::Voting), &[], at(3))
            .expect("plan against stale copy");
        assert!(!repo.apply_transition(&outcome).await.expect("write"));
    }

    #[tokio::test]
    async fn delete_cascade_removes_the_cycle() {
        let repo = SqlCycleRepository::new(pool().await);
        let cycle = Cycle::start("May", PhaseDurations::default(), at(1));
        repo.create_active(cycle.clone()).await.expect("create");

        assert!(repo.delete_cascade(&cycle.id).await.expect("delete"));
        assert!(!repo.delete_cascade(&cycle.id).await.expect("delete again"));
        assert!(repo.find_by_id(&cycle.id).await.expect("find").is_none());
    }
}
