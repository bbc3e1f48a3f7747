use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use bookclub_core::domain::cycle::CycleId;
use bookclub_core::domain::suggestion::SuggestionId;
use bookclub_core::domain::vote::{Rank, Vote, VoteId};

use super::{parse_timestamp, RepositoryError, VoteRepository};
use crate::DbPool;

pub struct SqlVoteRepository {
    pool: DbPool,
}

impl SqlVoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn vote_from_row(row: &SqliteRow) -> Result<Vote, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let rank: i64 = row.try_get("rank")?;
    let rank = u8::try_from(rank)
        .ok()
        .and_then(|position| Rank::from_position(position).ok())
        .ok_or_else(|| RepositoryError::Decode(format!("rank: invalid position {rank}")))?;

    Ok(Vote {
        id: VoteId(row.try_get("id")?),
        cycle_id: CycleId(row.try_get("cycle_id")?),
        voter_id: row.try_get("voter_id")?,
        suggestion_id: SuggestionId(row.try_get("suggestion_id")?),
        rank,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl VoteRepository for SqlVoteRepository {
    async fn replace_ballot(
        &self,
        cycle_id: &CycleId,
        voter_id: &str,
        votes: Vec<Vote>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM votes WHERE cycle_id = ? AND voter_id = ?")
            .bind(&cycle_id.0)
            .bind(voter_id)
            .execute(&mut *tx)
            .await?;

        for vote in &votes {
            sqlx::query(
                "INSERT INTO votes (id, cycle_id, voter_id, suggestion_id, rank, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&vote.id.0)
            .bind(&cycle_id.0)
            .bind(voter_id)
            .bind(&vote.suggestion_id.0)
            .bind(i64::from(vote.rank.position()))
            .bind(vote.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Vote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, cycle_id, voter_id, suggestion_id, rank, created_at
             FROM votes WHERE cycle_id = ?
             ORDER BY voter_id ASC, rank ASC",
        )
        .bind(&cycle_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(vote_from_row).collect()
    }
}
