use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use bookclub_core::domain::cycle::CycleId;
use bookclub_core::domain::suggestion::{Suggestion, SuggestionId};

use super::{parse_timestamp, RepositoryError, SuggestionRepository};
use crate::DbPool;

pub struct SqlSuggestionRepository {
    pool: DbPool,
}

impl SqlSuggestionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn suggestion_from_row(row: &SqliteRow) -> Result<Suggestion, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let vote_points: i64 = row.try_get("vote_points")?;

    Ok(Suggestion {
        id: SuggestionId(row.try_get("id")?),
        cycle_id: CycleId(row.try_get("cycle_id")?),
        user_id: row.try_get("user_id")?,
        book_name: row.try_get("book_name")?,
        author: row.try_get("author")?,
        link: row.try_get("link")?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        vote_points: u32::try_from(vote_points).map_err(|_| {
            RepositoryError::Decode(format!("vote_points: invalid total {vote_points}"))
        })?,
        sequence: row.try_get("seq")?,
    })
}

#[async_trait::async_trait]
impl SuggestionRepository for SqlSuggestionRepository {
    async fn insert(&self, suggestion: Suggestion) -> Result<Suggestion, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO suggestions (id, cycle_id, user_id, book_name, author, link, notes,
                                      vote_points, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&suggestion.id.0)
        .bind(&suggestion.cycle_id.0)
        .bind(&suggestion.user_id)
        .bind(&suggestion.book_name)
        .bind(&suggestion.author)
        .bind(&suggestion.link)
        .bind(&suggestion.notes)
        .bind(i64::from(suggestion.vote_points))
        .bind(suggestion.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Suggestion { sequence: result.last_insert_rowid(), ..suggestion })
    }

    async fn find_by_id(&self, id: &SuggestionId) -> Result<Option<Suggestion>, RepositoryError> {
        let row = sqlx::query(
            "SELECT seq, id, cycle_id, user_id, book_name, author, link, notes, vote_points,
                    created_at
             FROM suggestions WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(suggestion_from_row).transpose()
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Suggestion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT seq, id, cycle_id, user_id, book_name, author, link, notes, vote_points,
                    created_at
             FROM suggestions WHERE cycle_id = ?
             ORDER BY seq ASC",
        )
        .bind(&cycle_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(suggestion_from_row).collect()
    }

    async fn update_points(
        &self,
        cycle_id: &CycleId,
        points: &[(SuggestionId, u32)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (suggestion_id, total) in points {
            sqlx::query("UPDATE suggestions SET vote_points = ? WHERE id = ? AND cycle_id = ?")
                .bind(i64::from(*total))
                .bind(&suggestion_id.0)
                .bind(&cycle_id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
