use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use bookclub_core::domain::cycle::CycleId;
use bookclub_core::domain::rating::{Rating, RatingId};
use bookclub_core::domain::suggestion::SuggestionId;

use super::{is_unique_violation, parse_timestamp, RatingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRatingRepository {
    pool: DbPool,
}

impl SqlRatingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn rating_from_row(row: &SqliteRow) -> Result<Rating, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let value: i64 = row.try_get("rating")?;

    Ok(Rating {
        id: RatingId(row.try_get("id")?),
        cycle_id: CycleId(row.try_get("cycle_id")?),
        user_id: row.try_get("user_id")?,
        suggestion_id: SuggestionId(row.try_get("suggestion_id")?),
        rating: u8::try_from(value)
            .map_err(|_| RepositoryError::Decode(format!("rating: invalid value {value}")))?,
        recommend: row.try_get("recommend")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl RatingRepository for SqlRatingRepository {
    async fn insert(&self, rating: Rating) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO ratings (id, cycle_id, user_id, suggestion_id, rating, recommend, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rating.id.0)
        .bind(&rating.cycle_id.0)
        .bind(&rating.user_id)
        .bind(&rating.suggestion_id.0)
        .bind(i64::from(rating.rating))
        .bind(rating.recommend)
        .bind(rating.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Conflict(
                "you have already rated this book".to_owned(),
            )),
            Err(error) => Err(error.into()),
        }
    }

    async fn list_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Rating>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, cycle_id, user_id, suggestion_id, rating, recommend, created_at
             FROM ratings WHERE cycle_id = ?
             ORDER BY created_at ASC",
        )
        .bind(&cycle_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rating_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use bookclub_core::domain::cycle::Cycle;
    use bookclub_core::domain::rating::Rating;
    use bookclub_core::domain::suggestion::{Suggestion, SuggestionInput};
    use bookclub_core::phases::PhaseDurations;

    use super::SqlRatingRepository;
    use crate::repositories::{
        CycleRepository, RatingRepository, RepositoryError, SqlCycleRepository,
        SqlSuggestionRepository, SuggestionRepository,
    };
    use crate::{connect_with_settings, migrations::run_pending};

    #[tokio::test]
    async fn duplicate_rating_is_a_conflict() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let now = Utc.with_ymd_and_hms(2026, 6, 20, 18, 0, 0).single().expect("valid date");
        let cycle = Cycle::start("June", PhaseDurations::default(), now);
        SqlCycleRepository::new(pool.clone()).create_active(cycle.clone()).await.expect("cycle");
        let book = SqlSuggestionRepository::new(pool.clone())
            .insert(
                Suggestion::new(
                    cycle.id.clone(),
                    "U0",
                    SuggestionInput {
                        book_name: "Dune".to_owned(),
                        author: "Frank Herbert".to_owned(),
                        ..SuggestionInput::default()
                    },
                    now,
                )
                .expect("valid"),
            )
            .await
            .expect("insert");

        let repo = SqlRatingRepository::new(pool);
        let rating = |value| {
            Rating::new(cycle.id.clone(), "U1", book.id.clone(), value, true, now).expect("valid")
        };
        repo.insert(rating(8)).await.expect("first rating");
        let duplicate = repo.insert(rating(3)).await;

        assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));
        let stored = repo.list_for_cycle(&cycle.id).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rating, 8);
        assert!(stored[0].recommend);
    }
}
