use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cycle::CycleId;
use crate::domain::suggestion::SuggestionId;
use crate::errors::DomainError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub cycle_id: CycleId,
    pub user_id: String,
    pub suggestion_id: SuggestionId,
    pub rating: u8,
    pub recommend: bool,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        cycle_id: CycleId,
        user_id: impl Into<String>,
        suggestion_id: SuggestionId,
        rating: u8,
        recommend: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(DomainError::Validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING} (got {rating})"
            )));
        }

        Ok(Self {
            id: RatingId(format!("rating-{}", Uuid::new_v4())),
            cycle_id,
            user_id: user_id.into(),
            suggestion_id,
            rating,
            recommend,
            created_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub recommend_count: usize,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }

        let total: u32 = ratings.iter().map(|rating| u32::from(rating.rating)).sum();
        Self {
            count: ratings.len(),
            average: Some(f64::from(total) / ratings.len() as f64),
            recommend_count: ratings.iter().filter(|rating| rating.recommend).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Rating, RatingSummary};
    use crate::domain::cycle::CycleId;
    use crate::domain::suggestion::SuggestionId;
    use crate::errors::DomainError;

    fn rating(user: &str, value: u8, recommend: bool) -> Result<Rating, DomainError> {
        Rating::new(
            CycleId("cycle-1".to_owned()),
            user,
            SuggestionId("sugg-1".to_owned()),
            value,
            recommend,
            Utc::now(),
        )
    }

    #[test]
    fn out_of_range_ratings_are_rejected() {
        assert!(matches!(rating("U1", 0, true), Err(DomainError::Validation(_))));
        assert!(matches!(rating("U1", 11, true), Err(DomainError::Validation(_))));
        assert!(rating("U1", 1, false).is_ok());
        assert!(rating("U1", 10, true).is_ok());
    }

    #[test]
    fn summary_averages_and_counts_recommendations() {
        let ratings = vec![
            rating("U1", 8, true).expect("valid"),
            rating("U2", 5, false).expect("valid"),
            rating("U3", 9, true).expect("valid"),
        ];

        let summary = RatingSummary::from_ratings(&ratings);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.recommend_count, 2);
        assert!((summary.average.expect("average") - 22.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(RatingSummary::from_ratings(&[]).average, None);
    }
}
