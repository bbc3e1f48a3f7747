use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cycle::CycleId;
use crate::domain::suggestion::SuggestionId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    First,
    Second,
    Third,
}

impl Rank {
    pub fn points(&self) -> u32 {
        match self {
            Self::First => 3,
            Self::Second => 2,
            Self::Third => 1,
        }
    }

    pub fn position(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }

    pub fn from_position(position: u8) -> Result<Self, DomainError> {
        match position {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            other => Err(DomainError::Validation(format!("vote rank must be 1, 2 or 3 (got {other})"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub cycle_id: CycleId,
    pub voter_id: String,
    pub suggestion_id: SuggestionId,
    pub rank: Rank,
    pub created_at: DateTime<Utc>,
}

/// One member's ranked picks. The first pick is mandatory and picks are distinct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    picks: Vec<SuggestionId>,
}

impl Ballot {
    pub fn new(
        first: SuggestionId,
        second: Option<SuggestionId>,
        third: Option<SuggestionId>,
    ) -> Result<Self, DomainError> {
        if second.is_none() && third.is_some() {
            return Err(DomainError::Validation(
                "a third choice requires a second choice".to_owned(),
            ));
        }

        let picks: Vec<SuggestionId> = [Some(first), second, third].into_iter().flatten().collect();
        for (index, pick) in picks.iter().enumerate() {
            if picks[..index].contains(pick) {
                return Err(DomainError::Validation(
                    "each ranked choice must name a different book".to_owned(),
                ));
            }
        }

        Ok(Self { picks })
    }

    pub fn from_ranked(picks: Vec<SuggestionId>) -> Result<Self, DomainError> {
        let mut picks = picks.into_iter();
        let first = picks
            .next()
            .ok_or_else(|| DomainError::Validation("a ballot needs a first choice".to_owned()))?;
        let second = picks.next();
        let third = picks.next();
        if picks.next().is_some() {
            return Err(DomainError::Validation("a ballot holds at most three choices".to_owned()));
        }
        Self::new(first, second, third)
    }

    pub fn picks(&self) -> impl Iterator<Item = (Rank, &SuggestionId)> {
        [Rank::First, Rank::Second, Rank::Third].into_iter().zip(self.picks.iter())
    }

    pub fn into_votes(self, cycle_id: &CycleId, voter_id: &str, now: DateTime<Utc>) -> Vec<Vote> {
        [Rank::First, Rank::Second, Rank::Third]
            .into_iter()
            .zip(self.picks)
            .map(|(rank, suggestion_id)| Vote {
                id: VoteId(format!("vote-{}", Uuid::new_v4())),
                cycle_id: cycle_id.clone(),
                voter_id: voter_id.to_owned(),
                suggestion_id,
                rank,
                created_at: now,
            })
            .collect()
    }
}
