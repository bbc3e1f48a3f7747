use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::suggestion::SuggestionId;
use crate::phases::{Phase, PhaseDurations, PhaseTimings};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(pub String);

impl CycleId {
    pub fn generate() -> Self {
        Self(format!("cycle-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Archived,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    pub status: CycleStatus,
    pub current_phase: Phase,
    pub phase_durations: PhaseDurations,
    pub phase_timings: PhaseTimings,
    pub winner: Option<SuggestionId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Cycle {
    /// A fresh active cycle sitting in the suggestion phase.
    pub fn start(name: impl Into<String>, durations: PhaseDurations, now: DateTime<Utc>) -> Self {
        let mut phase_timings = PhaseTimings::default();
        phase_timings.record_start(Phase::Suggestion, now);

        Self {
            id: CycleId::generate(),
            name: name.into(),
            status: CycleStatus::Active,
            current_phase: Phase::Suggestion,
            phase_durations: durations,
            phase_timings,
            winner: None,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CycleStatus::Active
    }

    pub fn current_phase_started_at(&self) -> Option<DateTime<Utc>> {
        self.phase_timings.started_at(self.current_phase)
    }

    pub fn current_phase_deadline(&self) -> Option<DateTime<Utc>> {
        self.current_phase_started_at()
            .map(|started_at| started_at + self.phase_durations.duration(self.current_phase))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Cycle, CycleStatus};
    use crate::phases::{Phase, PhaseDurations};

    #[test]
    fn started_cycle_is_active_in_suggestion_phase() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date");
        let cycle = Cycle::start("Spring", PhaseDurations::default(), now);

        assert!(cycle.id.0.starts_with("cycle-"));
        assert_eq!(cycle.status, CycleStatus::Active);
        assert_eq!(cycle.current_phase, Phase::Suggestion);
        assert_eq!(cycle.current_phase_started_at(), Some(now));
        assert_eq!(cycle.current_phase_deadline(), Some(now + Duration::days(7)));
        assert_eq!(cycle.phase_timings.started_at(Phase::Voting), None);
    }

    #[test]
    fn status_round_trips_through_storage_names() {
        assert_eq!(CycleStatus::parse("ACTIVE"), Some(CycleStatus::Active));
        assert_eq!(CycleStatus::parse(CycleStatus::Archived.as_str()), Some(CycleStatus::Archived));
        assert_eq!(CycleStatus::parse("deleted"), None);
    }
}
