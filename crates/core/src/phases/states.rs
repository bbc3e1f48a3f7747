use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cycle::CycleId;
use crate::domain::suggestion::SuggestionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Suggestion,
    Voting,
    Reading,
    Discussion,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Suggestion, Phase::Voting, Phase::Reading, Phase::Discussion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggestion => "suggestion",
            Self::Voting => "voting",
            Self::Reading => "reading",
            Self::Discussion => "discussion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "suggestion" | "suggestions" => Some(Self::Suggestion),
            "voting" | "vote" => Some(Self::Voting),
            "reading" | "read" => Some(Self::Reading),
            "discussion" | "discuss" => Some(Self::Discussion),
            _ => None,
        }
    }

    /// Next phase in the fixed order; `None` once discussion is reached.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Suggestion => Some(Self::Voting),
            Self::Voting => Some(Self::Reading),
            Self::Reading => Some(Self::Discussion),
            Self::Discussion => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured length of each phase, in whole days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDurations {
    pub suggestion_days: u32,
    pub voting_days: u32,
    pub reading_days: u32,
    pub discussion_days: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self { suggestion_days: 7, voting_days: 7, reading_days: 30, discussion_days: 7 }
    }
}

impl PhaseDurations {
    pub fn days(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Suggestion => self.suggestion_days,
            Phase::Voting => self.voting_days,
            Phase::Reading => self.reading_days,
            Phase::Discussion => self.discussion_days,
        }
    }

    pub fn duration(&self, phase: Phase) -> Duration {
        Duration::days(i64::from(self.days(phase)))
    }
}

/// Start time of every phase the cycle has entered. A `None` slot means the
/// phase has not been entered yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub suggestion: Option<DateTime<Utc>>,
    pub voting: Option<DateTime<Utc>>,
    pub reading: Option<DateTime<Utc>>,
    pub discussion: Option<DateTime<Utc>>,
}

impl PhaseTimings {
    pub fn started_at(&self, phase: Phase) -> Option<DateTime<Utc>> {
        match phase {
            Phase::Suggestion => self.suggestion,
            Phase::Voting => self.voting,
            Phase::Reading => self.reading,
            Phase::Discussion => self.discussion,
        }
    }

    pub fn record_start(&mut self, phase: Phase, started_at: DateTime<Utc>) {
        let slot = match phase {
            Phase::Suggestion => &mut self.suggestion,
            Phase::Voting => &mut self.voting,
            Phase::Reading => &mut self.reading,
            Phase::Discussion => &mut self.discussion,
        };
        *slot = Some(started_at);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionRequest {
    Advance,
    Override(Phase),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseAction {
    AnnouncePhase,
    PinWinner,
    PromptDiscussion,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub cycle_id: CycleId,
    pub from: Phase,
    pub to: Phase,
    pub request: TransitionRequest,
    pub started_at: DateTime<Utc>,
    pub winner: Option<SuggestionId>,
    pub actions: Vec<PhaseAction>,
}

impl TransitionOutcome {
    pub fn pins_winner(&self) -> bool {
        self.actions.contains(&PhaseAction::PinWinner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Phase, PhaseDurations, PhaseTimings};

    #[test]
    fn phases_advance_in_fixed_order() {
        assert_eq!(Phase::Suggestion.next(), Some(Phase::Voting));
        assert_eq!(Phase::Voting.next(), Some(Phase::Reading));
        assert_eq!(Phase::Reading.next(), Some(Phase::Discussion));
        assert_eq!(Phase::Discussion.next(), None);
    }

    #[test]
    fn phase_names_parse_with_aliases() {
        for phase in Phase::ALL {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::parse(" Vote "), Some(Phase::Voting));
        assert_eq!(Phase::parse("finished"), None);
    }

    #[test]
    fn recording_a_start_leaves_other_slots_untouched() {
        let first = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).single().expect("valid date");
        let second = Utc.with_ymd_and_hms(2026, 1, 8, 9, 0, 0).single().expect("valid date");
        let mut timings = PhaseTimings::default();

        timings.record_start(Phase::Suggestion, first);
        timings.record_start(Phase::Voting, second);

        assert_eq!(timings.started_at(Phase::Suggestion), Some(first));
        assert_eq!(timings.started_at(Phase::Voting), Some(second));
        assert_eq!(timings.started_at(Phase::Reading), None);
    }

    #[test]
    fn durations_convert_days() {
        let durations = PhaseDurations { reading_days: 21, ..PhaseDurations::default() };
        assert_eq!(durations.duration(Phase::Reading).num_days(), 21);
        assert_eq!(durations.days(Phase::Suggestion), 7);
    }
}
