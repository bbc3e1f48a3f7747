//! Channel copy for phase changes.

use chrono::{DateTime, Utc};

use bookclub_core::domain::cycle::Cycle;
use bookclub_core::domain::suggestion::Suggestion;
use bookclub_core::phases::{Phase, TransitionOutcome};

fn deadline_label(cycle: &Cycle, phase: Phase, started_at: DateTime<Utc>) -> String {
    (started_at + cycle.phase_durations.duration(phase)).format("%A %-d %B").to_string()
}

/// Text posted to the club channel after `outcome` has been committed.
/// `cycle` is the state after the transition; `winner` is the pinned book.
pub fn phase_announcement(
    cycle: &Cycle,
    outcome: &TransitionOutcome,
    winner: Option<&Suggestion>,
) -> String {
    let deadline = deadline_label(cycle, outcome.to, outcome.started_at);
    match outcome.to {
        Phase::Suggestion => format!(
            "Suggestions are open for *{}*. Propose a book with \
             `/bookclub suggest Title | Author` before {deadline}.",
            cycle.name
        ),
        Phase::Voting => format!(
            "Voting is open for *{}*. See `/bookclub suggestions`, then rank up to three \
             books with `/bookclub vote 1 2 3`. Voting closes {deadline}.",
            cycle.name
        ),
        Phase::Reading => match winner {
            Some(book) => {
                let mut text = format!(
                    "The votes are in for *{}*! We're reading *{}* by {} ({} points). \
                     Reading runs until {deadline}.",
                    cycle.name, book.book_name, book.author, book.vote_points
                );
                if let Some(link) = &book.link {
                    text.push_str(&format!("\n{link}"));
                }
                text
            }
            None => format!(
                "Reading has started for *{}*, but no book was suggested this cycle.",
                cycle.name
            ),
        },
        Phase::Discussion => {
            let book = winner
                .map(|book| format!("*{}* by {}", book.book_name, book.author))
                .unwrap_or_else(|| "this cycle's book".to_owned());
            format!(
                "Time to talk about {book}! What stayed with you? Share your thoughts here \
                 and rate it with `/bookclub rate <1-10> [yes|no]`."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use bookclub_core::domain::cycle::{Cycle, CycleId};
    use bookclub_core::domain::suggestion::{Suggestion, SuggestionId};
    use bookclub_core::phases::{
        Phase, PhaseAction, PhaseDurations, TransitionOutcome, TransitionRequest,
    };

    use super::phase_announcement;

    fn outcome(to: Phase) -> TransitionOutcome {
        TransitionOutcome {
            cycle_id: CycleId("cycle-1".to_owned()),
            from: Phase::Voting,
            to,
            request: TransitionRequest::Advance,
            started_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid date"),
            winner: None,
            actions: vec![PhaseAction::AnnouncePhase],
        }
    }

    fn dune() -> Suggestion {
        Suggestion {
            id: SuggestionId("sugg-dune".to_owned()),
            cycle_id: CycleId("cycle-1".to_owned()),
            user_id: "U-secret".to_owned(),
            book_name: "Dune".to_owned(),
            author: "Frank Herbert".to_owned(),
            link: Some("https://example.org/dune".to_owned()),
            notes: None,
            created_at: Utc::now(),
            vote_points: 5,
            sequence: 1,
        }
    }

    #[test]
    fn reading_announcement_names_the_winner_but_not_the_proposer() {
        let cycle = Cycle::start("Spring", PhaseDurations::default(), Utc::now());
        let text = phase_announcement(&cycle, &outcome(Phase::Reading), Some(&dune()));

        assert!(text.contains("*Dune* by Frank Herbert"));
        assert!(text.contains("5 points"));
        assert!(text.contains("https://example.org/dune"));
        assert!(!text.contains("U-secret"));
    }

    #[test]
    fn voting_announcement_carries_the_deadline() {
        let cycle = Cycle::start("Spring", PhaseDurations::default(), Utc::now());
        let text = phase_announcement(&cycle, &outcome(Phase::Voting), None);

        assert!(text.contains("Voting is open for *Spring*"));
        assert!(text.contains("Monday 9 March"));
    }

    #[test]
    fn discussion_prompt_invites_ratings() {
        let cycle = Cycle::start("Spring", PhaseDurations::default(), Utc::now());
        let text = phase_announcement(&cycle, &outcome(Phase::Discussion), Some(&dune()));

        assert!(text.contains("Time to talk about *Dune*"));
        assert!(text.contains("/bookclub rate"));
    }
}
