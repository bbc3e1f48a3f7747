//! Ranked-choice tally.
//!
//! Every vote contributes the points of its rank (3/2/1) to the suggestion it
//! names. Standings are ordered by points, highest first, with ties kept in
//! submission order. The tally is pure: persisting the totals back onto the
//! suggestions is left to the caller and is an idempotent overwrite.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::suggestion::{Suggestion, SuggestionId};
use crate::domain::vote::Vote;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub suggestion: Suggestion,
    pub points: u32,
}

pub fn tally(suggestions: &[Suggestion], votes: &[Vote]) -> Vec<Standing> {
    let mut points: HashMap<&SuggestionId, u32> = HashMap::with_capacity(suggestions.len());
    for vote in votes {
        *points.entry(&vote.suggestion_id).or_default() += vote.rank.points();
    }

    let mut ordered: Vec<&Suggestion> = suggestions.iter().collect();
    ordered.sort_by(|left, right| {
        left.sequence.cmp(&right.sequence).then_with(|| left.created_at.cmp(&right.created_at))
    });

    let mut standings: Vec<Standing> = ordered
        .into_iter()
        .map(|suggestion| Standing {
            points: points.get(&suggestion.id).copied().unwrap_or(0),
            suggestion: suggestion.clone(),
        })
        .collect();

    // `sort_by` is stable, so equal totals keep submission order.
    standings.sort_by(|left, right| right.points.cmp(&left.points));
    standings
}

pub fn winner(standings: &[Standing]) -> Option<&Standing> {
    standings.first()
}

/// `(suggestion, points)` pairs ready to be written back onto the suggestions.
pub fn point_updates(standings: &[Standing]) -> Vec<(SuggestionId, u32)> {
    standings.iter().map(|standing| (standing.suggestion.id.clone(), standing.points)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{point_updates, tally, winner};
    use crate::domain::cycle::CycleId;
    use crate::domain::suggestion::{Suggestion, SuggestionId};
    use crate::domain::vote::{Ballot, Vote};

    fn suggestion(id: &str, book: &str, sequence: i64) -> Suggestion {
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).single().expect("valid date");
        Suggestion {
            id: SuggestionId(id.to_owned()),
            cycle_id: CycleId("cycle-1".to_owned()),
            user_id: format!("U-{id}"),
            book_name: book.to_owned(),
            author: "Author".to_owned(),
            link: None,
            notes: None,
            created_at: base + Duration::minutes(sequence),
            vote_points: 0,
            sequence,
        }
    }

    fn ballot(voter: &str, picks: &[&str]) -> Vec<Vote> {
        let picks = picks.iter().map(|pick| SuggestionId((*pick).to_owned())).collect();
        Ballot::from_ranked(picks).expect("valid ballot").into_votes(
            &CycleId("cycle-1".to_owned()),
            voter,
            Utc::now(),
        )
    }

    #[test]
    fn empty_suggestions_produce_empty_standings() {
        assert!(tally(&[], &ballot("U1", &["dune"])).is_empty());
    }

    #[test]
    fn no_votes_keeps_submission_order_with_zero_totals() {
        let suggestions =
            vec![suggestion("b", "Foundation", 2), suggestion("a", "Dune", 1), suggestion("c", "Emma", 3)];

        let standings = tally(&suggestions, &[]);
        let order: Vec<&str> =
            standings.iter().map(|standing| standing.suggestion.book_name.as_str()).collect();

        assert_eq!(order, vec!["Dune", "Foundation", "Emma"]);
        assert!(standings.iter().all(|standing| standing.points == 0));
    }

    #[test]
    fn totals_sum_rank_points() {
        let suggestions =
            vec![suggestion("a", "Dune", 1), suggestion("b", "Foundation", 2), suggestion("c", "Emma", 3)];
        let mut votes = ballot("U1", &["c", "a", "b"]);
        votes.extend(ballot("U2", &["c", "b"]));
        votes.extend(ballot("U3", &["a"]));

        let standings = tally(&suggestions, &votes);
        let totals: Vec<(&str, u32)> = standings
            .iter()
            .map(|standing| (standing.suggestion.id.0.as_str(), standing.points))
            .collect();

        assert_eq!(totals, vec![("c", 6), ("a", 5), ("b", 3)]);
    }

    #[test]
    fn tie_is_won_by_earlier_submission() {
        let suggestions = vec![suggestion("dune", "Dune", 1), suggestion("foundation", "Foundation", 2)];
        let mut votes = ballot("userA", &["dune", "foundation"]);
        votes.extend(ballot("userB", &["foundation", "dune"]));

        let standings = tally(&suggestions, &votes);

        assert_eq!(standings[0].points, 5);
        assert_eq!(standings[1].points, 5);
        let top = winner(&standings).expect("winner");
        assert_eq!(top.suggestion.book_name, "Dune");
    }

    #[test]
    fn tally_is_idempotent_and_ignores_unknown_suggestions() {
        let suggestions = vec![suggestion("a", "Dune", 1), suggestion("b", "Foundation", 2)];
        let mut votes = ballot("U1", &["b", "a"]);
        votes.extend(ballot("U2", &["ghost", "b"]));

        let first = tally(&suggestions, &votes);
        let second = tally(&suggestions, &votes);

        assert_eq!(first, second);
        assert_eq!(
            point_updates(&first),
            vec![(SuggestionId("b".to_owned()), 5), (SuggestionId("a".to_owned()), 2)]
        );
    }
}
