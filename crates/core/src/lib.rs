pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod phases;
pub mod tally;

pub use domain::cycle::{Cycle, CycleId, CycleStatus};
pub use domain::rating::{Rating, RatingId, RatingSummary};
pub use domain::suggestion::{Suggestion, SuggestionId, SuggestionInput};
pub use domain::vote::{Ballot, Rank, Vote, VoteId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notify::{Notification, Notifier, NotifyError};
pub use phases::{Phase, PhaseDurations, PhaseEngine, PhaseTimings, PhaseTransitionError};
pub use tally::Standing;
