//! Book club application layer: the operations behind the slash commands,
//! the channel announcements for phase changes, and the phase scheduler.

pub mod announcements;
pub mod audit;
pub mod scheduler;
pub mod service;

pub use audit::TracingAuditSink;
pub use scheduler::{CheckReport, PhaseScheduler};
pub use service::{
    BookClubService, CommitResult, CycleStatusView, ListedSuggestion, PhaseChange, RatingReceipt,
    ResultsView, VoteReceipt,
};
