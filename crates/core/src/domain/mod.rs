pub mod cycle;
pub mod rating;
pub mod suggestion;
pub mod vote;
