//! The canonical object model.
//!
//! Everything in this module is addressed by natural keys only (user names,
//! election names, voter names). Each backend projects its physical storage
//! into exactly these shapes, so callers cannot tell the backends apart.

mod ballot;
mod election;
mod event;
mod user;

pub use ballot::{Ballot, BallotSummary, Ranking, RevealedBallot};
pub use election::ElectionSummary;
pub use event::{Event, EventEnvelope};
pub use user::{Role, User};

/// Aggregate counts over a whole store.
/// Admin/debug only: backends are free to compute this with full scans.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub users: u64,
    pub elections: u64,
    pub candidates: u64,
    pub voters: u64,
    pub ballots: u64,
}
