use crate::error::Result;
use crate::model::{Ballot, BallotSummary, ElectionSummary, RevealedBallot, Stats, User};

/// The read side of a store. Takes and returns natural keys only.
///
/// Single-record lookups return `None` when the key is absent. Listings
/// scoped to an election return an empty list when the election is absent.
/// Listings are sorted by natural key.
pub trait QueryModel {
    fn user_by_name(&self, name: &str) -> Result<Option<User>>;

    fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Admin only; may scan the whole store.
    fn list_users(&self) -> Result<Vec<User>>;

    fn election(&self, name: &str) -> Result<Option<ElectionSummary>>;

    /// Admin only; may scan the whole store.
    fn list_elections(&self) -> Result<Vec<ElectionSummary>>;

    fn list_candidates(&self, election_name: &str) -> Result<Vec<String>>;

    fn list_voters(&self, election_name: &str) -> Result<Vec<String>>;

    fn is_eligible(&self, election_name: &str, voter_name: &str) -> Result<bool>;

    fn ballot(&self, election_name: &str, voter_name: &str) -> Result<Option<Ballot>>;

    /// Every ballot cast in the election, ordered by voter name.
    fn list_ballots(&self, election_name: &str) -> Result<Vec<Ballot>>;

    fn list_ballot_summaries(&self, election_name: &str) -> Result<Vec<BallotSummary>>;

    /// Ballots as published, with voter names withheld under a secret ballot.
    fn list_revealed_ballots(&self, election_name: &str) -> Result<Vec<RevealedBallot>>;

    fn ballot_by_confirmation(
        &self,
        election_name: &str,
        confirmation: &str,
    ) -> Result<Option<Ballot>>;

    /// Admin/debug only; may scan the whole store.
    fn stats(&self) -> Result<Stats>;
}
