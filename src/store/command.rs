use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Ballot, Role, User};

/// The write side of a store.
///
/// Every method takes the acting `authority` first; it is recorded in the
/// logs but not checked here. Natural keys that must exist but do not yield
/// [`Error::NotFound`](crate::Error::NotFound); taken natural keys yield
/// [`Error::Conflict`](crate::Error::Conflict). Both checks are plain reads
/// before the write, so concurrent callers can still race past them.
///
/// No method is transactional across steps. If a multi-step method fails
/// part-way, the store is left partially updated; every multi-step method
/// is written so that calling it again with the same arguments completes
/// the job.
pub trait CommandModel {
    fn create_user(&self, authority: &str, user: &User) -> Result<()>;

    /// Rename a user everywhere the name is stored, in order: the user
    /// record, election owners, voter eligibility, cast ballots.
    fn set_user_name(&self, authority: &str, from: &str, to: &str) -> Result<()>;

    fn set_user_email(&self, authority: &str, name: &str, email: &str) -> Result<()>;

    fn set_user_role(&self, authority: &str, name: &str, role: Role) -> Result<()>;

    fn set_user_password(&self, authority: &str, name: &str, salt: &str, hash: &str)
        -> Result<()>;

    /// Remove a user and every voter-eligibility entry naming them.
    /// Ballots they cast and elections they own are kept.
    fn remove_user(&self, authority: &str, name: &str) -> Result<()>;

    fn add_election(&self, authority: &str, owner_name: &str, election_name: &str) -> Result<()>;

    /// Rename an election, carrying its candidates, voters, and ballots.
    fn set_election_name(&self, authority: &str, from: &str, to: &str) -> Result<()>;

    fn set_secret_ballot(&self, authority: &str, election_name: &str, secret: bool) -> Result<()>;

    fn set_voting_window(
        &self,
        authority: &str,
        election_name: &str,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
    ) -> Result<()>;

    fn set_allow_vote(&self, authority: &str, election_name: &str, allow: bool) -> Result<()>;

    fn set_allow_edit(&self, authority: &str, election_name: &str, allow: bool) -> Result<()>;

    /// Delete an election with all of its candidates, voters, and ballots.
    fn delete_election(&self, authority: &str, election_name: &str) -> Result<()>;

    fn add_candidates(&self, authority: &str, election_name: &str, names: &[String])
        -> Result<()>;

    fn remove_candidates(
        &self,
        authority: &str,
        election_name: &str,
        names: &[String],
    ) -> Result<()>;

    fn add_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()>;

    fn remove_voters(&self, authority: &str, election_name: &str, names: &[String])
        -> Result<()>;

    /// Store a ballot, replacing any earlier ballot by the same voter.
    fn cast_ballot(&self, authority: &str, ballot: &Ballot) -> Result<()>;
}
