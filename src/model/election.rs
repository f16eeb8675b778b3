use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An election's own record, without its candidates, voters, or ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election name.
    pub name: String,
    /// Name of the owning user.
    pub owner_name: String,
    /// Are voter identities hidden when ballots are revealed?
    pub secret_ballot: bool,
    /// Voting window lower bound.
    pub no_voting_before: Option<DateTime<Utc>>,
    /// Voting window upper bound.
    pub no_voting_after: Option<DateTime<Utc>>,
    /// Is voting currently open?
    pub allow_vote: bool,
    /// May the owner still change candidates and voters?
    pub allow_edit: bool,
}

impl ElectionSummary {
    /// A freshly created election: secret ballot, no window, closed for
    /// voting and editing until the owner says otherwise.
    pub fn new(name: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_name: owner_name.into(),
            secret_ballot: true,
            no_voting_before: None,
            no_voting_after: None,
            allow_vote: false,
            allow_edit: false,
        }
    }
}
