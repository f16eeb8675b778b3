use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a ranked ballot. Lower ranks are preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub candidate_name: String,
    pub rank: u32,
}

impl Ranking {
    pub fn new(candidate_name: impl Into<String>, rank: u32) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            rank,
        }
    }
}

/// A cast ballot. At most one exists per (election, voter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election_name: String,
    pub voter_name: String,
    /// Rankings in the order the voter submitted them.
    pub rankings: Vec<Ranking>,
    /// Token handed to the voter so they can find their ballot later.
    pub confirmation: String,
    pub when_cast: DateTime<Utc>,
}

/// A ballot listing entry without the rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSummary {
    pub voter_name: String,
    pub confirmation: String,
    pub when_cast: DateTime<Utc>,
}

impl From<&Ballot> for BallotSummary {
    fn from(ballot: &Ballot) -> Self {
        Self {
            voter_name: ballot.voter_name.clone(),
            confirmation: ballot.confirmation.clone(),
            when_cast: ballot.when_cast,
        }
    }
}

/// A ballot as published once voting is done.
/// The voter is only named if the election does not have a secret ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedBallot {
    pub voter_name: Option<String>,
    pub confirmation: String,
    pub rankings: Vec<Ranking>,
}

impl RevealedBallot {
    pub fn reveal(ballot: Ballot, secret_ballot: bool) -> Self {
        Self {
            voter_name: (!secret_ballot).then_some(ballot.voter_name),
            confirmation: ballot.confirmation,
            rankings: ballot.rankings,
        }
    }
}
