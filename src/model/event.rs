use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Ballot, Role, User};

/// Something that happened, as recorded in the event log.
///
/// The wire discriminator is the `type` field, spelled out per variant so
/// that renaming a Rust variant never changes stored data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "user-created")]
    UserCreated(User),
    #[serde(rename = "user-name-changed")]
    UserNameChanged { from: String, to: String },
    #[serde(rename = "user-email-changed")]
    UserEmailChanged { name: String, email: String },
    #[serde(rename = "user-role-changed")]
    UserRoleChanged { name: String, role: Role },
    #[serde(rename = "user-password-changed")]
    UserPasswordChanged {
        name: String,
        salt: String,
        hash: String,
    },
    #[serde(rename = "user-removed")]
    UserRemoved { name: String },
    #[serde(rename = "election-added")]
    ElectionAdded {
        owner_name: String,
        election_name: String,
    },
    #[serde(rename = "election-name-changed")]
    ElectionNameChanged { from: String, to: String },
    #[serde(rename = "election-secret-ballot-changed")]
    ElectionSecretBallotChanged {
        election_name: String,
        secret_ballot: bool,
    },
    #[serde(rename = "election-voting-window-changed")]
    ElectionVotingWindowChanged {
        election_name: String,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
    },
    #[serde(rename = "election-allow-vote-changed")]
    ElectionAllowVoteChanged {
        election_name: String,
        allow_vote: bool,
    },
    #[serde(rename = "election-allow-edit-changed")]
    ElectionAllowEditChanged {
        election_name: String,
        allow_edit: bool,
    },
    #[serde(rename = "election-deleted")]
    ElectionDeleted { election_name: String },
    #[serde(rename = "candidates-added")]
    CandidatesAdded {
        election_name: String,
        candidate_names: Vec<String>,
    },
    #[serde(rename = "candidates-removed")]
    CandidatesRemoved {
        election_name: String,
        candidate_names: Vec<String>,
    },
    #[serde(rename = "voters-added")]
    VotersAdded {
        election_name: String,
        voter_names: Vec<String>,
    },
    #[serde(rename = "voters-removed")]
    VotersRemoved {
        election_name: String,
        voter_names: Vec<String>,
    },
    #[serde(rename = "ballot-cast")]
    BallotCast(Ballot),
}

impl Event {
    /// The wire discriminator of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "user-created",
            Self::UserNameChanged { .. } => "user-name-changed",
            Self::UserEmailChanged { .. } => "user-email-changed",
            Self::UserRoleChanged { .. } => "user-role-changed",
            Self::UserPasswordChanged { .. } => "user-password-changed",
            Self::UserRemoved { .. } => "user-removed",
            Self::ElectionAdded { .. } => "election-added",
            Self::ElectionNameChanged { .. } => "election-name-changed",
            Self::ElectionSecretBallotChanged { .. } => "election-secret-ballot-changed",
            Self::ElectionVotingWindowChanged { .. } => "election-voting-window-changed",
            Self::ElectionAllowVoteChanged { .. } => "election-allow-vote-changed",
            Self::ElectionAllowEditChanged { .. } => "election-allow-edit-changed",
            Self::ElectionDeleted { .. } => "election-deleted",
            Self::CandidatesAdded { .. } => "candidates-added",
            Self::CandidatesRemoved { .. } => "candidates-removed",
            Self::VotersAdded { .. } => "voters-added",
            Self::VotersRemoved { .. } => "voters-removed",
            Self::BallotCast(_) => "ballot-cast",
        }
    }
}

/// An event as stored: payload plus who did it, when, and its log position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequence id, assigned by the log on append. Starts at 1.
    pub id: u64,
    pub authority: String,
    pub when: DateTime<Utc>,
    pub event: Event,
}
