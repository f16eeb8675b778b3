//! Natural keys to `(pk, sk)` pairs and back.
//!
//! Users and elections each own a partition. An election's partition holds
//! its candidates, eligible voters, and ballots. A user's partition holds
//! back-references to every election row that carries the user's name, so
//! a rename can find them all with key lookups alone.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Sort key of an entity's own record within its partition.
pub const METADATA: &str = "METADATA";

/// Sort key of the guard a rename leaves in its target partition.
pub const RENAME_GUARD: &str = "RENAME_GUARD";

const USER: &str = "USER#";
const ELECTION: &str = "ELECTION#";

/// Primary key of an item: partition key plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

impl Key {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// Kinds of child item, by sort key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Candidate,
    Voter,
    Ballot,
    Owns,
    Eligible,
    Cast,
}

impl Child {
    const ALL: [Child; 6] = [
        Child::Candidate,
        Child::Voter,
        Child::Ballot,
        Child::Owns,
        Child::Eligible,
        Child::Cast,
    ];

    /// Sort key prefix shared by every item of this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Child::Candidate => "CANDIDATE#",
            Child::Voter => "VOTER#",
            Child::Ballot => "BALLOT#",
            Child::Owns => "OWNS#",
            Child::Eligible => "ELIGIBLE#",
            Child::Cast => "CAST#",
        }
    }
}

/// Split a child sort key into its kind and key.
pub fn parse_sort_key(sk: &str) -> Option<(Child, &str)> {
    Child::ALL
        .into_iter()
        .find_map(|child| sk.strip_prefix(child.prefix()).map(|key| (child, key)))
}

/// Every kind of item addressable by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaturalKey<'a> {
    User(&'a str),
    Election(&'a str),
    Candidate { election: &'a str, name: &'a str },
    Voter { election: &'a str, voter: &'a str },
    Ballot { election: &'a str, voter: &'a str },
    /// `user` owns `election`.
    Owns { user: &'a str, election: &'a str },
    /// `user` is an eligible voter in `election`.
    Eligible { user: &'a str, election: &'a str },
    /// `user` has a ballot in `election`.
    Cast { user: &'a str, election: &'a str },
}

pub fn user_partition(name: &str) -> String {
    format!("{USER}{name}")
}

pub fn election_partition(name: &str) -> String {
    format!("{ELECTION}{name}")
}

fn child(pk: String, child: Child, key: &str) -> Key {
    Key::new(pk, format!("{}{key}", child.prefix()))
}

pub fn entity_key(key: NaturalKey<'_>) -> Key {
    match key {
        NaturalKey::User(name) => Key::new(user_partition(name), METADATA),
        NaturalKey::Election(name) => Key::new(election_partition(name), METADATA),
        NaturalKey::Candidate { election, name } => {
            child(election_partition(election), Child::Candidate, name)
        }
        NaturalKey::Voter { election, voter } => {
            child(election_partition(election), Child::Voter, voter)
        }
        NaturalKey::Ballot { election, voter } => {
            child(election_partition(election), Child::Ballot, voter)
        }
        NaturalKey::Owns { user, election } => child(user_partition(user), Child::Owns, election),
        NaturalKey::Eligible { user, election } => {
            child(user_partition(user), Child::Eligible, election)
        }
        NaturalKey::Cast { user, election } => child(user_partition(user), Child::Cast, election),
    }
}

/// Inverse of [`entity_key`]. `None` for keys it never produces.
pub fn natural_key(key: &Key) -> Option<NaturalKey<'_>> {
    if let Some(user) = key.pk.strip_prefix(USER) {
        if key.sk == METADATA {
            return Some(NaturalKey::User(user));
        }
        let (child, election) = parse_sort_key(&key.sk)?;
        return match child {
            Child::Owns => Some(NaturalKey::Owns { user, election }),
            Child::Eligible => Some(NaturalKey::Eligible { user, election }),
            Child::Cast => Some(NaturalKey::Cast { user, election }),
            _ => None,
        };
    }

    let election = key.pk.strip_prefix(ELECTION)?;
    if key.sk == METADATA {
        return Some(NaturalKey::Election(election));
    }
    let (child, name) = parse_sort_key(&key.sk)?;
    match child {
        Child::Candidate => Some(NaturalKey::Candidate { election, name }),
        Child::Voter => Some(NaturalKey::Voter {
            election,
            voter: name,
        }),
        Child::Ballot => Some(NaturalKey::Ballot {
            election,
            voter: name,
        }),
        _ => None,
    }
}

/// The rename guard in the partition `pk`.
pub fn rename_guard_key(pk: String) -> Key {
    Key::new(pk, RENAME_GUARD)
}

/// Where the projection's sync state lives.
pub fn sync_state_key() -> Key {
    Key::new("SYNC", METADATA)
}

/// The counter handing out event sequence ids.
pub fn event_counter_key() -> Key {
    Key::new("COUNTER#events", METADATA)
}
