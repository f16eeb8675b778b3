use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Ballot, ElectionSummary, Event, EventEnvelope, Ranking, Role, User};

use super::keys::{entity_key, Key, NaturalKey};

/// One row of the single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    /// Secondary index attribute. Only user records carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub record: Record,
}

/// The attributes of an item, tagged by entity type.
///
/// Timestamps are kept as RFC 3339 strings rather than BSON dates, which
/// would cut them to milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Record {
    User {
        name: String,
        salt: String,
        hash: String,
        role: Role,
        /// Set while this user is being renamed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        renaming_to: Option<String>,
    },
    Election {
        name: String,
        owner_name: String,
        secret_ballot: bool,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
        allow_vote: bool,
        allow_edit: bool,
        /// Set while this election is being renamed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        renaming_to: Option<String>,
    },
    Candidate {
        election_name: String,
        name: String,
    },
    Voter {
        election_name: String,
        voter_name: String,
    },
    Ballot {
        election_name: String,
        voter_name: String,
        rankings: Vec<Ranking>,
        confirmation: String,
        when_cast: DateTime<Utc>,
    },
    /// A back-reference from a user partition to an election row naming them.
    Reference {
        user_name: String,
        election_name: String,
    },
    /// Left in the target partition of a rename until it completes.
    RenameGuard {
        from: String,
    },
    SyncState {
        last_event_id: i64,
    },
    Counter {
        value: i64,
    },
}

impl Item {
    pub fn new(key: Key, record: Record) -> Self {
        Self {
            pk: key.pk,
            sk: key.sk,
            email: None,
            record,
        }
    }

    pub fn key(&self) -> Key {
        Key::new(self.pk.clone(), self.sk.clone())
    }

    pub fn user(user: &User) -> Self {
        let record = Record::User {
            name: user.name.clone(),
            salt: user.salt.clone(),
            hash: user.hash.clone(),
            role: user.role,
            renaming_to: None,
        };
        Self {
            email: Some(user.email.clone()),
            ..Self::new(entity_key(NaturalKey::User(&user.name)), record)
        }
    }

    pub fn to_user(&self) -> Option<User> {
        match (&self.record, &self.email) {
            (
                Record::User {
                    name,
                    salt,
                    hash,
                    role,
                    ..
                },
                Some(email),
            ) => Some(User::new(
                name.as_str(),
                email.as_str(),
                salt.as_str(),
                hash.as_str(),
                *role,
            )),
            _ => None,
        }
    }

    pub fn election(election: &ElectionSummary) -> Self {
        let record = Record::Election {
            name: election.name.clone(),
            owner_name: election.owner_name.clone(),
            secret_ballot: election.secret_ballot,
            no_voting_before: election.no_voting_before,
            no_voting_after: election.no_voting_after,
            allow_vote: election.allow_vote,
            allow_edit: election.allow_edit,
            renaming_to: None,
        };
        Self::new(entity_key(NaturalKey::Election(&election.name)), record)
    }

    pub fn to_election(&self) -> Option<ElectionSummary> {
        match &self.record {
            Record::Election {
                name,
                owner_name,
                secret_ballot,
                no_voting_before,
                no_voting_after,
                allow_vote,
                allow_edit,
                ..
            } => Some(ElectionSummary {
                name: name.clone(),
                owner_name: owner_name.clone(),
                secret_ballot: *secret_ballot,
                no_voting_before: *no_voting_before,
                no_voting_after: *no_voting_after,
                allow_vote: *allow_vote,
                allow_edit: *allow_edit,
            }),
            _ => None,
        }
    }

    pub fn candidate(election_name: &str, name: &str) -> Self {
        let key = entity_key(NaturalKey::Candidate {
            election: election_name,
            name,
        });
        let record = Record::Candidate {
            election_name: election_name.to_string(),
            name: name.to_string(),
        };
        Self::new(key, record)
    }

    pub fn voter(election_name: &str, voter_name: &str) -> Self {
        let key = entity_key(NaturalKey::Voter {
            election: election_name,
            voter: voter_name,
        });
        let record = Record::Voter {
            election_name: election_name.to_string(),
            voter_name: voter_name.to_string(),
        };
        Self::new(key, record)
    }

    pub fn ballot(ballot: &Ballot) -> Self {
        let key = entity_key(NaturalKey::Ballot {
            election: &ballot.election_name,
            voter: &ballot.voter_name,
        });
        let record = Record::Ballot {
            election_name: ballot.election_name.clone(),
            voter_name: ballot.voter_name.clone(),
            rankings: ballot.rankings.clone(),
            confirmation: ballot.confirmation.clone(),
            when_cast: ballot.when_cast,
        };
        Self::new(key, record)
    }

    pub fn to_ballot(&self) -> Option<Ballot> {
        match &self.record {
            Record::Ballot {
                election_name,
                voter_name,
                rankings,
                confirmation,
                when_cast,
            } => Some(Ballot {
                election_name: election_name.clone(),
                voter_name: voter_name.clone(),
                rankings: rankings.clone(),
                confirmation: confirmation.clone(),
                when_cast: *when_cast,
            }),
            _ => None,
        }
    }

    /// A back-reference. `key` must be one of the user-partition kinds.
    pub fn reference(key: NaturalKey<'_>) -> Option<Self> {
        let (user, election) = match key {
            NaturalKey::Owns { user, election }
            | NaturalKey::Eligible { user, election }
            | NaturalKey::Cast { user, election } => (user, election),
            _ => return None,
        };
        let record = Record::Reference {
            user_name: user.to_string(),
            election_name: election.to_string(),
        };
        Some(Self::new(entity_key(key), record))
    }

    pub fn rename_guard(key: Key, from: &str) -> Self {
        Self::new(
            key,
            Record::RenameGuard {
                from: from.to_string(),
            },
        )
    }

    /// The pending rename target, if this user or election is mid-rename.
    pub fn renaming_to(&self) -> Option<&str> {
        match &self.record {
            Record::User { renaming_to, .. } | Record::Election { renaming_to, .. } => {
                renaming_to.as_deref()
            }
            _ => None,
        }
    }

    /// This user or election record with its rename marker set or cleared.
    pub fn with_renaming_to(mut self, to: Option<&str>) -> Self {
        if let Record::User { renaming_to, .. } | Record::Election { renaming_to, .. } =
            &mut self.record
        {
            *renaming_to = to.map(str::to_string);
        }
        self
    }
}

/// One entry of the event collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Sequence id.
    #[serde(rename = "_id")]
    pub id: i64,
    pub authority: String,
    pub when: DateTime<Utc>,
    pub event: Event,
}

impl EventRecord {
    pub fn new(id: u64, authority: &str, when: DateTime<Utc>, event: &Event) -> Self {
        Self {
            id: id as i64,
            authority: authority.to_string(),
            when,
            event: event.clone(),
        }
    }
}

impl From<EventRecord> for EventEnvelope {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id as u64,
            authority: record.authority,
            when: record.when,
            event: record.event,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mongodb::bson::{self, doc, Bson};

    use super::*;

    use crate::testing::{self, examples};

    /// Through the same raw encoding the driver uses.
    fn wire<T: Serialize + serde::de::DeserializeOwned>(value: &T) -> T {
        bson::from_slice(&bson::to_vec(value).unwrap()).unwrap()
    }

    #[test]
    fn user_document_layout() {
        let item = Item::user(&examples::alice());
        let doc = bson::to_document(&item).unwrap();
        assert_eq!(doc.get_str("pk").unwrap(), "USER#alice");
        assert_eq!(doc.get_str("sk").unwrap(), "METADATA");
        assert_eq!(doc.get_str("entity").unwrap(), "user");
        assert_eq!(doc.get_str("email").unwrap(), "alice@example.com");
        assert!(!doc.contains_key("renaming_to"));

        assert_eq!(wire(&item).to_user(), Some(examples::alice()));
    }

    #[test]
    fn timestamps_keep_full_precision() {
        let instant = testing::epoch() + Duration::nanoseconds(123_456_789);

        let mut election = ElectionSummary::new(examples::ELECTION, "bob");
        election.no_voting_before = Some(instant);
        election.no_voting_after = Some(instant + Duration::days(1));
        let item = Item::election(&election);
        assert_eq!(item.email, None);
        let doc = bson::to_document(&item).unwrap();
        assert!(matches!(doc.get("no_voting_before"), Some(Bson::String(_))));
        assert_eq!(wire(&item).to_election(), Some(election));

        let mut ballot = examples::ballots(examples::ELECTION).remove(0);
        ballot.when_cast = instant;
        assert_eq!(wire(&Item::ballot(&ballot)).to_ballot(), Some(ballot));

        let record = EventRecord::new(7, "alice", instant, &examples::events()[0]);
        assert_eq!(wire(&record), record);
    }

    #[test]
    fn rename_marker() {
        let item = Item::election(&ElectionSummary::new("Best Pie", "bob"));
        assert_eq!(item.renaming_to(), None);
        let marked = item.clone().with_renaming_to(Some("Best Cake"));
        assert_eq!(marked.renaming_to(), Some("Best Cake"));
        assert_eq!(marked.to_election(), item.to_election());
        assert_eq!(wire(&marked), marked);
        assert_eq!(marked.with_renaming_to(None), item);

        let counter = Item::new(Key::new("x", "y"), Record::Counter { value: 1 });
        assert_eq!(counter.clone().with_renaming_to(Some("z")), counter);
    }

    #[test]
    fn references_only_for_user_partitions() {
        let owns = Item::reference(NaturalKey::Owns {
            user: "bob",
            election: "Best Pie",
        })
        .unwrap();
        assert_eq!(owns.key(), Key::new("USER#bob", "OWNS#Best Pie"));
        assert!(Item::reference(NaturalKey::User("bob")).is_none());
    }

    #[test]
    fn counter_document() {
        let doc = doc! {
            "pk": "COUNTER#events",
            "sk": "METADATA",
            "entity": "counter",
            "value": 3_i64,
        };
        let item: Item = bson::from_document(doc).unwrap();
        assert_eq!(item.record, Record::Counter { value: 3 });
    }

    #[test]
    fn documents_from_the_server_carry_an_object_id() {
        let mut doc = bson::to_document(&Item::candidate("Best Pie", "Apple")).unwrap();
        doc.insert("_id", bson::oid::ObjectId::new());
        let bytes = bson::to_vec(&doc).unwrap();
        let item: Item = bson::from_slice(&bytes).unwrap();
        assert_eq!(item, Item::candidate("Best Pie", "Apple"));
    }
}
