//! Shared test harness: fixtures, a backend factory for `#[backend_test]`,
//! and whole-store snapshots for comparing backends.

use std::env;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, TimeZone, Utc};

use crate::memory::MemoryBackend;
use crate::model::{Ballot, ElectionSummary, Stats, User};
use crate::projection;
use crate::relational::RelationalBackend;
use crate::single_table::{MemoryTables, MongoTables, SingleTableBackend};
use crate::store::{Backend, CommandModel, QueryModel};

pub const ADMIN: &str = "admin";

/// The fixed instant all fixtures are built around.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

#[derive(Debug, Clone, Copy)]
pub enum TestBackend {
    Memory,
    Relational,
    /// The single-table layout on an in-process table.
    SingleTable,
    /// The single-table layout on a real MongoDB server.
    Mongo,
}

/// Run `test` against a fresh store of the given kind, tearing the store down
/// afterwards even if the test panics.
pub fn with_backend(kind: TestBackend, seeded: bool, test: impl FnOnce(&dyn Backend)) {
    log4rs_test_utils::test_logging::init_logging_once_for(["rcv_store"], None, None);

    match kind {
        TestBackend::Memory => run(&MemoryBackend::new(), seeded, test),
        TestBackend::Relational => run(&RelationalBackend::in_memory().unwrap(), seeded, test),
        TestBackend::SingleTable => run(
            &SingleTableBackend::new(MemoryTables::new()),
            seeded,
            test,
        ),
        TestBackend::Mongo => {
            let uri = env::var("STORE_TEST_MONGO_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
            let db_name = format!("test{}", rand::random::<u32>());
            let tables = MongoTables::connect(&uri, &db_name).unwrap();
            let store = SingleTableBackend::new(tables);

            let result = panic::catch_unwind(AssertUnwindSafe(|| run(&store, seeded, test)));

            store.table().drop_database().unwrap();

            if let Err(cause) = result {
                panic::resume_unwind(cause);
            }
        }
    }
}

fn run(store: &dyn Backend, seeded: bool, test: impl FnOnce(&dyn Backend)) {
    if seeded {
        seed(store);
    }
    test(store);
}

/// Project the example events into a store, without logging them.
pub fn seed<C: CommandModel + ?Sized>(store: &C) {
    for event in examples::events() {
        projection::apply(store, ADMIN, &event).unwrap();
    }
}

/// Everything observable through [`QueryModel`], gathered in one value.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub elections: Vec<ElectionSnapshot>,
    pub stats: Stats,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ElectionSnapshot {
    pub summary: ElectionSummary,
    pub candidates: Vec<String>,
    pub voters: Vec<String>,
    pub ballots: Vec<Ballot>,
}

pub fn snapshot<Q: QueryModel + ?Sized>(store: &Q) -> Snapshot {
    let elections = store
        .list_elections()
        .unwrap()
        .into_iter()
        .map(|summary| ElectionSnapshot {
            candidates: store.list_candidates(&summary.name).unwrap(),
            voters: store.list_voters(&summary.name).unwrap(),
            ballots: store.list_ballots(&summary.name).unwrap(),
            summary,
        })
        .collect();
    Snapshot {
        users: store.list_users().unwrap(),
        elections,
        stats: store.stats().unwrap(),
    }
}

/// The seeded store after a clean rename of bob to robert.
pub fn renamed_reference() -> Snapshot {
    let store = MemoryBackend::new();
    seed(&store);
    store.set_user_name(ADMIN, "bob", "robert").unwrap();
    snapshot(&store)
}

/// Shared fixture data.
pub mod examples {
    use chrono::Duration;

    use crate::model::{Ballot, Event, Ranking, Role, User};

    use super::epoch;

    pub const ELECTION: &str = "Best Pie";
    pub const OTHER_ELECTION: &str = "Best Cookie";

    pub fn alice() -> User {
        User::new("alice", "alice@example.com", "salt-a", "hash-a", Role::Voter)
    }

    pub fn bob() -> User {
        User::new("bob", "bob@example.com", "salt-b", "hash-b", Role::Owner)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn ballot(election: &str, voter: &str, choices: &[&str], hours: i64) -> Ballot {
        Ballot {
            election_name: election.to_string(),
            voter_name: voter.to_string(),
            rankings: choices
                .iter()
                .zip(1..)
                .map(|(choice, rank)| Ranking::new(*choice, rank))
                .collect(),
            confirmation: format!("{}-{voter}", election.to_lowercase().replace(' ', "-")),
            when_cast: epoch() + Duration::hours(hours),
        }
    }

    /// Every example ballot cast in `election`, ordered by voter.
    pub fn ballots(election: &str) -> Vec<Ballot> {
        let all = [
            ballot(ELECTION, "alice", &["Cherry", "Apple", "Key Lime"], 1),
            ballot(ELECTION, "bob", &["Apple", "Key Lime"], 2),
            ballot(OTHER_ELECTION, "carol", &["Oatmeal"], 3),
        ];
        all.into_iter()
            .filter(|ballot| ballot.election_name == election)
            .collect()
    }

    /// Two users, two elections with candidates and voters, three ballots.
    /// Carol is eligible in one election and votes without being registered.
    pub fn events() -> Vec<Event> {
        let mut events = vec![
            Event::UserCreated(alice()),
            Event::UserCreated(bob()),
            Event::ElectionAdded {
                owner_name: "bob".to_string(),
                election_name: ELECTION.to_string(),
            },
            Event::CandidatesAdded {
                election_name: ELECTION.to_string(),
                candidate_names: names(&["Apple", "Cherry", "Key Lime"]),
            },
            Event::VotersAdded {
                election_name: ELECTION.to_string(),
                voter_names: names(&["alice", "bob"]),
            },
            Event::ElectionAdded {
                owner_name: "alice".to_string(),
                election_name: OTHER_ELECTION.to_string(),
            },
            Event::CandidatesAdded {
                election_name: OTHER_ELECTION.to_string(),
                candidate_names: names(&["Oatmeal", "Snickerdoodle"]),
            },
            Event::VotersAdded {
                election_name: OTHER_ELECTION.to_string(),
                voter_names: names(&["bob", "carol"]),
            },
        ];
        events.extend(
            ballots(ELECTION)
                .into_iter()
                .chain(ballots(OTHER_ELECTION))
                .map(Event::BallotCast),
        );
        events
    }
}

mod tests {
    use super::*;

    #[test]
    fn fixture_shape() {
        assert_eq!(examples::events().len(), 11);
        assert_eq!(examples::ballots(examples::ELECTION).len(), 2);
        assert_eq!(
            examples::ballots(examples::ELECTION)[0].confirmation,
            "best-pie-alice"
        );
    }

    #[test]
    fn backends_agree() {
        let memory = MemoryBackend::new();
        let relational = RelationalBackend::in_memory().unwrap();
        let single_table = SingleTableBackend::new(MemoryTables::new());
        let stores: [&dyn Backend; 3] = [&memory, &relational, &single_table];

        for store in stores {
            seed(store);
            store.set_user_name(ADMIN, "bob", "robert").unwrap();
            store
                .set_election_name(ADMIN, examples::OTHER_ELECTION, "Best Biscuit")
                .unwrap();
            store.remove_user(ADMIN, "alice").unwrap();
        }

        let expected = snapshot(&memory);
        assert_eq!(snapshot(&relational), expected);
        assert_eq!(snapshot(&single_table), expected);
        assert_eq!(expected.stats.users, 1);
        // robert in both elections, plus the unregistered carol.
        assert_eq!(expected.stats.voters, 3);
    }
}
