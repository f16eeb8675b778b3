//! Transient in-process store.
//!
//! Plain ordered maps and sets behind `RefCell`s. There is no concurrency
//! control at all, and the type is deliberately `!Sync`: use it from one
//! thread, in tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Ballot, ElectionSummary, EventEnvelope, User};

mod command;
mod event_log;
mod query;

/// Election name -> member names.
type Membership = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Default)]
struct State {
    /// Keyed by user name.
    users: BTreeMap<String, User>,
    /// Keyed by election name.
    elections: BTreeMap<String, ElectionSummary>,
    candidates: Membership,
    voters: Membership,
    /// Election name -> voter name -> ballot.
    ballots: BTreeMap<String, BTreeMap<String, Ballot>>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RefCell<State>,
    events: RefCell<Vec<EventEnvelope>>,
    /// Id of the most recently appended event.
    last_event_id: Cell<u64>,
    last_synced_event_id: Cell<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}
