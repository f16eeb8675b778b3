//! Keeping a store's projection in step with its event log.
//!
//! Every [`Event`] maps onto exactly one [`CommandModel`] call. Callers go
//! through [`record`], which appends first and projects second, so nothing
//! reaches the command model without a matching log entry. If the
//! projection step fails the event is still logged; [`synchronize`] can
//! replay it later.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error::Result;
use crate::model::Event;
use crate::store::{CommandModel, EventLog};

/// Apply one event to a store's command model.
pub fn apply<C>(store: &C, authority: &str, event: &Event) -> Result<()>
where
    C: CommandModel + ?Sized,
{
    debug!("Applying {} by {authority}", event.kind());
    match event {
        Event::UserCreated(user) => store.create_user(authority, user),
        Event::UserNameChanged { from, to } => store.set_user_name(authority, from, to),
        Event::UserEmailChanged { name, email } => store.set_user_email(authority, name, email),
        Event::UserRoleChanged { name, role } => store.set_user_role(authority, name, *role),
        Event::UserPasswordChanged { name, salt, hash } => {
            store.set_user_password(authority, name, salt, hash)
        }
        Event::UserRemoved { name } => store.remove_user(authority, name),
        Event::ElectionAdded {
            owner_name,
            election_name,
        } => store.add_election(authority, owner_name, election_name),
        Event::ElectionNameChanged { from, to } => store.set_election_name(authority, from, to),
        Event::ElectionSecretBallotChanged {
            election_name,
            secret_ballot,
        } => store.set_secret_ballot(authority, election_name, *secret_ballot),
        Event::ElectionVotingWindowChanged {
            election_name,
            no_voting_before,
            no_voting_after,
        } => store.set_voting_window(authority, election_name, *no_voting_before, *no_voting_after),
        Event::ElectionAllowVoteChanged {
            election_name,
            allow_vote,
        } => store.set_allow_vote(authority, election_name, *allow_vote),
        Event::ElectionAllowEditChanged {
            election_name,
            allow_edit,
        } => store.set_allow_edit(authority, election_name, *allow_edit),
        Event::ElectionDeleted { election_name } => store.delete_election(authority, election_name),
        Event::CandidatesAdded {
            election_name,
            candidate_names,
        } => store.add_candidates(authority, election_name, candidate_names),
        Event::CandidatesRemoved {
            election_name,
            candidate_names,
        } => store.remove_candidates(authority, election_name, candidate_names),
        Event::VotersAdded {
            election_name,
            voter_names,
        } => store.add_voters(authority, election_name, voter_names),
        Event::VotersRemoved {
            election_name,
            voter_names,
        } => store.remove_voters(authority, election_name, voter_names),
        Event::BallotCast(ballot) => store.cast_ballot(authority, ballot),
    }
}

/// Append an event to the store's log, then apply it to its projection.
pub fn record<B>(store: &B, authority: &str, when: DateTime<Utc>, event: &Event) -> Result<()>
where
    B: EventLog + CommandModel + ?Sized,
{
    store.append_event(authority, when, event)?;
    apply(store, authority, event)
}

/// Replay every event in `source` that `target` has not yet seen into
/// `target`'s projection, advancing its sync state after each one.
///
/// Returns the number of events applied. Stops at the first failure; the
/// sync state then points at the last event that applied cleanly.
pub fn synchronize<S, T>(source: &S, target: &T) -> Result<usize>
where
    S: EventLog + ?Sized,
    T: EventLog + CommandModel + ?Sized,
{
    let last_id = target.last_synced_event_id()?;
    let pending = source.events_to_sync(last_id)?;
    info!("Synchronising {} events after #{last_id}", pending.len());
    for envelope in &pending {
        apply(target, &envelope.authority, &envelope.event)?;
        target.set_last_synced_event_id(envelope.id)?;
    }
    Ok(pending.len())
}
