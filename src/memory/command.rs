use std::cell::RefMut;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::logging::FanOut;
use crate::model::{Ballot, ElectionSummary, Role, User};
use crate::store::CommandModel;

use super::{MemoryBackend, State};

impl MemoryBackend {
    fn user_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut User> {
        state
            .users
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("User {name}")))
    }

    fn election_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut ElectionSummary> {
        state
            .elections
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("Election {name}")))
    }

    /// Borrow the state, failing if the election does not exist.
    fn with_election(&self, name: &str) -> Result<RefMut<'_, State>> {
        let state = self.state.borrow_mut();
        if state.elections.contains_key(name) {
            Ok(state)
        } else {
            Err(Error::not_found(format!("Election {name}")))
        }
    }
}

impl CommandModel for MemoryBackend {
    fn create_user(&self, authority: &str, user: &User) -> Result<()> {
        debug!("{authority} create_user {}", user.name);
        let mut state = self.state.borrow_mut();
        if state.users.contains_key(&user.name) {
            return Err(Error::conflict(format!("User {}", user.name)));
        }
        if state.users.values().any(|other| other.email == user.email) {
            return Err(Error::conflict(format!("Email {}", user.email)));
        }
        state.users.insert(user.name.clone(), user.clone());
        Ok(())
    }

    fn set_user_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        let fan_out = FanOut::start("set_user_name", authority, format!("{from} -> {to}"), 4);
        let mut state = self.state.borrow_mut();

        fan_out.step(1, "user record", || {
            match (state.users.contains_key(from), state.users.contains_key(to)) {
                (true, true) if from != to => Err(Error::conflict(format!("User {to}"))),
                (false, false) => Err(Error::not_found(format!("User {from}"))),
                (true, _) => {
                    if let Some(mut user) = state.users.remove(from) {
                        user.name = to.to_string();
                        state.users.insert(to.to_string(), user);
                    }
                    Ok(())
                }
                // Already moved by an earlier attempt.
                (false, true) => Ok(()),
            }
        })?;
        if from == to {
            return Ok(());
        }

        fan_out.step(2, "election owners", || {
            for election in state.elections.values_mut() {
                if election.owner_name == from {
                    election.owner_name = to.to_string();
                }
            }
            Ok(())
        })?;

        fan_out.step(3, "voter eligibility", || {
            for voters in state.voters.values_mut() {
                if voters.remove(from) {
                    voters.insert(to.to_string());
                }
            }
            Ok(())
        })?;

        fan_out.step(4, "ballots", || {
            for ballots in state.ballots.values_mut() {
                if let Some(mut ballot) = ballots.remove(from) {
                    ballot.voter_name = to.to_string();
                    ballots.insert(to.to_string(), ballot);
                }
            }
            Ok(())
        })
    }

    fn set_user_email(&self, authority: &str, name: &str, email: &str) -> Result<()> {
        debug!("{authority} set_user_email {name}");
        let mut state = self.state.borrow_mut();
        if state
            .users
            .values()
            .any(|other| other.email == email && other.name != name)
        {
            return Err(Error::conflict(format!("Email {email}")));
        }
        Self::user_mut(&mut state, name)?.email = email.to_string();
        Ok(())
    }

    fn set_user_role(&self, authority: &str, name: &str, role: Role) -> Result<()> {
        debug!("{authority} set_user_role {name} {role:?}");
        let mut state = self.state.borrow_mut();
        Self::user_mut(&mut state, name)?.role = role;
        Ok(())
    }

    fn set_user_password(
        &self,
        authority: &str,
        name: &str,
        salt: &str,
        hash: &str,
    ) -> Result<()> {
        debug!("{authority} set_user_password {name}");
        let mut state = self.state.borrow_mut();
        let user = Self::user_mut(&mut state, name)?;
        user.salt = salt.to_string();
        user.hash = hash.to_string();
        Ok(())
    }

    fn remove_user(&self, authority: &str, name: &str) -> Result<()> {
        let fan_out = FanOut::start("remove_user", authority, name, 2);
        let mut state = self.state.borrow_mut();
        if !state.users.contains_key(name) {
            return Err(Error::not_found(format!("User {name}")));
        }
        fan_out.step(1, "voter eligibility", || {
            for voters in state.voters.values_mut() {
                voters.remove(name);
            }
            Ok(())
        })?;
        fan_out.step(2, "user record", || {
            state.users.remove(name);
            Ok(())
        })
    }

    fn add_election(&self, authority: &str, owner_name: &str, election_name: &str) -> Result<()> {
        debug!("{authority} add_election {election_name} for {owner_name}");
        let mut state = self.state.borrow_mut();
        if state.elections.contains_key(election_name) {
            return Err(Error::conflict(format!("Election {election_name}")));
        }
        if !state.users.contains_key(owner_name) {
            return Err(Error::not_found(format!("User {owner_name}")));
        }
        state.elections.insert(
            election_name.to_string(),
            ElectionSummary::new(election_name, owner_name),
        );
        Ok(())
    }

    fn set_election_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        debug!("{authority} set_election_name {from} -> {to}");
        let mut state = self.state.borrow_mut();
        match (
            state.elections.contains_key(from),
            state.elections.contains_key(to),
        ) {
            (true, true) if from != to => return Err(Error::conflict(format!("Election {to}"))),
            (false, false) => return Err(Error::not_found(format!("Election {from}"))),
            (true, false) => {}
            _ => return Ok(()),
        }

        if let Some(mut election) = state.elections.remove(from) {
            election.name = to.to_string();
            state.elections.insert(to.to_string(), election);
        }
        if let Some(candidates) = state.candidates.remove(from) {
            state.candidates.insert(to.to_string(), candidates);
        }
        if let Some(voters) = state.voters.remove(from) {
            state.voters.insert(to.to_string(), voters);
        }
        if let Some(mut ballots) = state.ballots.remove(from) {
            for ballot in ballots.values_mut() {
                ballot.election_name = to.to_string();
            }
            state.ballots.insert(to.to_string(), ballots);
        }
        Ok(())
    }

    fn set_secret_ballot(&self, authority: &str, election_name: &str, secret: bool) -> Result<()> {
        debug!("{authority} set_secret_ballot {election_name} {secret}");
        let mut state = self.state.borrow_mut();
        Self::election_mut(&mut state, election_name)?.secret_ballot = secret;
        Ok(())
    }

    fn set_voting_window(
        &self,
        authority: &str,
        election_name: &str,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
    ) -> Result<()> {
        debug!("{authority} set_voting_window {election_name}");
        let mut state = self.state.borrow_mut();
        let election = Self::election_mut(&mut state, election_name)?;
        election.no_voting_before = no_voting_before;
        election.no_voting_after = no_voting_after;
        Ok(())
    }

    fn set_allow_vote(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_vote {election_name} {allow}");
        let mut state = self.state.borrow_mut();
        Self::election_mut(&mut state, election_name)?.allow_vote = allow;
        Ok(())
    }

    fn set_allow_edit(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_edit {election_name} {allow}");
        let mut state = self.state.borrow_mut();
        Self::election_mut(&mut state, election_name)?.allow_edit = allow;
        Ok(())
    }

    fn delete_election(&self, authority: &str, election_name: &str) -> Result<()> {
        debug!("{authority} delete_election {election_name}");
        let mut state = self.with_election(election_name)?;
        state.candidates.remove(election_name);
        state.voters.remove(election_name);
        state.ballots.remove(election_name);
        state.elections.remove(election_name);
        Ok(())
    }

    fn add_candidates(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_candidates {election_name} {names:?}");
        let mut state = self.with_election(election_name)?;
        state
            .candidates
            .entry(election_name.to_string())
            .or_default()
            .extend(names.iter().cloned());
        Ok(())
    }

    fn remove_candidates(
        &self,
        authority: &str,
        election_name: &str,
        names: &[String],
    ) -> Result<()> {
        debug!("{authority} remove_candidates {election_name} {names:?}");
        let mut state = self.with_election(election_name)?;
        if let Some(candidates) = state.candidates.get_mut(election_name) {
            for name in names {
                candidates.remove(name);
            }
        }
        Ok(())
    }

    fn add_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_voters {election_name} {names:?}");
        let mut state = self.with_election(election_name)?;
        state
            .voters
            .entry(election_name.to_string())
            .or_default()
            .extend(names.iter().cloned());
        Ok(())
    }

    fn remove_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} remove_voters {election_name} {names:?}");
        let mut state = self.with_election(election_name)?;
        if let Some(voters) = state.voters.get_mut(election_name) {
            for name in names {
                voters.remove(name);
            }
        }
        Ok(())
    }

    fn cast_ballot(&self, authority: &str, ballot: &Ballot) -> Result<()> {
        debug!(
            "{authority} cast_ballot {} by {}",
            ballot.election_name, ballot.voter_name
        );
        let mut state = self.with_election(&ballot.election_name)?;
        state
            .ballots
            .entry(ballot.election_name.clone())
            .or_default()
            .insert(ballot.voter_name.clone(), ballot.clone());
        Ok(())
    }
}
