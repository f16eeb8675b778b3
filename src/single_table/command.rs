use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::logging::FanOut;
use crate::model::{Ballot, ElectionSummary, Role, User};
use crate::store::CommandModel;

use super::item::{Item, Record};
use super::keys::{
    election_partition, entity_key, natural_key, rename_guard_key, user_partition, Child, Key,
    NaturalKey, METADATA,
};
use super::table::Tables;
use super::SingleTableBackend;

/// A back-reference item; `key` is always a user-partition kind here.
fn reference(key: NaturalKey<'_>) -> Result<Item> {
    Item::reference(key).ok_or_else(|| Error::internal(format!("{key:?} is not a reference")))
}

/// The kinds of record that can be renamed.
#[derive(Debug, Clone, Copy)]
enum Renamed {
    User,
    Election,
}

impl Renamed {
    fn key(self, name: &str) -> NaturalKey<'_> {
        match self {
            Renamed::User => NaturalKey::User(name),
            Renamed::Election => NaturalKey::Election(name),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Renamed::User => "User",
            Renamed::Election => "Election",
        }
    }

    fn guard_key(self, name: &str) -> Key {
        rename_guard_key(entity_key(self.key(name)).pk)
    }
}

impl<T: Tables> SingleTableBackend<T> {
    /// The source of a rename into `to` that is still under way. A guard
    /// whose source no longer carries the matching marker is stale.
    fn live_rename_into(&self, kind: Renamed, to: &str) -> Result<Option<String>> {
        let Some(guard) = self.table.get_item(&kind.guard_key(to))? else {
            return Ok(None);
        };
        let Record::RenameGuard { from } = guard.record else {
            return Ok(None);
        };
        let source = self.get(kind.key(&from))?;
        Ok(source
            .filter(|item| item.renaming_to() == Some(to))
            .map(|_| from))
    }

    /// Claim `to` with a guard, then mark `old` as moving there. Repeating
    /// this for the same target is fine; a different target is refused
    /// until the pending rename completes.
    fn begin_rename(
        &self,
        kind: Renamed,
        old: Item,
        from: &str,
        to: &str,
        to_exists: bool,
    ) -> Result<Item> {
        let label = kind.label();
        match old.renaming_to() {
            Some(pending) if pending != to => {
                return Err(Error::conflict(format!(
                    "{label} {from} is being renamed to {pending}"
                )));
            }
            None if to_exists => return Err(Error::conflict(format!("{label} {to}"))),
            _ => {}
        }
        if let Some(other) = self.live_rename_into(kind, to)? {
            if other != from {
                return Err(Error::conflict(format!(
                    "{label} {other} is being renamed to {to}"
                )));
            }
        }
        self.table
            .put_item(&Item::rename_guard(kind.guard_key(to), from))?;
        let marked = old.with_renaming_to(Some(to));
        self.table.put_item(&marked)?;
        Ok(marked)
    }

    /// Drop the guard a rename from `from` left at `to`.
    fn end_rename(&self, kind: Renamed, from: &str, to: &str) -> Result<()> {
        let key = kind.guard_key(to);
        match self.table.get_item(&key)?.map(|item| item.record) {
            Some(Record::RenameGuard { from: guarded }) if guarded == from => {
                self.table.delete_item(&key)
            }
            _ => Ok(()),
        }
    }

    /// Delete every child of an election along with its back-reference,
    /// then any rename guard. References go first so a re-run still finds
    /// them through the child.
    fn clear_election_children(&self, election_name: &str) -> Result<()> {
        let items = self.table.query(&election_partition(election_name), "")?;
        let (guards, children): (Vec<Item>, Vec<Item>) = items
            .into_iter()
            .filter(|item| item.sk != METADATA)
            .partition(|item| matches!(item.record, Record::RenameGuard { .. }));

        for child in &children {
            match &child.record {
                Record::Voter { voter_name, .. } => {
                    self.table.delete_item(&entity_key(NaturalKey::Eligible {
                        user: voter_name,
                        election: election_name,
                    }))?;
                }
                Record::Ballot { voter_name, .. } => {
                    self.table.delete_item(&entity_key(NaturalKey::Cast {
                        user: voter_name,
                        election: election_name,
                    }))?;
                }
                _ => {}
            }
            self.table.delete_item(&child.key())?;
        }
        for guard in &guards {
            self.table.delete_item(&guard.key())?;
        }
        Ok(())
    }

    /// Put an election record back after editing its summary.
    fn update_election(
        &self,
        election_name: &str,
        edit: impl FnOnce(&mut ElectionSummary),
    ) -> Result<()> {
        let item = self.require_election(election_name)?;
        let mut election = item
            .to_election()
            .ok_or_else(|| Error::not_found(format!("Election {election_name}")))?;
        edit(&mut election);
        let updated = Item::election(&election).with_renaming_to(item.renaming_to());
        self.table.put_item(&updated)
    }

    /// Put a user record back after editing it.
    fn update_user(&self, name: &str, edit: impl FnOnce(&mut User)) -> Result<()> {
        let item = self.require_user(name)?;
        let mut user = item
            .to_user()
            .ok_or_else(|| Error::not_found(format!("User {name}")))?;
        edit(&mut user);
        let updated = Item::user(&user).with_renaming_to(item.renaming_to());
        self.table.put_item(&updated)
    }

    /// Back-references of one kind in a user's partition, as election names.
    fn references(&self, user: &str, child: Child) -> Result<Vec<String>> {
        let items = self.table.query(&user_partition(user), child.prefix())?;
        Ok(items
            .iter()
            .filter_map(|item| match &item.record {
                Record::Reference { election_name, .. } => Some(election_name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Copy the user partition of `from` over to `to`, then empty it.
    /// The old user record goes last so an interrupted move can be found
    /// and resumed.
    fn move_user_partition(&self, from: &str, to: &str) -> Result<()> {
        let items = self.table.query(&user_partition(from), "")?;
        let mut old_user = None;
        for item in &items {
            let key = item.key();
            match natural_key(&key) {
                Some(NaturalKey::User(_)) => old_user = Some(item),
                Some(NaturalKey::Owns { election, .. }) => {
                    self.table
                        .put_item(&reference(NaturalKey::Owns { user: to, election })?)?;
                }
                Some(NaturalKey::Eligible { election, .. }) => {
                    self.table
                        .put_item(&reference(NaturalKey::Eligible { user: to, election })?)?;
                }
                Some(NaturalKey::Cast { election, .. }) => {
                    self.table
                        .put_item(&reference(NaturalKey::Cast { user: to, election })?)?;
                }
                _ => debug!("Skipping unexpected item {key}"),
            }
        }

        if let Some(user) = old_user.and_then(Item::to_user) {
            self.table.put_item(&Item::user(&User {
                name: to.to_string(),
                ..user
            }))?;
        }

        for item in items.iter().filter(|item| item.sk != METADATA) {
            self.table.delete_item(&item.key())?;
        }
        if let Some(user) = old_user {
            self.table.delete_item(&user.key())?;
        }
        Ok(())
    }

    /// Copy every child of election `from` into the partition of `to`,
    /// repointing back-references as we go. Returns the old children.
    fn copy_election_children(&self, from: &str, to: &str, owner: &str) -> Result<Vec<Item>> {
        let children = self.table.query(&election_partition(from), "")?;
        let children: Vec<Item> = children
            .into_iter()
            .filter(|item| item.sk != METADATA)
            .collect();

        for item in &children {
            match &item.record {
                Record::Candidate { name, .. } => {
                    self.table.put_item(&Item::candidate(to, name))?;
                }
                Record::Voter { voter_name, .. } => {
                    self.table.put_item(&reference(NaturalKey::Eligible {
                        user: voter_name,
                        election: to,
                    })?)?;
                    self.table.put_item(&Item::voter(to, voter_name))?;
                    self.table.delete_item(&entity_key(NaturalKey::Eligible {
                        user: voter_name,
                        election: from,
                    }))?;
                }
                Record::Ballot { .. } => {
                    if let Some(mut ballot) = item.to_ballot() {
                        self.table.put_item(&reference(NaturalKey::Cast {
                            user: &ballot.voter_name,
                            election: to,
                        })?)?;
                        ballot.election_name = to.to_string();
                        self.table.put_item(&Item::ballot(&ballot))?;
                        self.table.delete_item(&entity_key(NaturalKey::Cast {
                            user: &ballot.voter_name,
                            election: from,
                        }))?;
                    }
                }
                _ => debug!("Skipping unexpected item {}", item.key()),
            }
        }

        self.table.put_item(&reference(NaturalKey::Owns {
            user: owner,
            election: to,
        })?)?;
        self.table.delete_item(&entity_key(NaturalKey::Owns {
            user: owner,
            election: from,
        }))?;
        Ok(children)
    }
}

impl<T: Tables> CommandModel for SingleTableBackend<T> {
    fn create_user(&self, authority: &str, user: &User) -> Result<()> {
        debug!("{authority} create_user {}", user.name);
        if self.get(NaturalKey::User(&user.name))?.is_some() {
            return Err(Error::conflict(format!("User {}", user.name)));
        }
        if let Some(from) = self.live_rename_into(Renamed::User, &user.name)? {
            return Err(Error::conflict(format!(
                "User {from} is being renamed to {}",
                user.name
            )));
        }
        if !self.table.query_email_index(&user.email)?.is_empty() {
            return Err(Error::conflict(format!("Email {}", user.email)));
        }
        self.table.put_item(&Item::user(user))
    }

    fn set_user_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        let fan_out = FanOut::start("set_user_name", authority, format!("{from} -> {to}"), 4);

        fan_out.step(1, "user record", || {
            let old = self.get(NaturalKey::User(from))?;
            let new = self.get(NaturalKey::User(to))?;
            match (old, new) {
                (None, _) if from == to => Err(Error::not_found(format!("User {from}"))),
                (Some(_), _) if from == to => Ok(()),
                (None, None) => Err(Error::not_found(format!("User {from}"))),
                // Moved by an earlier attempt.
                (None, Some(_)) => self.end_rename(Renamed::User, from, to),
                (Some(old), new) => {
                    self.begin_rename(Renamed::User, old, from, to, new.is_some())?;
                    self.move_user_partition(from, to)?;
                    self.end_rename(Renamed::User, from, to)
                }
            }
        })?;
        if from == to {
            return Ok(());
        }

        fan_out.step(2, "election owners", || {
            for election_name in self.references(to, Child::Owns)? {
                let Some(item) = self.get(NaturalKey::Election(&election_name))? else {
                    continue;
                };
                if let Some(mut election) = item.to_election() {
                    if election.owner_name == from {
                        election.owner_name = to.to_string();
                        let updated =
                            Item::election(&election).with_renaming_to(item.renaming_to());
                        self.table.put_item(&updated)?;
                    }
                }
            }
            Ok(())
        })?;

        fan_out.step(3, "voter eligibility", || {
            for election in self.references(to, Child::Eligible)? {
                let old = NaturalKey::Voter {
                    election: &election,
                    voter: from,
                };
                if self.get(old)?.is_some() {
                    self.table.put_item(&Item::voter(&election, to))?;
                    self.table.delete_item(&entity_key(old))?;
                }
            }
            Ok(())
        })?;

        fan_out.step(4, "ballots", || {
            for election in self.references(to, Child::Cast)? {
                let old = NaturalKey::Ballot {
                    election: &election,
                    voter: from,
                };
                if let Some(mut ballot) = self.get(old)?.and_then(|item| item.to_ballot()) {
                    ballot.voter_name = to.to_string();
                    self.table.put_item(&Item::ballot(&ballot))?;
                    self.table.delete_item(&entity_key(old))?;
                }
            }
            Ok(())
        })
    }

    fn set_user_email(&self, authority: &str, name: &str, email: &str) -> Result<()> {
        debug!("{authority} set_user_email {name}");
        let taken = self
            .table
            .query_email_index(email)?
            .iter()
            .filter_map(Item::to_user)
            .any(|other| other.name != name);
        if taken {
            return Err(Error::conflict(format!("Email {email}")));
        }
        self.update_user(name, |user| user.email = email.to_string())
    }

    fn set_user_role(&self, authority: &str, name: &str, role: Role) -> Result<()> {
        debug!("{authority} set_user_role {name} {role:?}");
        self.update_user(name, |user| user.role = role)
    }

    fn set_user_password(
        &self,
        authority: &str,
        name: &str,
        salt: &str,
        hash: &str,
    ) -> Result<()> {
        debug!("{authority} set_user_password {name}");
        self.update_user(name, |user| {
            user.salt = salt.to_string();
            user.hash = hash.to_string();
        })
    }

    fn remove_user(&self, authority: &str, name: &str) -> Result<()> {
        let fan_out = FanOut::start("remove_user", authority, name, 2);
        let user = self.require_user(name)?;
        if let Some(to) = user.renaming_to() {
            return Err(Error::conflict(format!("User {name} is being renamed to {to}")));
        }

        fan_out.step(1, "voter eligibility", || {
            for election in self.references(name, Child::Eligible)? {
                self.table.delete_item(&entity_key(NaturalKey::Voter {
                    election: &election,
                    voter: name,
                }))?;
                self.table.delete_item(&entity_key(NaturalKey::Eligible {
                    user: name,
                    election: &election,
                }))?;
            }
            Ok(())
        })?;

        // Ownership and ballot references stay: those rows keep the name.
        fan_out.step(2, "user record", || self.table.delete_item(&user.key()))
    }

    fn add_election(&self, authority: &str, owner_name: &str, election_name: &str) -> Result<()> {
        debug!("{authority} add_election {election_name} for {owner_name}");
        let leftovers = self.table.query(&election_partition(election_name), "")?;
        if leftovers.iter().any(|item| item.sk == METADATA) {
            return Err(Error::conflict(format!("Election {election_name}")));
        }
        if let Some(from) = self.live_rename_into(Renamed::Election, election_name)? {
            return Err(Error::conflict(format!(
                "Election {from} is being renamed to {election_name}"
            )));
        }
        if leftovers
            .iter()
            .any(|item| !matches!(item.record, Record::RenameGuard { .. }))
        {
            return Err(Error::conflict(format!(
                "Election {election_name} still holds items from an unfinished rename"
            )));
        }
        self.require_user(owner_name)?;
        // Only stale guards are left.
        for guard in &leftovers {
            self.table.delete_item(&guard.key())?;
        }
        self.table.put_item(&reference(NaturalKey::Owns {
            user: owner_name,
            election: election_name,
        })?)?;
        self.table
            .put_item(&Item::election(&ElectionSummary::new(election_name, owner_name)))
    }

    fn set_election_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        let fan_out = FanOut::start("set_election_name", authority, format!("{from} -> {to}"), 4);

        let old = fan_out.step(1, "rename guard and marker", || {
            let old = self.get(NaturalKey::Election(from))?;
            let new = self.get(NaturalKey::Election(to))?;
            match (old, new) {
                (None, _) if from == to => Err(Error::not_found(format!("Election {from}"))),
                (Some(_), _) if from == to => Ok(None),
                (None, None) => Err(Error::not_found(format!("Election {from}"))),
                // Finished by an earlier attempt.
                (None, Some(_)) => {
                    self.end_rename(Renamed::Election, from, to)?;
                    Ok(None)
                }
                (Some(old), new) => self
                    .begin_rename(Renamed::Election, old, from, to, new.is_some())
                    .map(Some),
            }
        })?;
        let Some(old) = old else {
            return Ok(());
        };
        let Some(mut election) = old.to_election() else {
            return Err(Error::not_found(format!("Election {from}")));
        };

        let children = fan_out.step(2, "children and back-references", || {
            self.copy_election_children(from, to, &election.owner_name)
        })?;

        fan_out.step(3, "election record", || {
            election.name = to.to_string();
            self.table.put_item(&Item::election(&election))
        })?;

        fan_out.step(4, "old partition", || {
            for item in &children {
                self.table.delete_item(&item.key())?;
            }
            self.table.delete_item(&old.key())?;
            self.end_rename(Renamed::Election, from, to)
        })
    }

    fn set_secret_ballot(&self, authority: &str, election_name: &str, secret: bool) -> Result<()> {
        debug!("{authority} set_secret_ballot {election_name} {secret}");
        self.update_election(election_name, |election| election.secret_ballot = secret)
    }

    fn set_voting_window(
        &self,
        authority: &str,
        election_name: &str,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
    ) -> Result<()> {
        debug!("{authority} set_voting_window {election_name}");
        self.update_election(election_name, |election| {
            election.no_voting_before = no_voting_before;
            election.no_voting_after = no_voting_after;
        })
    }

    fn set_allow_vote(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_vote {election_name} {allow}");
        self.update_election(election_name, |election| election.allow_vote = allow)
    }

    fn set_allow_edit(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_edit {election_name} {allow}");
        self.update_election(election_name, |election| election.allow_edit = allow)
    }

    fn delete_election(&self, authority: &str, election_name: &str) -> Result<()> {
        let fan_out = FanOut::start("delete_election", authority, election_name, 4);
        let item = self.require_election(election_name)?;
        let owner_name = item
            .to_election()
            .map(|election| election.owner_name)
            .ok_or_else(|| Error::not_found(format!("Election {election_name}")))?;

        // Whatever an unfinished rename already copied goes too.
        fan_out.step(1, "rename target", || match item.renaming_to() {
            Some(target) => {
                // References are copied ahead of their child.
                for child in self.table.query(&election_partition(election_name), "")? {
                    let copied = match &child.record {
                        Record::Voter { voter_name, .. } => NaturalKey::Eligible {
                            user: voter_name,
                            election: target,
                        },
                        Record::Ballot { voter_name, .. } => NaturalKey::Cast {
                            user: voter_name,
                            election: target,
                        },
                        _ => continue,
                    };
                    self.table.delete_item(&entity_key(copied))?;
                }
                self.clear_election_children(target)?;
                self.table.delete_item(&entity_key(NaturalKey::Owns {
                    user: &owner_name,
                    election: target,
                }))?;
                self.table
                    .delete_item(&entity_key(NaturalKey::Election(target)))
            }
            None => Ok(()),
        })?;

        fan_out.step(2, "children", || self.clear_election_children(election_name))?;

        fan_out.step(3, "owner reference", || {
            self.table.delete_item(&entity_key(NaturalKey::Owns {
                user: &owner_name,
                election: election_name,
            }))
        })?;

        fan_out.step(4, "election record", || self.table.delete_item(&item.key()))
    }

    fn add_candidates(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_candidates {election_name} {names:?}");
        self.require_election(election_name)?;
        for name in names {
            self.table.put_item(&Item::candidate(election_name, name))?;
        }
        Ok(())
    }

    fn remove_candidates(
        &self,
        authority: &str,
        election_name: &str,
        names: &[String],
    ) -> Result<()> {
        debug!("{authority} remove_candidates {election_name} {names:?}");
        self.require_election(election_name)?;
        for name in names {
            self.table.delete_item(&entity_key(NaturalKey::Candidate {
                election: election_name,
                name,
            }))?;
        }
        Ok(())
    }

    fn add_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_voters {election_name} {names:?}");
        self.require_election(election_name)?;
        for name in names {
            self.table.put_item(&reference(NaturalKey::Eligible {
                user: name,
                election: election_name,
            })?)?;
            self.table.put_item(&Item::voter(election_name, name))?;
        }
        Ok(())
    }

    fn remove_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} remove_voters {election_name} {names:?}");
        self.require_election(election_name)?;
        for name in names {
            self.table.delete_item(&entity_key(NaturalKey::Voter {
                election: election_name,
                voter: name,
            }))?;
            self.table.delete_item(&entity_key(NaturalKey::Eligible {
                user: name,
                election: election_name,
            }))?;
        }
        Ok(())
    }

    fn cast_ballot(&self, authority: &str, ballot: &Ballot) -> Result<()> {
        debug!(
            "{authority} cast_ballot {} by {}",
            ballot.election_name, ballot.voter_name
        );
        self.require_election(&ballot.election_name)?;
        self.table.put_item(&reference(NaturalKey::Cast {
            user: &ballot.voter_name,
            election: &ballot.election_name,
        })?)?;
        self.table.put_item(&Item::ballot(ballot))
    }
}
