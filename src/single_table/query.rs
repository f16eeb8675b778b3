use crate::error::Result;
use crate::model::{Ballot, BallotSummary, ElectionSummary, RevealedBallot, Stats, User};
use crate::store::QueryModel;

use super::item::{Item, Record};
use super::keys::{election_partition, Child, NaturalKey};
use super::table::Tables;
use super::SingleTableBackend;

impl<T: Tables> SingleTableBackend<T> {
    fn children(&self, election_name: &str, child: Child) -> Result<Vec<Item>> {
        self.table
            .query(&election_partition(election_name), child.prefix())
    }
}

impl<T: Tables> QueryModel for SingleTableBackend<T> {
    fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        let item = self.get(NaturalKey::User(name))?;
        Ok(item.as_ref().and_then(Item::to_user))
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let items = self.table.query_email_index(email)?;
        // Mid-rename, the old record still carries the email too.
        let settled = items.iter().find(|item| item.renaming_to().is_none());
        Ok(settled.or(items.first()).and_then(Item::to_user))
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let items = self.table.scan()?;
        Ok(items.iter().filter_map(Item::to_user).collect())
    }

    fn election(&self, name: &str) -> Result<Option<ElectionSummary>> {
        let item = self.get(NaturalKey::Election(name))?;
        Ok(item.as_ref().and_then(Item::to_election))
    }

    fn list_elections(&self) -> Result<Vec<ElectionSummary>> {
        let items = self.table.scan()?;
        Ok(items.iter().filter_map(Item::to_election).collect())
    }

    fn list_candidates(&self, election_name: &str) -> Result<Vec<String>> {
        let items = self.children(election_name, Child::Candidate)?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item.record {
                Record::Candidate { name, .. } => Some(name),
                _ => None,
            })
            .collect())
    }

    fn list_voters(&self, election_name: &str) -> Result<Vec<String>> {
        let items = self.children(election_name, Child::Voter)?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item.record {
                Record::Voter { voter_name, .. } => Some(voter_name),
                _ => None,
            })
            .collect())
    }

    fn is_eligible(&self, election_name: &str, voter_name: &str) -> Result<bool> {
        let key = NaturalKey::Voter {
            election: election_name,
            voter: voter_name,
        };
        Ok(self.get(key)?.is_some())
    }

    fn ballot(&self, election_name: &str, voter_name: &str) -> Result<Option<Ballot>> {
        let key = NaturalKey::Ballot {
            election: election_name,
            voter: voter_name,
        };
        Ok(self.get(key)?.as_ref().and_then(Item::to_ballot))
    }

    fn list_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let items = self.children(election_name, Child::Ballot)?;
        Ok(items.iter().filter_map(Item::to_ballot).collect())
    }

    fn list_ballot_summaries(&self, election_name: &str) -> Result<Vec<BallotSummary>> {
        let ballots = self.list_ballots(election_name)?;
        Ok(ballots.iter().map(BallotSummary::from).collect())
    }

    fn list_revealed_ballots(&self, election_name: &str) -> Result<Vec<RevealedBallot>> {
        let Some(election) = self.election(election_name)? else {
            return Ok(Vec::new());
        };
        let ballots = self.list_ballots(election_name)?;
        Ok(ballots
            .into_iter()
            .map(|ballot| RevealedBallot::reveal(ballot, election.secret_ballot))
            .collect())
    }

    fn ballot_by_confirmation(
        &self,
        election_name: &str,
        confirmation: &str,
    ) -> Result<Option<Ballot>> {
        let ballots = self.list_ballots(election_name)?;
        Ok(ballots
            .into_iter()
            .find(|ballot| ballot.confirmation == confirmation))
    }

    fn stats(&self) -> Result<Stats> {
        let mut stats = Stats::default();
        for item in self.table.scan()? {
            match item.record {
                Record::User { .. } => stats.users += 1,
                Record::Election { .. } => stats.elections += 1,
                Record::Candidate { .. } => stats.candidates += 1,
                Record::Voter { .. } => stats.voters += 1,
                Record::Ballot { .. } => stats.ballots += 1,
                Record::Reference { .. }
                | Record::RenameGuard { .. }
                | Record::SyncState { .. }
                | Record::Counter { .. } => {}
            }
        }
        Ok(stats)
    }
}
