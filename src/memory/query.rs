use crate::error::Result;
use crate::model::{Ballot, BallotSummary, ElectionSummary, RevealedBallot, Stats, User};
use crate::store::QueryModel;

use super::MemoryBackend;

impl QueryModel for MemoryBackend {
    fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self.state.borrow().users.get(name).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.borrow();
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.borrow().users.values().cloned().collect())
    }

    fn election(&self, name: &str) -> Result<Option<ElectionSummary>> {
        Ok(self.state.borrow().elections.get(name).cloned())
    }

    fn list_elections(&self) -> Result<Vec<ElectionSummary>> {
        Ok(self.state.borrow().elections.values().cloned().collect())
    }

    fn list_candidates(&self, election_name: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        Ok(state
            .candidates
            .get(election_name)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn list_voters(&self, election_name: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        Ok(state
            .voters
            .get(election_name)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn is_eligible(&self, election_name: &str, voter_name: &str) -> Result<bool> {
        let state = self.state.borrow();
        Ok(state
            .voters
            .get(election_name)
            .map_or(false, |voters| voters.contains(voter_name)))
    }

    fn ballot(&self, election_name: &str, voter_name: &str) -> Result<Option<Ballot>> {
        let state = self.state.borrow();
        Ok(state
            .ballots
            .get(election_name)
            .and_then(|ballots| ballots.get(voter_name))
            .cloned())
    }

    fn list_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let state = self.state.borrow();
        Ok(state
            .ballots
            .get(election_name)
            .map(|ballots| ballots.values().cloned().collect())
            .unwrap_or_default())
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
        let state = self.state.borrow();
        Ok(state
            .ballots
            .get(election_name)
            .and_then(|ballots| {
                ballots
                    .values()
                    .find(|ballot| ballot.confirmation == confirmation)
            })
            .cloned())
    }

    fn stats(&self) -> Result<Stats> {
        let state = self.state.borrow();
        Ok(Stats {
            users: state.users.len() as u64,
            elections: state.elections.len() as u64,
            candidates: state.candidates.values().map(|set| set.len() as u64).sum(),
            voters: state.voters.values().map(|set| set.len() as u64).sum(),
            ballots: state.ballots.values().map(|map| map.len() as u64).sum(),
        })
    }
}
