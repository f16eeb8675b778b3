use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};

use crate::error::Result;
use crate::model::{Ballot, BallotSummary, ElectionSummary, RevealedBallot, Stats, User};
use crate::store::QueryModel;

use super::RelationalBackend;

const USER_COLUMNS: &str = "name, email, salt, hash, role";

const ELECTION_COLUMNS: &str =
    "name, owner_name, secret_ballot, no_voting_before, no_voting_after, allow_vote, allow_edit";

const BALLOT_SELECT: &str = "SELECT e.name, b.voter_name, b.rankings, b.confirmation, b.when_cast
     FROM ballot b JOIN election e ON e.election_id = b.election_id";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        name: row.get(0)?,
        email: row.get(1)?,
        salt: row.get(2)?,
        hash: row.get(3)?,
        role: row.get(4)?,
    })
}

fn election_from_row(row: &Row<'_>) -> rusqlite::Result<ElectionSummary> {
    Ok(ElectionSummary {
        name: row.get(0)?,
        owner_name: row.get(1)?,
        secret_ballot: row.get(2)?,
        no_voting_before: row.get(3)?,
        no_voting_after: row.get(4)?,
        allow_vote: row.get(5)?,
        allow_edit: row.get(6)?,
    })
}

/// A ballot row with its rankings still encoded.
struct BallotRow {
    election_name: String,
    voter_name: String,
    rankings: String,
    confirmation: String,
    when_cast: DateTime<Utc>,
}

impl BallotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            election_name: row.get(0)?,
            voter_name: row.get(1)?,
            rankings: row.get(2)?,
            confirmation: row.get(3)?,
            when_cast: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Ballot> {
        Ok(Ballot {
            election_name: self.election_name,
            voter_name: self.voter_name,
            rankings: serde_json::from_str(&self.rankings)?,
            confirmation: self.confirmation,
            when_cast: self.when_cast,
        })
    }
}

impl RelationalBackend {
    fn names(&self, sql: &str, election_name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names = stmt
            .query_map([election_name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn count(&self, table: &str) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn ballot_where(&self, filter: &str, params: impl rusqlite::Params) -> Result<Option<Ballot>> {
        let row = self
            .conn
            .query_row(&format!("{BALLOT_SELECT} WHERE {filter}"), params, BallotRow::from_row)
            .optional()?;
        row.map(BallotRow::decode).transpose()
    }
}

impl QueryModel for RelationalBackend {
    fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user WHERE name = ?1"),
                [name],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1"),
                [email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM user ORDER BY name"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn election(&self, name: &str) -> Result<Option<ElectionSummary>> {
        let election = self
            .conn
            .query_row(
                &format!("SELECT {ELECTION_COLUMNS} FROM election WHERE name = ?1"),
                [name],
                election_from_row,
            )
            .optional()?;
        Ok(election)
    }

    fn list_elections(&self) -> Result<Vec<ElectionSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ELECTION_COLUMNS} FROM election ORDER BY name"))?;
        let elections = stmt
            .query_map([], election_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(elections)
    }

    fn list_candidates(&self, election_name: &str) -> Result<Vec<String>> {
        self.names(
            "SELECT c.name FROM candidate c JOIN election e ON e.election_id = c.election_id
             WHERE e.name = ?1 ORDER BY c.name",
            election_name,
        )
    }

    fn list_voters(&self, election_name: &str) -> Result<Vec<String>> {
        self.names(
            "SELECT v.voter_name FROM eligible_voter v JOIN election e ON e.election_id = v.election_id
             WHERE e.name = ?1 ORDER BY v.voter_name",
            election_name,
        )
    }

    fn is_eligible(&self, election_name: &str, voter_name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM eligible_voter v JOIN election e ON e.election_id = v.election_id
                 WHERE e.name = ?1 AND v.voter_name = ?2",
                [election_name, voter_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn ballot(&self, election_name: &str, voter_name: &str) -> Result<Option<Ballot>> {
        self.ballot_where("e.name = ?1 AND b.voter_name = ?2", [election_name, voter_name])
    }

    fn list_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BALLOT_SELECT} WHERE e.name = ?1 ORDER BY b.voter_name"))?;
        let rows = stmt
            .query_map([election_name], BallotRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(BallotRow::decode).collect()
    }

    fn list_ballot_summaries(&self, election_name: &str) -> Result<Vec<BallotSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.voter_name, b.confirmation, b.when_cast
             FROM ballot b JOIN election e ON e.election_id = b.election_id
             WHERE e.name = ?1 ORDER BY b.voter_name",
        )?;
        let summaries = stmt
            .query_map([election_name], |row| {
                Ok(BallotSummary {
                    voter_name: row.get(0)?,
                    confirmation: row.get(1)?,
                    when_cast: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
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
        self.ballot_where(
            "e.name = ?1 AND b.confirmation = ?2",
            [election_name, confirmation],
        )
    }

    fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            users: self.count("user")?,
            elections: self.count("election")?,
            candidates: self.count("candidate")?,
            voters: self.count("eligible_voter")?,
            ballots: self.count("ballot")?,
        })
    }
}
