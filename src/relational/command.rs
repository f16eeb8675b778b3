use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::params;

use crate::error::{Error, Result};
use crate::logging::FanOut;
use crate::model::{Ballot, Role, User};
use crate::store::CommandModel;

use super::keys::{election_id, email_owner, require_election_id, user_exists};
use super::RelationalBackend;

impl RelationalBackend {
    /// Run a single-row `UPDATE` on the named user.
    fn update_user(&self, name: &str, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        match self.conn.execute(sql, params)? {
            0 => Err(Error::not_found(format!("User {name}"))),
            _ => Ok(()),
        }
    }

    /// Run a single-row `UPDATE` on the named election.
    fn update_election(
        &self,
        election_name: &str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<()> {
        match self.conn.execute(sql, params)? {
            0 => Err(Error::not_found(format!("Election {election_name}"))),
            _ => Ok(()),
        }
    }
}

impl CommandModel for RelationalBackend {
    fn create_user(&self, authority: &str, user: &User) -> Result<()> {
        debug!("{authority} create_user {}", user.name);
        if user_exists(&self.conn, &user.name)? {
            return Err(Error::conflict(format!("User {}", user.name)));
        }
        if email_owner(&self.conn, &user.email)?.is_some() {
            return Err(Error::conflict(format!("Email {}", user.email)));
        }
        self.conn.execute(
            "INSERT INTO user (name, email, salt, hash, role) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.name, user.email, user.salt, user.hash, user.role],
        )?;
        Ok(())
    }

    fn set_user_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        let fan_out = FanOut::start("set_user_name", authority, format!("{from} -> {to}"), 4);

        fan_out.step(1, "user record", || {
            match (user_exists(&self.conn, from)?, user_exists(&self.conn, to)?) {
                (true, true) if from != to => Err(Error::conflict(format!("User {to}"))),
                (false, false) => Err(Error::not_found(format!("User {from}"))),
                (true, false) => {
                    self.conn
                        .execute("UPDATE user SET name = ?2 WHERE name = ?1", [from, to])?;
                    Ok(())
                }
                // Either a no-op, or moved by an earlier attempt.
                _ => Ok(()),
            }
        })?;
        if from == to {
            return Ok(());
        }

        fan_out.step(2, "election owners", || {
            self.conn.execute(
                "UPDATE election SET owner_name = ?2 WHERE owner_name = ?1",
                [from, to],
            )?;
            Ok(())
        })?;

        fan_out.step(3, "voter eligibility", || {
            self.conn.execute(
                "UPDATE OR REPLACE eligible_voter SET voter_name = ?2 WHERE voter_name = ?1",
                [from, to],
            )?;
            Ok(())
        })?;

        fan_out.step(4, "ballots", || {
            self.conn.execute(
                "UPDATE OR REPLACE ballot SET voter_name = ?2 WHERE voter_name = ?1",
                [from, to],
            )?;
            Ok(())
        })
    }

    fn set_user_email(&self, authority: &str, name: &str, email: &str) -> Result<()> {
        debug!("{authority} set_user_email {name}");
        match email_owner(&self.conn, email)? {
            Some(owner) if owner != name => Err(Error::conflict(format!("Email {email}"))),
            _ => self.update_user(
                name,
                "UPDATE user SET email = ?2 WHERE name = ?1",
                [name, email],
            ),
        }
    }

    fn set_user_role(&self, authority: &str, name: &str, role: Role) -> Result<()> {
        debug!("{authority} set_user_role {name} {role:?}");
        self.update_user(
            name,
            "UPDATE user SET role = ?2 WHERE name = ?1",
            params![name, role],
        )
    }

    fn set_user_password(
        &self,
        authority: &str,
        name: &str,
        salt: &str,
        hash: &str,
    ) -> Result<()> {
        debug!("{authority} set_user_password {name}");
        self.update_user(
            name,
            "UPDATE user SET salt = ?2, hash = ?3 WHERE name = ?1",
            [name, salt, hash],
        )
    }

    fn remove_user(&self, authority: &str, name: &str) -> Result<()> {
        let fan_out = FanOut::start("remove_user", authority, name, 2);
        if !user_exists(&self.conn, name)? {
            return Err(Error::not_found(format!("User {name}")));
        }
        fan_out.step(1, "voter eligibility", || {
            self.conn
                .execute("DELETE FROM eligible_voter WHERE voter_name = ?1", [name])?;
            Ok(())
        })?;
        fan_out.step(2, "user record", || {
            self.conn.execute("DELETE FROM user WHERE name = ?1", [name])?;
            Ok(())
        })
    }

    fn add_election(&self, authority: &str, owner_name: &str, election_name: &str) -> Result<()> {
        debug!("{authority} add_election {election_name} for {owner_name}");
        if election_id(&self.conn, election_name)?.is_some() {
            return Err(Error::conflict(format!("Election {election_name}")));
        }
        if !user_exists(&self.conn, owner_name)? {
            return Err(Error::not_found(format!("User {owner_name}")));
        }
        self.conn.execute(
            "INSERT INTO election
                 (name, owner_name, secret_ballot, no_voting_before, no_voting_after, allow_vote, allow_edit)
             VALUES (?1, ?2, 1, NULL, NULL, 0, 0)",
            [election_name, owner_name],
        )?;
        Ok(())
    }

    fn set_election_name(&self, authority: &str, from: &str, to: &str) -> Result<()> {
        debug!("{authority} set_election_name {from} -> {to}");
        match (election_id(&self.conn, from)?, election_id(&self.conn, to)?) {
            (Some(_), Some(_)) if from != to => Err(Error::conflict(format!("Election {to}"))),
            (None, None) => Err(Error::not_found(format!("Election {from}"))),
            (Some(id), None) => {
                // Children hang off the surrogate key, so they follow along.
                self.conn.execute(
                    "UPDATE election SET name = ?2 WHERE election_id = ?1",
                    params![id, to],
                )?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn set_secret_ballot(&self, authority: &str, election_name: &str, secret: bool) -> Result<()> {
        debug!("{authority} set_secret_ballot {election_name} {secret}");
        self.update_election(
            election_name,
            "UPDATE election SET secret_ballot = ?2 WHERE name = ?1",
            params![election_name, secret],
        )
    }

    fn set_voting_window(
        &self,
        authority: &str,
        election_name: &str,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
    ) -> Result<()> {
        debug!("{authority} set_voting_window {election_name}");
        self.update_election(
            election_name,
            "UPDATE election SET no_voting_before = ?2, no_voting_after = ?3 WHERE name = ?1",
            params![election_name, no_voting_before, no_voting_after],
        )
    }

    fn set_allow_vote(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_vote {election_name} {allow}");
        self.update_election(
            election_name,
            "UPDATE election SET allow_vote = ?2 WHERE name = ?1",
            params![election_name, allow],
        )
    }

    fn set_allow_edit(&self, authority: &str, election_name: &str, allow: bool) -> Result<()> {
        debug!("{authority} set_allow_edit {election_name} {allow}");
        self.update_election(
            election_name,
            "UPDATE election SET allow_edit = ?2 WHERE name = ?1",
            params![election_name, allow],
        )
    }

    fn delete_election(&self, authority: &str, election_name: &str) -> Result<()> {
        debug!("{authority} delete_election {election_name}");
        let id = require_election_id(&self.conn, election_name)?;
        // Candidates, voters, and ballots go with it via ON DELETE CASCADE.
        self.conn
            .execute("DELETE FROM election WHERE election_id = ?1", [id])?;
        Ok(())
    }

    fn add_candidates(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_candidates {election_name} {names:?}");
        let id = require_election_id(&self.conn, election_name)?;
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO candidate (election_id, name) VALUES (?1, ?2)")?;
        for name in names {
            stmt.execute(params![id, name])?;
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
        let id = require_election_id(&self.conn, election_name)?;
        let mut stmt = self
            .conn
            .prepare("DELETE FROM candidate WHERE election_id = ?1 AND name = ?2")?;
        for name in names {
            stmt.execute(params![id, name])?;
        }
        Ok(())
    }

    fn add_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} add_voters {election_name} {names:?}");
        let id = require_election_id(&self.conn, election_name)?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO eligible_voter (election_id, voter_name) VALUES (?1, ?2)",
        )?;
        for name in names {
            stmt.execute(params![id, name])?;
        }
        Ok(())
    }

    fn remove_voters(&self, authority: &str, election_name: &str, names: &[String]) -> Result<()> {
        debug!("{authority} remove_voters {election_name} {names:?}");
        let id = require_election_id(&self.conn, election_name)?;
        let mut stmt = self
            .conn
            .prepare("DELETE FROM eligible_voter WHERE election_id = ?1 AND voter_name = ?2")?;
        for name in names {
            stmt.execute(params![id, name])?;
        }
        Ok(())
    }

    fn cast_ballot(&self, authority: &str, ballot: &Ballot) -> Result<()> {
        debug!(
            "{authority} cast_ballot {} by {}",
            ballot.election_name, ballot.voter_name
        );
        let id = require_election_id(&self.conn, &ballot.election_name)?;
        let rankings = serde_json::to_string(&ballot.rankings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO ballot (election_id, voter_name, rankings, confirmation, when_cast)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                ballot.voter_name,
                rankings,
                ballot.confirmation,
                ballot.when_cast
            ],
        )?;
        Ok(())
    }
}
