//! Normalised relational store on SQLite.
//!
//! Users and elections get surrogate integer keys; children reference their
//! election by `election_id` with `ON DELETE CASCADE`. User names are copied
//! into `election.owner_name`, `eligible_voter.voter_name`, and
//! `ballot.voter_name`, so a rename updates all four tables in turn. Every
//! statement runs on its own: nothing here opens a transaction.

use std::path::Path;

use log::info;
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, ToSql,
};

use crate::error::Result;
use crate::model::Role;

mod command;
mod event_log;
mod keys;
mod query;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

pub struct RelationalBackend {
    conn: Connection,
}

impl RelationalBackend {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create a store that lives only as long as this value.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, creating the schema if needed.
    ///
    /// This operation is idempotent.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        info!("SQLite schema ready");
        Ok(Self { conn })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.as_u8())))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        u8::try_from(raw)
            .ok()
            .and_then(Role::from_u8)
            .ok_or(FromSqlError::OutOfRange(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::projection;
    use crate::store::{CommandModel, QueryModel};
    use crate::testing::{self, examples, ADMIN};

    fn seeded() -> RelationalBackend {
        let store = RelationalBackend::in_memory().unwrap();
        testing::seed(&store);
        store
    }

    #[test]
    fn schema_is_idempotent() {
        let store = seeded();
        store.connection().execute_batch(SCHEMA_SQL).unwrap();
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn role_column_round_trip() {
        let store = RelationalBackend::in_memory().unwrap();
        let role: Role = store
            .connection()
            .query_row("SELECT ?1", [Role::Observer], |row| row.get(0))
            .unwrap();
        assert_eq!(role, Role::Observer);
        let bad = store
            .connection()
            .query_row("SELECT 9", [], |row| row.get::<_, Role>(0));
        assert!(bad.is_err());
    }

    #[test]
    fn delete_cascades_through_foreign_keys() {
        let store = seeded();
        store.delete_election(ADMIN, examples::ELECTION).unwrap();
        let orphans: i64 = store
            .connection()
            .query_row(
                "SELECT (SELECT COUNT(*) FROM candidate WHERE election_id NOT IN (SELECT election_id FROM election))
                      + (SELECT COUNT(*) FROM eligible_voter WHERE election_id NOT IN (SELECT election_id FROM election))
                      + (SELECT COUNT(*) FROM ballot WHERE election_id NOT IN (SELECT election_id FROM election))",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn interrupted_rename_leaves_stale_ballots() {
        let store = seeded();

        // Make the last step of the fan-out fail.
        store
            .connection()
            .execute_batch("ALTER TABLE ballot RENAME TO ballot_offline")
            .unwrap();
        let err = store.set_user_name(ADMIN, "bob", "robert").unwrap_err();
        assert!(matches!(err, Error::Sql(_)), "{err:?}");
        assert!(err.is_backend_unavailable());

        // Steps before the failure stay applied.
        assert!(store.user_by_name("robert").unwrap().is_some());
        assert_eq!(
            store.election(examples::ELECTION).unwrap().unwrap().owner_name,
            "robert"
        );
        assert!(store.is_eligible(examples::ELECTION, "robert").unwrap());

        // The ballot still carries the old name.
        store
            .connection()
            .execute_batch("ALTER TABLE ballot_offline RENAME TO ballot")
            .unwrap();
        assert!(store.ballot(examples::ELECTION, "bob").unwrap().is_some());
        assert!(store.ballot(examples::ELECTION, "robert").unwrap().is_none());

        // Running the rename again finishes the job.
        store.set_user_name(ADMIN, "bob", "robert").unwrap();
        assert!(store.ballot(examples::ELECTION, "bob").unwrap().is_none());
        assert!(store.ballot(examples::ELECTION, "robert").unwrap().is_some());

        let reference = testing::renamed_reference();
        assert_eq!(testing::snapshot(&store), reference);
    }

    #[test]
    fn survives_reopen() {
        let dir = std::env::temp_dir().join(format!("rcv-store-{}", rand::random::<u32>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.db");

        {
            let store = RelationalBackend::open(&path).unwrap();
            for event in examples::events() {
                projection::record(&store, ADMIN, testing::epoch(), &event).unwrap();
            }
        }
        let store = RelationalBackend::open(&path).unwrap();
        let reference = seeded();
        assert_eq!(testing::snapshot(&store), testing::snapshot(&reference));
        assert_eq!(
            crate::store::EventLog::event_count(&store).unwrap(),
            examples::events().len() as u64
        );

        drop(store);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
