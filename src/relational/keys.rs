//! Natural key to surrogate key lookups.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

pub(super) type ElectionId = i64;

pub(super) fn election_id(conn: &Connection, election_name: &str) -> Result<Option<ElectionId>> {
    let id = conn
        .query_row(
            "SELECT election_id FROM election WHERE name = ?1",
            [election_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(super) fn require_election_id(conn: &Connection, election_name: &str) -> Result<ElectionId> {
    election_id(conn, election_name)?
        .ok_or_else(|| Error::not_found(format!("Election {election_name}")))
}

pub(super) fn user_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM user WHERE name = ?1", [name], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// The user holding `email`, if any.
pub(super) fn email_owner(conn: &Connection, email: &str) -> Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM user WHERE email = ?1", [email], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::relational::RelationalBackend;
    use crate::testing::{self, examples};

    #[test]
    fn lookups() {
        let store = RelationalBackend::in_memory().unwrap();
        testing::seed(&store);
        let conn = store.connection();

        let pie = require_election_id(conn, examples::ELECTION).unwrap();
        let cookie = require_election_id(conn, examples::OTHER_ELECTION).unwrap();
        assert_ne!(pie, cookie);
        assert_eq!(election_id(conn, "Missing").unwrap(), None);
        assert!(matches!(
            require_election_id(conn, "Missing"),
            Err(Error::NotFound(_))
        ));

        assert!(user_exists(conn, "alice").unwrap());
        assert!(!user_exists(conn, "carol").unwrap());
        assert_eq!(
            email_owner(conn, &examples::bob().email).unwrap().as_deref(),
            Some("bob")
        );
    }
}
