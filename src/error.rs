use std::fmt::Display;

use mongodb::bson::{de::Error as BsonDeError, ser::Error as BsonSerError};
use mongodb::error::Error as MongoError;
use rusqlite::Error as SqlError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mongo(#[from] MongoError),
    #[error(transparent)]
    Sql(#[from] SqlError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A store holds something this crate never writes.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn conflict(what: impl Display) -> Self {
        Self::Conflict(what.to_string())
    }

    pub fn internal(what: impl Display) -> Self {
        Self::Internal(what.to_string())
    }

    /// Is this a failure of the underlying store or its driver, rather than
    /// a problem with the request itself?
    pub fn is_backend_unavailable(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Conflict(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
