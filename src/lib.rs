//! Persistence core for a ranked-choice voting platform.
//!
//! Business logic talks to a [`store::Backend`]: an append-only
//! [`store::EventLog`] plus a [`store::CommandModel`]/[`store::QueryModel`]
//! pair addressed purely by natural keys. Three structurally independent
//! backends implement it:
//!
//! - [`memory::MemoryBackend`]: plain maps and sets, for tests.
//! - [`relational::RelationalBackend`]: a normalised SQLite schema.
//! - [`single_table::SingleTableBackend`]: a single-table NoSQL layout,
//!   backed by MongoDB in production.
//!
//! Pick one at runtime with [`config::StoreConfig::open`].

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod model;
pub mod projection;
pub mod relational;
pub mod single_table;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{BackendKind, StoreConfig};
pub use error::{Error, Result};
pub use store::{Backend, CommandModel, EventLog, QueryModel};
