//! The capability set every backend provides.
//!
//! The three backends share nothing but these traits: no base
//! implementation, no shared helpers for physical access.

mod command;
mod event_log;
mod query;

pub use command::CommandModel;
pub use event_log::EventLog;
pub use query::QueryModel;

/// A complete backend: event log, write side, and read side over one store.
pub trait Backend: EventLog + CommandModel + QueryModel {}

impl<T> Backend for T where T: EventLog + CommandModel + QueryModel {}
