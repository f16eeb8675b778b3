use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, warn};
use log4rs::config::Config;

use crate::error::Result;

type SetupResult<T> = std::result::Result<T, Box<dyn StdError + Send + Sync>>;

/// Read a `log4rs` YAML/TOML/JSON config file without installing it.
pub fn load_config(path: impl AsRef<Path>) -> SetupResult<Config> {
    Ok(log4rs::config::load_config_file(path, Default::default())?)
}

/// Initialise `log4rs` from a config file such as the bundled `log4rs.yaml`.
pub fn init_file(path: impl AsRef<Path>) -> SetupResult<()> {
    log4rs::init_config(load_config(path)?)?;
    debug!("Initialised logging");
    Ok(())
}

/// A unique identifier for one multi-step store operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct OperationId(pub usize);

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OperationId {
    /// Atomically get the next ID. This wraps around back to zero if you somehow exceed a usize.
    pub fn next() -> OperationId {
        static OPERATION_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        OperationId(OPERATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Logs the progress of an ordered, non-atomic sequence of writes.
///
/// Each step is logged before it runs. A failing step is logged as a
/// warning, since everything before it has already been written.
#[derive(Debug)]
pub struct FanOut {
    id: OperationId,
    what: &'static str,
    steps: usize,
}

impl FanOut {
    pub fn start(what: &'static str, authority: &str, subject: impl Display, steps: usize) -> Self {
        let id = OperationId::next();
        debug!("op{id} {what} {subject} by {authority}: {steps} steps");
        Self { id, what, steps }
    }

    /// Run step `n` (1-based) of the sequence.
    pub fn step<T>(
        &self,
        n: usize,
        description: impl Display,
        run: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let (id, what, steps) = (self.id, self.what, self.steps);
        debug!("op{id} {what} step {n}/{steps}: {description}");
        run().map_err(|err| {
            warn!("op{id} {what} failed at step {n}/{steps}, earlier steps stay applied: {err}");
            err
        })
    }
}
