//! Error type for the umpkit umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] umpkit_core::Error),

    #[cfg(feature = "scheduler")]
    #[error("Scheduler: {0}")]
    Sched(#[from] umpkit_sched::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
