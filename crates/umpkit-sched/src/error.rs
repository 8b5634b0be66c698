//! Error types for umpkit-sched.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid schedule time: {0} ms")]
    InvalidTime(f64),

    #[error("Clock unavailable: {0}")]
    ClockUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
