//! Timed delivery of UMP events.
//!
//! A [`Scheduler`] keeps one time-ordered queue and arms a single timer on a
//! [`Clock`]. Timer firings come back over a channel and are dispatched by the
//! scheduler's owner, so all handler calls happen on one thread. An optional
//! [`JitterReductionSynchronizer`] maps JR Clock / JR Timestamp messages into
//! the host time base.

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{JitterConfig, SchedulerConfig};

pub mod clock;
pub use clock::{Clock, ManualClock, ThreadClock, TimerId};

pub mod jitter;
pub use jitter::{apply_jitter_reduction, JitterReductionSynchronizer};

pub mod scheduler;
pub use scheduler::{EventId, HandlerResult, Scheduler, SubscriptionId};
