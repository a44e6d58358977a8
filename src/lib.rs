//! HTTP load generation engine.
//!
//! A [`Scheduler`] drives [`Executor`] requests against a set of URLs under one
//! of three [`Profile`]s and accumulates results in a [`StatsStore`]. The
//! finished snapshot is summarised by [`Report`].

pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod scheduler;
pub mod stats;

pub use config::{Profile, RunConfig};
pub use error::{ConfigError, EngineError};
pub use executor::{Executor, Outcome};
pub use report::{Report, UrlReport};
pub use scheduler::Scheduler;
pub use stats::{OutcomeKey, StatsSnapshot, StatsStore, UrlStats};
