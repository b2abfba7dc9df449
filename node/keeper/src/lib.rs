//! DSS keeper: keeps the protocol's maintenance jobs running.
//!
//! A [`Scheduler`](scheduler::Scheduler) fires on a fixed cadence. Each tick
//! is gated on the sequencer's leadership election, discovers pending jobs,
//! validates them and submits their `work` transactions, then runs the
//! oracle, drip, flap and PSM strategies.

pub mod cadence;
pub mod catalog;
pub mod executor;
pub mod master;
pub mod node;
pub mod scheduler;
pub mod settings;
pub mod strategies;
pub mod validator;

pub use cadence::Cadence;
pub use executor::{ExecutionAttempt, ExecutionFailure, JobExecutor, SubmissionKind};
pub use node::KeeperNode;
pub use scheduler::{Scheduler, TickError, TickOutcome, TickReport};
pub use settings::KeeperSettings;
pub use strategies::{Decision, JobStrategy, StrategyError};
pub use validator::{JobValidator, ValidatedJob, ValidationError};
