//! Worker side of a distributed job scheduler.
//!
//! An [`Executor`] hosts named work functions, answers the scheduler center's
//! control calls (`/run`, `/kill`, `/log`, `/beat`, `/ping`, `/idleBeat`),
//! reports every terminal task state through a callback, and keeps itself
//! registered with a periodic heartbeat.

pub mod admission;
pub mod client;
pub mod demo;
pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod log;
pub mod router;
pub mod runner;
pub mod table;
pub mod task;

pub use client::{SchedulerApi, SchedulerClient, SchedulerError};
pub use error::{AdmissionError, ExecutorError};
pub use executor::{Executor, ExecutorBuilder};
pub use heartbeat::Heartbeat;
pub use log::LogHandler;
pub use router::build_router;
pub use task::{handler_fn, JobContext, JobError, JobHandler, Task, TaskOutcome};
