//! Alert delivery for job failures.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable alert channels
//! - Signed robot-card and plain webhook notifier implementations
//! - Minijinja templates for alert messages
//! - Dispatcher that fans alerts out to configured channels, fire-and-forget

pub mod dispatcher;
pub mod robot;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use templating::{AlertKind, AlertRenderer, JobAlertContext};
pub use traits::{Notification, Notifier, NotifyError};
