//! Background jobs
//!
//! Work that must not block a chat update (certificates, surveys, reminders,
//! bulk notifications) is written to the `jobs` table and picked up by the
//! poller.

pub mod backoff;
pub mod poller;
pub mod processors;
pub mod queue;

pub use backoff::RetryPolicy;
pub use poller::{JobOutcome, JobPoller, PollStats};
pub use processors::{BotJobHandler, JobHandler};
pub use queue::JobQueue;
