//! Job queue and state machine.
//!
//! This module is the caller-facing surface of the orchestrator: submit
//! files, convert one or all, remove, and observe read-only snapshots. No
//! other mutation paths exist.
//!
//! # Example
//!
//! ```ignore
//! use reelsmith_core::jobs::JobQueue;
//!
//! let queue = JobQueue::new(gateway, handles, probe, conversion_config);
//! let created = queue.add_files(files).await;
//! queue.convert_all().await?;
//! for job in queue.snapshot().await {
//!     println!("{}: {} {}%", job.name, job.state, job.progress_pct);
//! }
//! ```

mod error;
mod queue;
mod types;

pub use error::JobError;
pub use queue::{JobQueue, QueueEvent, QueueEventCallback};
pub use types::{Job, JobId, JobSnapshot, JobState, SourceFile};
