//! Cooperative, frame-budgeted work scheduling.
//!
//! Callers queue [`Task`]s on a [`WorkScheduler`]; the scheduler asks its
//! timing source for a frame callback and, when it fires, runs tasks in
//! order until the frame's budget is spent. Timing is injected as
//! [`frameline_timing::TimingFunctions`], so tests can drive frames with a
//! [`frameline_timing::DeterministicTiming`].

pub mod config;
pub mod error;
mod future;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use config::{DEFAULT_MAX_WORK_TIME_MS, SchedulerConfig};
pub use error::SchedulerError;
pub use queue::TaskQueue;
pub use scheduler::{WeakWorkScheduler, WorkScheduler};
pub use task::{CallbackKey, FrameBudget, Progress, Task, TaskCallback, TaskId, TaskSpec, task_fn};
