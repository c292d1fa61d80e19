use frameline_timing::TimingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler has been disposed")]
    Disposed,

    #[error("task id must not be empty")]
    EmptyTaskId,

    #[error("max work time must be a finite, non-negative number of milliseconds, got {0}")]
    InvalidConfig(f64),

    #[error(transparent)]
    Timing(#[from] TimingError),
}
