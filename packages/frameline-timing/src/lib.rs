//! Timing sources for the Frameline scheduler.
//!
//! A scheduler never talks to the host directly. It is handed a
//! [`TimingFunctions`] record bound to some [`TimingSource`]: the
//! [`StdTimingSource`] for native hosts, a browser adapter, or the
//! [`DeterministicTiming`] double used by tests.

pub mod context;
pub mod deterministic;
pub mod error;
mod registry;
pub mod source;
pub mod std_source;

pub use context::CallContext;
pub use deterministic::DeterministicTiming;
pub use error::{CallbackKind, TimingError};
pub use registry::{CallbackId, DelayedCallback, FrameCallback, IdSequence};
pub use source::{TimingFunctions, TimingSource};
pub use std_source::StdTimingSource;
