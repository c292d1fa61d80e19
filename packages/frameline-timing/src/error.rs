use std::fmt;

use thiserror::Error;

use crate::context::CallContext;
use crate::registry::CallbackId;

/// Which of the two callback queues an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Runs before the next repaint. Ids are odd.
    Frame,
    /// Runs after a delay. Ids are even.
    Delayed,
}

impl CallbackKind {
    /// The kind an id was allocated for, derived from its parity.
    pub fn of(id: CallbackId) -> Self {
        if id.get() % 2 == 1 {
            CallbackKind::Frame
        } else {
            CallbackKind::Delayed
        }
    }

    /// Rejects ids allocated for the other queue.
    pub fn check(self, id: CallbackId) -> Result<(), TimingError> {
        if Self::of(id) == self {
            Ok(())
        } else {
            Err(TimingError::WrongCallbackKind { id, expected: self })
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::Frame => f.write_str("frame"),
            CallbackKind::Delayed => f.write_str("delayed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TimingError {
    #[error("illegal invocation: timing functions must be called with the global context, got {0:?}")]
    IllegalInvocation(CallContext),

    #[error("frame count must be a positive integer, got {0}")]
    InvalidFrameCount(usize),

    #[error("{id} is not a {expected} callback id")]
    WrongCallbackKind {
        id: CallbackId,
        expected: CallbackKind,
    },

    #[error("host timing call failed: {0}")]
    Host(String),

    /// A callback run by a flush returned an error.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl TimingError {
    /// The error returned by a callback, if that is what stopped the flush.
    pub fn callback_error(&self) -> Option<&anyhow::Error> {
        match self {
            TimingError::Callback(err) => Some(err),
            _ => None,
        }
    }
}
