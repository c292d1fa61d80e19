//! Explicit call context for bound timing functions.
//!
//! Host timing APIs refuse to run when invoked method-style on an object
//! other than the global scope. Bound [`TimingFunctions`](crate::TimingFunctions)
//! keep that check, but the receiver is passed in explicitly instead of being
//! read from the ambient calling convention.

use crate::error::TimingError;

/// The receiver a timing function is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallContext {
    /// Called as a free function. The only accepted context.
    #[default]
    Global,
    /// Called as a method on some object, identified by an opaque id.
    Receiver(u64),
}

impl CallContext {
    pub const GLOBAL: CallContext = CallContext::Global;

    pub fn is_global(self) -> bool {
        self == CallContext::Global
    }

    pub fn ensure_global(self) -> Result<(), TimingError> {
        if self.is_global() {
            Ok(())
        } else {
            Err(TimingError::IllegalInvocation(self))
        }
    }
}
