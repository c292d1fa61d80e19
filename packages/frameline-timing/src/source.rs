use std::fmt;
use std::rc::Rc;

use crate::context::CallContext;
use crate::error::TimingError;
use crate::registry::{CallbackId, DelayedCallback, FrameCallback};

/// The host primitives a scheduler needs: frame callbacks, delayed
/// callbacks, and a monotonic millisecond clock.
pub trait TimingSource {
    /// Requests `callback` before the next repaint. Callbacks batched into the
    /// same repaint see the same timestamp.
    fn request_frame(&self, callback: FrameCallback) -> Result<CallbackId, TimingError>;

    /// Idempotent. Unknown and already-fired ids are ignored.
    fn cancel_frame(&self, id: CallbackId) -> Result<(), TimingError>;

    /// Runs `callback` no earlier than `delay_ms` from now.
    fn set_delayed(
        &self,
        callback: DelayedCallback,
        delay_ms: f64,
    ) -> Result<CallbackId, TimingError>;

    /// Idempotent. Unknown and already-fired ids are ignored.
    fn cancel_delayed(&self, id: CallbackId) -> Result<(), TimingError>;

    /// Monotonic milliseconds.
    fn now(&self) -> Result<f64, TimingError>;
}

type RequestFrameFn = dyn Fn(CallContext, FrameCallback) -> Result<CallbackId, TimingError>;
type CancelFn = dyn Fn(CallContext, CallbackId) -> Result<(), TimingError>;
type SetDelayedFn = dyn Fn(CallContext, DelayedCallback, f64) -> Result<CallbackId, TimingError>;
type NowFn = dyn Fn(CallContext) -> Result<f64, TimingError>;

/// The timing primitives bound to a source, as handed to a scheduler.
///
/// Each entry can be replaced on its own before the record is shared. Every
/// entry validates its [`CallContext`] before reaching the source.
#[derive(Clone)]
pub struct TimingFunctions {
    request_frame: Rc<RequestFrameFn>,
    cancel_frame: Rc<CancelFn>,
    set_delayed: Rc<SetDelayedFn>,
    cancel_delayed: Rc<CancelFn>,
    now: Rc<NowFn>,
}

impl TimingFunctions {
    pub fn bind<S>(source: Rc<S>) -> Self
    where
        S: TimingSource + ?Sized + 'static,
    {
        let request_frame = {
            let source = Rc::clone(&source);
            move |ctx: CallContext, callback: FrameCallback| {
                ctx.ensure_global()?;
                source.request_frame(callback)
            }
        };
        let cancel_frame = {
            let source = Rc::clone(&source);
            move |ctx: CallContext, id: CallbackId| {
                ctx.ensure_global()?;
                source.cancel_frame(id)
            }
        };
        let set_delayed = {
            let source = Rc::clone(&source);
            move |ctx: CallContext, callback: DelayedCallback, delay_ms: f64| {
                ctx.ensure_global()?;
                source.set_delayed(callback, delay_ms)
            }
        };
        let cancel_delayed = {
            let source = Rc::clone(&source);
            move |ctx: CallContext, id: CallbackId| {
                ctx.ensure_global()?;
                source.cancel_delayed(id)
            }
        };
        let now = move |ctx: CallContext| {
            ctx.ensure_global()?;
            source.now()
        };

        Self {
            request_frame: Rc::new(request_frame),
            cancel_frame: Rc::new(cancel_frame),
            set_delayed: Rc::new(set_delayed),
            cancel_delayed: Rc::new(cancel_delayed),
            now: Rc::new(now),
        }
    }

    pub fn with_request_frame(
        mut self,
        f: impl Fn(FrameCallback) -> Result<CallbackId, TimingError> + 'static,
    ) -> Self {
        self.request_frame = Rc::new(move |ctx, callback| {
            ctx.ensure_global()?;
            f(callback)
        });
        self
    }

    pub fn with_cancel_frame(
        mut self,
        f: impl Fn(CallbackId) -> Result<(), TimingError> + 'static,
    ) -> Self {
        self.cancel_frame = Rc::new(move |ctx, id| {
            ctx.ensure_global()?;
            f(id)
        });
        self
    }

    pub fn with_set_delayed(
        mut self,
        f: impl Fn(DelayedCallback, f64) -> Result<CallbackId, TimingError> + 'static,
    ) -> Self {
        self.set_delayed = Rc::new(move |ctx, callback, delay_ms| {
            ctx.ensure_global()?;
            f(callback, delay_ms)
        });
        self
    }

    pub fn with_cancel_delayed(
        mut self,
        f: impl Fn(CallbackId) -> Result<(), TimingError> + 'static,
    ) -> Self {
        self.cancel_delayed = Rc::new(move |ctx, id| {
            ctx.ensure_global()?;
            f(id)
        });
        self
    }

    pub fn with_now(mut self, f: impl Fn() -> Result<f64, TimingError> + 'static) -> Self {
        self.now = Rc::new(move |ctx| {
            ctx.ensure_global()?;
            f()
        });
        self
    }

    pub fn request_frame(
        &self,
        ctx: CallContext,
        callback: impl FnOnce(f64) -> anyhow::Result<()> + 'static,
    ) -> Result<CallbackId, TimingError> {
        (self.request_frame)(ctx, Box::new(callback))
    }

    pub fn cancel_frame(&self, ctx: CallContext, id: CallbackId) -> Result<(), TimingError> {
        (self.cancel_frame)(ctx, id)
    }

    pub fn set_delayed(
        &self,
        ctx: CallContext,
        callback: impl FnOnce() -> anyhow::Result<()> + 'static,
        delay_ms: f64,
    ) -> Result<CallbackId, TimingError> {
        (self.set_delayed)(ctx, Box::new(callback), delay_ms)
    }

    pub fn cancel_delayed(&self, ctx: CallContext, id: CallbackId) -> Result<(), TimingError> {
        (self.cancel_delayed)(ctx, id)
    }

    pub fn now(&self, ctx: CallContext) -> Result<f64, TimingError> {
        (self.now)(ctx)
    }
}

impl fmt::Debug for TimingFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingFunctions").finish_non_exhaustive()
    }
}
