//! Timing source backed by [`std::time`], driven by the host's event loop.
//!
//! Frame callbacks wait until the host presents a frame (for example on a
//! window redraw) and delayed callbacks wait until the host pumps timers.
//! A frame waker lets the host learn that a frame was requested.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::error::{CallbackKind, TimingError};
use crate::registry::{
    CallbackId, CallbackRegistry, Delayed, DelayedCallback, FrameCallback, run_frame_pass,
    run_timer_pass,
};
use crate::source::{TimingFunctions, TimingSource};

pub struct StdTimingSource {
    origin: Instant,
    frame_requested: Cell<bool>,
    frame_waker: RefCell<Option<Rc<dyn Fn()>>>,
    frames: RefCell<CallbackRegistry<FrameCallback>>,
    timers: RefCell<CallbackRegistry<Delayed>>,
}

impl StdTimingSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            frame_requested: Cell::new(false),
            frame_waker: RefCell::new(None),
            frames: RefCell::new(CallbackRegistry::new(CallbackKind::Frame)),
            timers: RefCell::new(CallbackRegistry::new(CallbackKind::Delayed)),
        }
    }

    pub fn timing_functions(self: &Rc<Self>) -> TimingFunctions {
        TimingFunctions::bind(Rc::clone(self))
    }

    /// Milliseconds since this source was created.
    pub fn elapsed_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.replace(false)
    }

    /// Registers a waker invoked whenever a frame callback is requested.
    pub fn set_frame_waker(&self, waker: impl Fn() + 'static) {
        *self.frame_waker.borrow_mut() = Some(Rc::new(waker));
    }

    pub fn clear_frame_waker(&self) {
        *self.frame_waker.borrow_mut() = None;
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frames.borrow().len() > 0
    }

    /// Runs the frame callbacks queued so far with one shared timestamp.
    pub fn present_frame(&self) -> Result<usize, TimingError> {
        let timestamp = self.elapsed_ms();
        run_frame_pass(&self.frames, timestamp)
    }

    /// Runs the delayed callbacks that are due.
    pub fn pump_timers(&self) -> Result<usize, TimingError> {
        let now = self.elapsed_ms();
        run_timer_pass(&self.timers, now)
    }

    fn wake(&self) {
        let waker = self.frame_waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdTimingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdTimingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdTimingSource")
            .field("frame_requested", &self.frame_requested.get())
            .field("pending_frames", &self.frames.borrow().len())
            .field("pending_timers", &self.timers.borrow().len())
            .finish()
    }
}

impl TimingSource for StdTimingSource {
    fn request_frame(&self, callback: FrameCallback) -> Result<CallbackId, TimingError> {
        let id = self.frames.borrow_mut().push(callback);
        self.frame_requested.set(true);
        self.wake();
        Ok(id)
    }

    fn cancel_frame(&self, id: CallbackId) -> Result<(), TimingError> {
        self.frames.borrow_mut().cancel(id)
    }

    fn set_delayed(
        &self,
        callback: DelayedCallback,
        delay_ms: f64,
    ) -> Result<CallbackId, TimingError> {
        let delay_ms = if delay_ms.is_finite() {
            delay_ms.max(0.0)
        } else {
            0.0
        };
        let due_ms = self.elapsed_ms() + delay_ms;
        Ok(self.timers.borrow_mut().push(Delayed { due_ms, callback }))
    }

    fn cancel_delayed(&self, id: CallbackId) -> Result<(), TimingError> {
        self.timers.borrow_mut().cancel(id)
    }

    fn now(&self) -> Result<f64, TimingError> {
        Ok(self.elapsed_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_wakes_host() {
        let source = StdTimingSource::new();
        let wakes = Rc::new(Cell::new(0));
        {
            let wakes = wakes.clone();
            source.set_frame_waker(move || wakes.set(wakes.get() + 1));
        }

        source.request_frame(Box::new(|_| Ok(()))).unwrap();
        assert_eq!(wakes.get(), 1);
        assert!(source.take_frame_request());
        assert!(!source.take_frame_request());

        assert_eq!(source.present_frame().unwrap(), 1);
        assert!(!source.has_pending_frame());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let source = StdTimingSource::new();
        let first = source.now().unwrap();
        let second = source.now().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_long_delay_is_not_pumped_early() {
        let source = StdTimingSource::new();
        source.set_delayed(Box::new(|| Ok(())), 60_000.0).unwrap();
        source.set_delayed(Box::new(|| Ok(())), 0.0).unwrap();
        assert_eq!(source.pump_timers().unwrap(), 1);
        assert_eq!(source.timers.borrow().len(), 1);
    }
}
