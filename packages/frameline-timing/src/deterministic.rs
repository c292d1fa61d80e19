//! A timing source driven entirely by the caller.
//!
//! Virtual time only moves when the driver sets or advances it, and callbacks
//! only run when the driver flushes them. Flushes detach the whole queue
//! first, so work a callback schedules waits for the next flush, and put back
//! anything left unexecuted when a callback fails.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{CallbackKind, TimingError};
use crate::registry::{
    CallbackId, CallbackRegistry, Delayed, DelayedCallback, FrameCallback, run_frame_pass,
    run_timer_pass,
};
use crate::source::{TimingFunctions, TimingSource};

pub struct DeterministicTiming {
    total_elapsed_time_ms: Cell<f64>,
    frames: RefCell<CallbackRegistry<FrameCallback>>,
    timers: RefCell<CallbackRegistry<Delayed>>,
}

impl DeterministicTiming {
    pub fn new() -> Self {
        Self {
            total_elapsed_time_ms: Cell::new(0.0),
            frames: RefCell::new(CallbackRegistry::new(CallbackKind::Frame)),
            timers: RefCell::new(CallbackRegistry::new(CallbackKind::Delayed)),
        }
    }

    /// Binds this source into the record a scheduler consumes.
    pub fn timing_functions(self: &Rc<Self>) -> TimingFunctions {
        TimingFunctions::bind(Rc::clone(self))
    }

    pub fn total_elapsed_time_ms(&self) -> f64 {
        self.total_elapsed_time_ms.get()
    }

    pub fn set_total_elapsed_time_ms(&self, ms: f64) {
        self.total_elapsed_time_ms.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.total_elapsed_time_ms
            .set(self.total_elapsed_time_ms.get() + ms);
    }

    /// Runs `frame_count` waves of frame callbacks. Each wave runs exactly the
    /// callbacks queued when it started, all with the same timestamp.
    ///
    /// Returns the number of callbacks run. On failure, callbacks not yet run
    /// stay queued ahead of those scheduled during the wave.
    pub fn run_animation_frame_callbacks(&self, frame_count: usize) -> Result<usize, TimingError> {
        if frame_count == 0 {
            return Err(TimingError::InvalidFrameCount(frame_count));
        }
        let mut ran = 0;
        for wave in 0..frame_count {
            let timestamp = self.total_elapsed_time_ms.get();
            tracing::trace!(wave, timestamp, "flushing frame callbacks");
            ran += run_frame_pass(&self.frames, timestamp)?;
        }
        Ok(ran)
    }

    /// Runs every delayed callback whose due time has been reached, in
    /// registration order. Callbacks that are not due yet stay queued.
    pub fn run_timer_callbacks(&self) -> Result<usize, TimingError> {
        let now = self.total_elapsed_time_ms.get();
        tracing::trace!(now, "flushing delayed callbacks");
        run_timer_pass(&self.timers, now)
    }

    pub fn pending_frame_callbacks(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn frame_callback_ids(&self) -> Vec<CallbackId> {
        self.frames.borrow().ids()
    }

    pub fn pending_timer_callbacks(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn timer_callback_ids(&self) -> Vec<CallbackId> {
        self.timers.borrow().ids()
    }

    /// Drops every queued callback. Virtual time is left unchanged.
    pub fn reset(&self) {
        self.frames.borrow_mut().clear();
        self.timers.borrow_mut().clear();
    }
}

impl Default for DeterministicTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeterministicTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicTiming")
            .field("total_elapsed_time_ms", &self.total_elapsed_time_ms.get())
            .field("pending_frames", &self.pending_frame_callbacks())
            .field("pending_timers", &self.pending_timer_callbacks())
            .finish()
    }
}

impl TimingSource for DeterministicTiming {
    fn request_frame(&self, callback: FrameCallback) -> Result<CallbackId, TimingError> {
        Ok(self.frames.borrow_mut().push(callback))
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
        let due_ms = self.total_elapsed_time_ms.get() + delay_ms;
        Ok(self.timers.borrow_mut().push(Delayed { due_ms, callback }))
    }

    fn cancel_delayed(&self, id: CallbackId) -> Result<(), TimingError> {
        self.timers.borrow_mut().cancel(id)
    }

    fn now(&self) -> Result<f64, TimingError> {
        Ok(self.total_elapsed_time_ms.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frame_count_runs_nothing() {
        let timing = DeterministicTiming::new();
        let ran = Rc::new(Cell::new(false));
        {
            let ran = ran.clone();
            timing
                .request_frame(Box::new(move |_| {
                    ran.set(true);
                    Ok(())
                }))
                .unwrap();
        }

        let err = timing.run_animation_frame_callbacks(0).unwrap_err();
        assert!(matches!(err, TimingError::InvalidFrameCount(0)));
        assert!(!ran.get());
        assert_eq!(timing.pending_frame_callbacks(), 1);
    }

    #[test]
    fn test_negative_delay_is_due_immediately() {
        let timing = DeterministicTiming::new();
        timing.set_delayed(Box::new(|| Ok(())), -5.0).unwrap();
        assert_eq!(timing.run_timer_callbacks().unwrap(), 1);
    }

    #[test]
    fn test_reset_drops_everything() {
        let timing = DeterministicTiming::new();
        timing.request_frame(Box::new(|_| Ok(()))).unwrap();
        timing.set_delayed(Box::new(|| Ok(())), 10.0).unwrap();
        timing.advance(3.0);
        timing.reset();
        assert_eq!(timing.pending_frame_callbacks(), 0);
        assert_eq!(timing.pending_timer_callbacks(), 0);
        assert_eq!(timing.total_elapsed_time_ms(), 3.0);
    }
}
