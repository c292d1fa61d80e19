//! Platform adapter for the browser: frame callbacks go through
//! `requestAnimationFrame`, delayed callbacks through `setTimeout`, and the
//! clock is `performance.now()`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use frameline_scheduler::{SchedulerConfig, SchedulerError, WorkScheduler};
use frameline_timing::{
    CallbackId, CallbackKind, DelayedCallback, FrameCallback, IdSequence, TimingError,
    TimingFunctions, TimingSource,
};
use rustc_hash::FxHashMap;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Performance, Window};

struct Pending<C> {
    handle: i32,
    callback: C,
}

type Slots<C> = Rc<RefCell<FxHashMap<CallbackId, Pending<C>>>>;

/// Timing source backed by the browser window.
///
/// Callbacks are kept on the Rust side keyed by [`CallbackId`]; the browser
/// only sees a small trampoline that looks the callback up when it fires.
/// Cancelling drops the callback immediately.
pub struct WebTimingSource {
    window: Window,
    performance: Performance,
    frame_ids: IdSequence,
    delayed_ids: IdSequence,
    frames: Slots<FrameCallback>,
    timers: Slots<DelayedCallback>,
}

impl WebTimingSource {
    /// Fails when the global scope has no `window` or no `performance`.
    pub fn new() -> Result<Self, TimingError> {
        let window = web_sys::window()
            .ok_or_else(|| TimingError::Host("no global `window` exists".to_string()))?;
        let performance = window
            .performance()
            .ok_or_else(|| TimingError::Host("`window.performance` is unavailable".to_string()))?;
        Ok(Self {
            window,
            performance,
            frame_ids: IdSequence::new(CallbackKind::Frame),
            delayed_ids: IdSequence::new(CallbackKind::Delayed),
            frames: Rc::default(),
            timers: Rc::default(),
        })
    }

    pub fn timing_functions(self: &Rc<Self>) -> TimingFunctions {
        TimingFunctions::bind(Rc::clone(self))
    }

    pub fn pending_frame_callbacks(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn pending_timer_callbacks(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl fmt::Debug for WebTimingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebTimingSource")
            .field("pending_frames", &self.pending_frame_callbacks())
            .field("pending_timers", &self.pending_timer_callbacks())
            .finish()
    }
}

impl TimingSource for WebTimingSource {
    fn request_frame(&self, callback: FrameCallback) -> Result<CallbackId, TimingError> {
        let id = self.frame_ids.next_id();
        let slots = Rc::downgrade(&self.frames);
        let trampoline = Closure::once_into_js(move |timestamp: f64| {
            if let Some(callback) = take(&slots, id) {
                report(id, callback(timestamp));
            }
        });
        let handle = self
            .window
            .request_animation_frame(trampoline.unchecked_ref())
            .map_err(host_error)?;
        self.frames
            .borrow_mut()
            .insert(id, Pending { handle, callback });
        Ok(id)
    }

    fn cancel_frame(&self, id: CallbackId) -> Result<(), TimingError> {
        CallbackKind::Frame.check(id)?;
        if let Some(pending) = self.frames.borrow_mut().remove(&id) {
            self.window
                .cancel_animation_frame(pending.handle)
                .map_err(host_error)?;
        }
        Ok(())
    }

    fn set_delayed(
        &self,
        callback: DelayedCallback,
        delay_ms: f64,
    ) -> Result<CallbackId, TimingError> {
        let id = self.delayed_ids.next_id();
        let slots = Rc::downgrade(&self.timers);
        let trampoline = Closure::once_into_js(move || {
            if let Some(callback) = take(&slots, id) {
                report(id, callback());
            }
        });
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                trampoline.unchecked_ref(),
                clamp_delay(delay_ms),
            )
            .map_err(host_error)?;
        self.timers
            .borrow_mut()
            .insert(id, Pending { handle, callback });
        Ok(id)
    }

    fn cancel_delayed(&self, id: CallbackId) -> Result<(), TimingError> {
        CallbackKind::Delayed.check(id)?;
        if let Some(pending) = self.timers.borrow_mut().remove(&id) {
            self.window.clear_timeout_with_handle(pending.handle);
        }
        Ok(())
    }

    fn now(&self) -> Result<f64, TimingError> {
        Ok(self.performance.now())
    }
}

/// Builds a [`WorkScheduler`] driven by the browser's frames.
pub fn work_scheduler(config: SchedulerConfig) -> Result<WorkScheduler, SchedulerError> {
    let source = Rc::new(WebTimingSource::new()?);
    WorkScheduler::new(source.timing_functions(), config)
}

/// Routes Rust panics to `console.error`.
pub fn install_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn take<C>(slots: &Weak<RefCell<FxHashMap<CallbackId, Pending<C>>>>, id: CallbackId) -> Option<C> {
    let slots = slots.upgrade()?;
    let pending = slots.borrow_mut().remove(&id);
    pending.map(|pending| pending.callback)
}

// The browser has no caller to hand the error back to, so it becomes an
// uncaught exception on the event loop.
fn report(id: CallbackId, result: anyhow::Result<()>) {
    if let Err(err) = result {
        tracing::error!(%id, error = %format!("{err:#}"), "timing callback failed");
        wasm_bindgen::throw_str(&format!("{err:#}"));
    }
}

fn clamp_delay(delay_ms: f64) -> i32 {
    if delay_ms.is_finite() {
        delay_ms.clamp(0.0, i32::MAX as f64) as i32
    } else {
        0
    }
}

fn host_error(err: JsValue) -> TimingError {
    TimingError::Host(format!("{err:?}"))
}
