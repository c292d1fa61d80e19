#![allow(dead_code)]

use frameline_scheduler::WorkScheduler;
use frameline_timing::DeterministicTiming;
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A scheduler driven by a virtual clock that only moves when told to.
pub fn scheduler_with_budget(max_work_time_ms: f64) -> (Rc<DeterministicTiming>, WorkScheduler) {
    init_tracing();
    let timing = Rc::new(DeterministicTiming::new());
    let scheduler = WorkScheduler::with_max_work_time_ms(timing.timing_functions(), max_work_time_ms)
        .expect("valid budget");
    (timing, scheduler)
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Runs one frame wave on the virtual timing source.
pub fn flush(timing: &DeterministicTiming) {
    timing
        .run_animation_frame_callbacks(1)
        .expect("frame flush succeeds");
}
