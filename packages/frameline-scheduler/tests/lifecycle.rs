mod common;

use common::{flush, scheduler_with_budget};
use frameline_scheduler::{Progress, SchedulerConfig, SchedulerError, TaskSpec, WorkScheduler};
use frameline_timing::StdTimingSource;
use std::cell::Cell;
use std::rc::Rc;

fn counting(counter: &Rc<Cell<u32>>) -> TaskSpec {
    let counter = counter.clone();
    TaskSpec::from_fn(move |_| {
        counter.set(counter.get() + 1);
        Ok(Progress::Done)
    })
}

#[test]
fn test_only_one_frame_request_is_outstanding() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    for _ in 0..5 {
        scheduler.schedule_task(counting(&counter)).unwrap();
    }
    assert_eq!(timing.pending_frame_callbacks(), 1);
    assert!(scheduler.has_pending_frame());

    flush(&timing);
    assert_eq!(counter.get(), 5);
    assert_eq!(timing.pending_frame_callbacks(), 0);
    assert!(!scheduler.has_pending_frame());
}

#[test]
fn test_unschedule_keeps_the_frame_request() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    let task = scheduler.schedule_task(counting(&counter)).unwrap();
    scheduler.unschedule_task(&task);
    assert!(scheduler.has_pending_frame());

    assert_eq!(timing.run_animation_frame_callbacks(1).unwrap(), 1);
    assert_eq!(counter.get(), 0);
    assert!(!scheduler.has_pending_frame());
}

#[test]
fn test_work_finished_mid_frame_drops_the_extra_request() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));
    let handle = scheduler.downgrade();

    {
        let counter = counter.clone();
        scheduler
            .schedule_task(TaskSpec::from_fn(move |_| {
                if let Some(scheduler) = handle.upgrade() {
                    scheduler.schedule_task(counting(&counter).with_id("child"))?;
                }
                Ok(Progress::Done)
            }))
            .unwrap();
    }

    flush(&timing);
    assert_eq!(counter.get(), 1);
    assert!(scheduler.is_empty());
    assert!(!scheduler.has_pending_frame());
    assert_eq!(timing.pending_frame_callbacks(), 0);
}

#[test]
fn test_disabled_scheduler_stays_dormant_until_kicked() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    scheduler.set_enabled(false);
    scheduler.schedule_task(counting(&counter)).unwrap();
    assert!(!scheduler.has_pending_frame());
    assert_eq!(timing.pending_frame_callbacks(), 0);

    scheduler.set_enabled(true);
    assert!(!scheduler.has_pending_frame());

    assert!(scheduler.kick().unwrap());
    assert!(!scheduler.kick().unwrap());
    flush(&timing);
    assert_eq!(counter.get(), 1);
    assert!(!scheduler.kick().unwrap());
}

#[test]
fn test_disabling_mid_stream_stops_follow_up_frames() {
    let (timing, scheduler) = scheduler_with_budget(0.0);
    let counter = Rc::new(Cell::new(0));

    scheduler.schedule_task(counting(&counter)).unwrap();
    scheduler.schedule_task(counting(&counter)).unwrap();
    scheduler.set_enabled(false);

    flush(&timing);
    assert_eq!(counter.get(), 1);
    assert_eq!(scheduler.len(), 1);
    assert!(!scheduler.has_pending_frame());
}

#[test]
fn test_dispose_drops_work_and_rejects_new_tasks() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    scheduler.schedule_task(counting(&counter)).unwrap();
    scheduler.dispose().unwrap();
    scheduler.dispose().unwrap();

    assert!(scheduler.is_disposed());
    assert!(scheduler.is_empty());
    assert_eq!(timing.pending_frame_callbacks(), 0);
    assert!(matches!(
        scheduler.schedule_task(counting(&counter)),
        Err(SchedulerError::Disposed)
    ));
    assert!(matches!(scheduler.kick(), Err(SchedulerError::Disposed)));
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_dispose_from_inside_a_task_stops_the_frame() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));
    let handle = scheduler.downgrade();

    scheduler
        .schedule_task(TaskSpec::from_fn(move |_| {
            if let Some(scheduler) = handle.upgrade() {
                scheduler.dispose()?;
            }
            Ok(Progress::Done)
        }))
        .unwrap();
    scheduler.schedule_task(counting(&counter)).unwrap();

    flush(&timing);
    assert_eq!(counter.get(), 0);
    assert!(scheduler.is_empty());
    assert_eq!(timing.pending_frame_callbacks(), 0);
}

#[test]
fn test_dropping_the_scheduler_cancels_its_frame() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    scheduler.schedule_task(counting(&counter)).unwrap();
    assert_eq!(timing.pending_frame_callbacks(), 1);

    drop(scheduler);
    assert_eq!(timing.pending_frame_callbacks(), 0);
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_host_can_drive_frames_directly() {
    let (timing, scheduler) = scheduler_with_budget(4.0);
    let counter = Rc::new(Cell::new(0));

    scheduler.schedule_task(counting(&counter)).unwrap();
    scheduler.run_frame().unwrap();

    assert_eq!(counter.get(), 1);
    assert_eq!(timing.pending_frame_callbacks(), 0);
    assert!(!scheduler.has_pending_frame());
}

#[test]
fn test_runs_on_the_std_timing_source() {
    let source = Rc::new(StdTimingSource::new());
    let scheduler =
        WorkScheduler::new(source.timing_functions(), SchedulerConfig::default()).unwrap();
    let counter = Rc::new(Cell::new(0));

    scheduler.schedule_task(counting(&counter)).unwrap();
    assert!(source.take_frame_request());

    assert_eq!(source.present_frame().unwrap(), 1);
    assert_eq!(counter.get(), 1);
    assert!(!source.has_pending_frame());
}
