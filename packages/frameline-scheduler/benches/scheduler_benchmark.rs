use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use frameline_scheduler::{Progress, TaskSpec, WorkScheduler};
use frameline_timing::DeterministicTiming;

fn benchmark_schedule_and_flush(c: &mut Criterion) {
    c.bench_function("schedule_task 1000 + frame", |b| {
        b.iter(|| {
            let timing = Rc::new(DeterministicTiming::new());
            let scheduler =
                WorkScheduler::with_max_work_time_ms(timing.timing_functions(), 4.0).unwrap();
            for _ in 0..1000 {
                scheduler
                    .schedule_task(TaskSpec::from_fn(|_| {
                        black_box(1 + 1);
                        Ok(Progress::Done)
                    }))
                    .unwrap();
            }
            timing.run_animation_frame_callbacks(1).unwrap();
        })
    });
}

fn benchmark_named_refresh(c: &mut Criterion) {
    c.bench_function("refresh named task 1000", |b| {
        b.iter(|| {
            let timing = Rc::new(DeterministicTiming::new());
            let scheduler =
                WorkScheduler::with_max_work_time_ms(timing.timing_functions(), 4.0).unwrap();
            for i in 0..1000u64 {
                scheduler
                    .schedule_task(
                        TaskSpec::from_fn(move |_| {
                            black_box(i);
                            Ok(Progress::Done)
                        })
                        .with_id(i % 16),
                    )
                    .unwrap();
            }
            timing.run_animation_frame_callbacks(1).unwrap();
        })
    });
}

fn benchmark_run_until_done(c: &mut Criterion) {
    c.bench_function("run_until_done 1000 steps", |b| {
        b.iter(|| {
            let timing = Rc::new(DeterministicTiming::new());
            let scheduler =
                WorkScheduler::with_max_work_time_ms(timing.timing_functions(), 4.0).unwrap();
            let steps = std::cell::Cell::new(0u32);
            scheduler
                .schedule_task(
                    TaskSpec::from_fn(move |_| {
                        steps.set(steps.get() + 1);
                        Ok(Progress::from(steps.get() == 1000))
                    })
                    .run_until_done(true),
                )
                .unwrap();
            timing.run_animation_frame_callbacks(1).unwrap();
        })
    });
}

criterion_group!(
    benches,
    benchmark_schedule_and_flush,
    benchmark_named_refresh,
    benchmark_run_until_done
);
criterion_main!(benches);
