//! Futures as scheduled tasks.
//!
//! A future task is polled from inside the frame loop. A poll that returns
//! `Pending` after waking itself is retried while the frame budget lasts; a
//! poll that returns `Pending` without a wake-up resumes next frame.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::{ArcWake, waker};

use crate::error::SchedulerError;
use crate::scheduler::WorkScheduler;
use crate::task::{FrameBudget, Progress, Task, TaskCallback, TaskId, TaskSpec};

struct WakeFlag {
    woken: AtomicBool,
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

struct FutureDriver {
    future: RefCell<Option<LocalBoxFuture<'static, anyhow::Result<()>>>>,
    flag: Arc<WakeFlag>,
    waker: Waker,
}

impl FutureDriver {
    fn new(future: impl Future<Output = anyhow::Result<()>> + 'static) -> Self {
        let flag = Arc::new(WakeFlag {
            woken: AtomicBool::new(false),
        });
        Self {
            future: RefCell::new(Some(future.boxed_local())),
            waker: waker(Arc::clone(&flag)),
            flag,
        }
    }

    fn poll(&self) -> anyhow::Result<Progress> {
        let mut slot = self.future.borrow_mut();
        let Some(future) = slot.as_mut() else {
            return Ok(Progress::Done);
        };
        self.flag.woken.store(false, Ordering::Release);
        let mut cx = Context::from_waker(&self.waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                *slot = None;
                result.map(|()| Progress::Done)
            }
            Poll::Pending if self.flag.woken.swap(false, Ordering::AcqRel) => Ok(Progress::NotDone),
            Poll::Pending => Ok(Progress::Yield),
        }
    }
}

impl WorkScheduler {
    /// Schedules `future` under `id`. It completes when the future resolves;
    /// an `Err` output propagates like any failing task.
    pub fn schedule_future<F>(&self, id: impl Into<TaskId>, future: F) -> Result<Task, SchedulerError>
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        let driver = FutureDriver::new(future);
        let callback: TaskCallback = Rc::new(move |_budget: &FrameBudget| driver.poll());
        self.schedule_task(TaskSpec::new(callback).with_id(id).run_until_done(true))
    }
}
