use std::cell::Cell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use anyhow::Context as _;
use frameline_timing::{CallContext, CallbackId, TimingError, TimingFunctions};
use smallvec::SmallVec;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::queue::TaskQueue;
use crate::task::{FrameBudget, Progress, Task, TaskId, TaskSpec};

/// Cooperative scheduler that runs queued tasks inside a per-frame time
/// budget.
///
/// Tasks run in queue order when the timing source fires a frame callback.
/// The budget is checked between tasks, never before the first one, so every
/// frame makes progress even with a zero budget. Run-until-done tasks that
/// run out of time go back to the head of the queue and resume next frame.
///
/// The handle is cheap to clone. The pending frame callback only holds a weak
/// reference, so dropping every handle stops the scheduler.
#[derive(Clone)]
pub struct WorkScheduler {
    inner: Rc<SchedulerInner>,
}

/// Non-owning handle, for tasks that need to reach their own scheduler.
#[derive(Clone)]
pub struct WeakWorkScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakWorkScheduler {
    pub fn upgrade(&self) -> Option<WorkScheduler> {
        self.inner.upgrade().map(|inner| WorkScheduler { inner })
    }
}

struct SchedulerInner {
    timing: TimingFunctions,
    context: CallContext,
    max_work_time_ms: f64,
    enabled: Cell<bool>,
    disposed: Cell<bool>,
    pending_frame: Cell<Option<CallbackId>>,
    queue: TaskQueue,
    this: Weak<SchedulerInner>,
}

#[derive(Debug, Default)]
struct FrameStats {
    ran: usize,
    requeued: usize,
}

impl WorkScheduler {
    pub fn new(timing: TimingFunctions, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let inner = Rc::new_cyclic(|this| SchedulerInner {
            timing,
            context: CallContext::GLOBAL,
            max_work_time_ms: config.max_work_time_ms,
            enabled: Cell::new(true),
            disposed: Cell::new(false),
            pending_frame: Cell::new(None),
            queue: TaskQueue::new(),
            this: this.clone(),
        });
        Ok(Self { inner })
    }

    pub fn with_max_work_time_ms(
        timing: TimingFunctions,
        max_work_time_ms: f64,
    ) -> Result<Self, SchedulerError> {
        Self::new(timing, SchedulerConfig::with_max_work_time_ms(max_work_time_ms))
    }

    pub fn downgrade(&self) -> WeakWorkScheduler {
        WeakWorkScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Queues a task, or refreshes the callback and policy of the pending
    /// task with the same id without moving it. Never runs the callback.
    pub fn schedule_task(&self, spec: impl Into<TaskSpec>) -> Result<Task, SchedulerError> {
        if self.inner.disposed.get() {
            return Err(SchedulerError::Disposed);
        }
        let task = spec.into().into_task()?;
        if self.inner.queue.upsert(task.clone()) {
            tracing::trace!(task = %task.id(), "task scheduled");
        } else {
            tracing::trace!(task = %task.id(), "pending task refreshed");
        }
        self.inner.request_frame()?;
        Ok(task)
    }

    /// Removes the pending task with this id, if any. An outstanding frame
    /// request is left alone. Returns true if a task was removed.
    pub fn unschedule_task(&self, id: impl Into<TaskId>) -> bool {
        let id = id.into();
        let removed = self.inner.queue.remove(&id).is_some();
        if removed {
            tracing::trace!(task = %id, "task unscheduled");
        }
        removed
    }

    pub fn is_scheduled_task(&self, id: impl Into<TaskId>) -> bool {
        self.inner.queue.contains(&id.into())
    }

    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Pending task ids in the order they will run.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.inner.queue.ids()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.inner.pending_frame.get().is_some()
    }

    pub fn max_work_time_ms(&self) -> f64 {
        self.inner.max_work_time_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Gates frame requests. Queued tasks stay queued while disabled, and
    /// re-enabling does not request a frame by itself; see [`kick`](Self::kick).
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
    }

    /// Requests a frame if there is queued work and none is outstanding.
    /// Returns true if a new request was made.
    pub fn kick(&self) -> Result<bool, SchedulerError> {
        if self.inner.disposed.get() {
            return Err(SchedulerError::Disposed);
        }
        if self.inner.queue.is_empty() || self.has_pending_frame() {
            return Ok(false);
        }
        self.inner.request_frame()?;
        Ok(self.has_pending_frame())
    }

    /// Runs one frame now, for hosts that drive the scheduler themselves.
    /// Any outstanding frame request is cancelled first.
    pub fn run_frame(&self) -> anyhow::Result<()> {
        if let Some(id) = self.inner.pending_frame.take() {
            self.inner.timing.cancel_frame(self.inner.context, id)?;
        }
        self.inner.run_frame()
    }

    /// Drops all pending tasks and the outstanding frame request. Later
    /// calls to [`schedule_task`](Self::schedule_task) fail.
    pub fn dispose(&self) -> Result<(), SchedulerError> {
        if self.inner.disposed.replace(true) {
            return Ok(());
        }
        let dropped = self.inner.queue.drain();
        tracing::debug!(dropped = dropped.len(), "scheduler disposed");
        if let Some(id) = self.inner.pending_frame.take() {
            self.inner.timing.cancel_frame(self.inner.context, id)?;
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for WorkScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkScheduler")
            .field("enabled", &self.inner.enabled.get())
            .field("disposed", &self.inner.disposed.get())
            .field("pending_frame", &self.inner.pending_frame.get())
            .field("max_work_time_ms", &self.inner.max_work_time_ms)
            .field("tasks", &self.inner.queue.ids())
            .finish()
    }
}

impl SchedulerInner {
    fn request_frame(&self) -> Result<(), TimingError> {
        if !self.enabled.get() || self.disposed.get() || self.pending_frame.get().is_some() {
            return Ok(());
        }
        let this = self.this.clone();
        let id = self.timing.request_frame(self.context, move |_timestamp| {
            match this.upgrade() {
                Some(inner) => inner.run_frame(),
                None => Ok(()),
            }
        })?;
        self.pending_frame.set(Some(id));
        Ok(())
    }

    fn run_frame(&self) -> anyhow::Result<()> {
        self.pending_frame.set(None);
        if self.disposed.get() {
            return Ok(());
        }

        let mut frame = FrameGuard::new(self);
        let outcome = FrameBudget::starting_now(&self.timing, self.context, self.max_work_time_ms)
            .map_err(anyhow::Error::from)
            .and_then(|budget| self.run_tasks(&budget, &mut frame.yielded));
        // Work left behind a failed task still gets its next frame.
        let settled = frame.finish();

        let stats = outcome?;
        settled?;
        tracing::debug!(
            ran = stats.ran,
            requeued = stats.requeued,
            pending = self.queue.len(),
            "frame finished"
        );
        Ok(())
    }

    /// Puts yielded tasks back at the head of the queue, then requests the
    /// next frame if work remains or drops a request nothing needs.
    fn settle_frame(&self, yielded: SmallVec<[Task; 4]>) -> Result<(), TimingError> {
        if self.disposed.get() {
            return Ok(());
        }
        self.queue.prepend(yielded);
        if !self.queue.is_empty() {
            return self.request_frame();
        }
        match self.pending_frame.take() {
            Some(id) => self.timing.cancel_frame(self.context, id),
            None => Ok(()),
        }
    }

    fn run_tasks(
        &self,
        budget: &FrameBudget,
        yielded: &mut SmallVec<[Task; 4]>,
    ) -> anyhow::Result<FrameStats> {
        let mut stats = FrameStats::default();
        loop {
            if self.disposed.get() {
                break;
            }
            if stats.ran > 0 && !budget.has_time_remaining() {
                break;
            }
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            stats.ran += 1;

            let progress = self.invoke(&task, budget)?;
            if !task.runs_until_done() || self.disposed.get() {
                continue;
            }
            match progress {
                Progress::Done => {}
                Progress::Yield => yielded.push(task),
                Progress::NotDone => {
                    if self.queue.push_front(task) {
                        stats.requeued += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Invokes `task`, repeating run-until-done tasks while they report
    /// `NotDone` and the budget lasts.
    fn invoke(&self, task: &Task, budget: &FrameBudget) -> anyhow::Result<Progress> {
        loop {
            tracing::trace!(task = %task.id(), "running task");
            let progress = task
                .invoke(budget)
                .with_context(|| format!("scheduled task {} failed", task.id()))?;
            let again = task.runs_until_done()
                && progress == Progress::NotDone
                && !self.disposed.get()
                && budget.has_time_remaining();
            if !again {
                return Ok(progress);
            }
        }
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(id) = self.pending_frame.take() {
            let _ = self.timing.cancel_frame(self.context, id);
        }
    }
}

/// Settles a frame however it ends, unwinding included.
struct FrameGuard<'a> {
    scheduler: &'a SchedulerInner,
    yielded: SmallVec<[Task; 4]>,
    settled: bool,
}

impl<'a> FrameGuard<'a> {
    fn new(scheduler: &'a SchedulerInner) -> Self {
        Self {
            scheduler,
            yielded: SmallVec::new(),
            settled: false,
        }
    }

    fn finish(mut self) -> Result<(), TimingError> {
        self.settled = true;
        let yielded = mem::take(&mut self.yielded);
        self.scheduler.settle_frame(yielded)
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let yielded = mem::take(&mut self.yielded);
        if let Err(err) = self.scheduler.settle_frame(yielded) {
            tracing::warn!(%err, "could not request a frame after an aborted frame");
        }
    }
}
