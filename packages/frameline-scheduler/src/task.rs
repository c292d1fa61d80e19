use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use frameline_timing::{CallContext, TimingError, TimingFunctions};

use crate::error::SchedulerError;

/// What a task reports after one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Done,
    /// Invoke again this frame if time remains, otherwise resume next frame.
    NotDone,
    /// Resume next frame without being invoked again now.
    Yield,
}

impl From<bool> for Progress {
    fn from(done: bool) -> Self {
        if done { Progress::Done } else { Progress::NotDone }
    }
}

impl From<()> for Progress {
    fn from(_: ()) -> Self {
        Progress::Done
    }
}

/// The live time budget of the frame a task is running in.
///
/// [`remaining_ms`](FrameBudget::remaining_ms) reads the clock on every call,
/// so a task looping internally sees time pass between its own iterations.
#[derive(Clone)]
pub struct FrameBudget {
    deadline_ms: f64,
    timing: TimingFunctions,
    context: CallContext,
}

impl FrameBudget {
    /// Starts a budget of `max_work_time_ms` from the current time.
    pub fn starting_now(
        timing: &TimingFunctions,
        context: CallContext,
        max_work_time_ms: f64,
    ) -> Result<Self, TimingError> {
        let now = timing.now(context)?;
        Ok(Self {
            deadline_ms: now + max_work_time_ms,
            timing: timing.clone(),
            context,
        })
    }

    pub fn deadline_ms(&self) -> f64 {
        self.deadline_ms
    }

    /// Milliseconds left before the deadline. Zero or negative once spent.
    pub fn remaining_ms(&self) -> f64 {
        match self.timing.now(self.context) {
            Ok(now) => self.deadline_ms - now,
            Err(err) => {
                tracing::warn!(%err, "clock unavailable, treating frame budget as spent");
                0.0
            }
        }
    }

    pub fn has_time_remaining(&self) -> bool {
        self.remaining_ms() > 0.0
    }
}

impl fmt::Debug for FrameBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBudget")
            .field("deadline_ms", &self.deadline_ms)
            .finish_non_exhaustive()
    }
}

pub type TaskCallback = Rc<dyn Fn(&FrameBudget) -> anyhow::Result<Progress>>;

/// Wraps a closure as a [`TaskCallback`].
pub fn task_fn<F>(f: F) -> TaskCallback
where
    F: Fn(&FrameBudget) -> anyhow::Result<Progress> + 'static,
{
    Rc::new(f)
}

/// Identity of a callback allocation. Holding the `Rc` keeps the address
/// from being reused while the key exists.
#[derive(Clone)]
pub struct CallbackKey(TaskCallback);

impl CallbackKey {
    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast::<()>()
    }
}

impl PartialEq for CallbackKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CallbackKey {}

impl Hash for CallbackKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback@{:p}", self.addr())
    }
}

/// Identifies a pending task for de-duplication and cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    Name(Cow<'static, str>),
    Number(u64),
    /// Defaulted from the callback itself when no id is given.
    Callback(CallbackKey),
}

impl TaskId {
    pub fn of_callback(callback: &TaskCallback) -> Self {
        TaskId::Callback(CallbackKey(Rc::clone(callback)))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Name(name) => write!(f, "`{name}`"),
            TaskId::Number(number) => write!(f, "#{number}"),
            TaskId::Callback(key) => write!(f, "{key:?}"),
        }
    }
}

impl From<&'static str> for TaskId {
    fn from(name: &'static str) -> Self {
        TaskId::Name(Cow::Borrowed(name))
    }
}

impl From<String> for TaskId {
    fn from(name: String) -> Self {
        TaskId::Name(Cow::Owned(name))
    }
}

impl From<u64> for TaskId {
    fn from(number: u64) -> Self {
        TaskId::Number(number)
    }
}

impl From<&TaskCallback> for TaskId {
    fn from(callback: &TaskCallback) -> Self {
        TaskId::of_callback(callback)
    }
}

impl From<&Task> for TaskId {
    fn from(task: &Task) -> Self {
        task.id.clone()
    }
}

impl From<&TaskId> for TaskId {
    fn from(id: &TaskId) -> Self {
        id.clone()
    }
}

/// A request to schedule work: a callback plus optional id and completion
/// policy.
#[derive(Clone)]
pub struct TaskSpec {
    callback: TaskCallback,
    id: Option<TaskId>,
    run_until_done: bool,
}

impl TaskSpec {
    pub fn new(callback: TaskCallback) -> Self {
        Self {
            callback,
            id: None,
            run_until_done: false,
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&FrameBudget) -> anyhow::Result<Progress> + 'static,
    {
        Self::new(task_fn(f))
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn run_until_done(mut self, run_until_done: bool) -> Self {
        self.run_until_done = run_until_done;
        self
    }

    pub(crate) fn into_task(self) -> Result<Task, SchedulerError> {
        let id = match self.id {
            Some(TaskId::Name(name)) if name.is_empty() => return Err(SchedulerError::EmptyTaskId),
            Some(id) => id,
            None => TaskId::of_callback(&self.callback),
        };
        Ok(Task {
            id,
            callback: self.callback,
            run_until_done: self.run_until_done,
        })
    }
}

impl From<TaskCallback> for TaskSpec {
    fn from(callback: TaskCallback) -> Self {
        TaskSpec::new(callback)
    }
}

impl From<&TaskCallback> for TaskSpec {
    fn from(callback: &TaskCallback) -> Self {
        TaskSpec::new(Rc::clone(callback))
    }
}

impl From<Task> for TaskSpec {
    fn from(task: Task) -> Self {
        Self {
            callback: task.callback,
            id: Some(task.id),
            run_until_done: task.run_until_done,
        }
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("run_until_done", &self.run_until_done)
            .finish_non_exhaustive()
    }
}

/// A normalized, scheduled unit of work.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    callback: TaskCallback,
    run_until_done: bool,
}

impl Task {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn callback(&self) -> &TaskCallback {
        &self.callback
    }

    pub fn runs_until_done(&self) -> bool {
        self.run_until_done
    }

    pub(crate) fn invoke(&self, budget: &FrameBudget) -> anyhow::Result<Progress> {
        (self.callback)(budget)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("run_until_done", &self.run_until_done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_defaults_to_callback_identity() {
        let callback = task_fn(|_| Ok(Progress::Done));
        let first = TaskSpec::new(callback.clone()).into_task().unwrap();
        let second = TaskSpec::from(&callback).into_task().unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.id(), &TaskId::from(&callback));
    }

    #[test]
    fn test_distinct_callbacks_have_distinct_ids() {
        let a = TaskSpec::from_fn(|_| Ok(Progress::Done)).into_task().unwrap();
        let b = TaskSpec::from_fn(|_| Ok(Progress::Done)).into_task().unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = TaskSpec::from_fn(|_| Ok(Progress::Done))
            .with_id("")
            .into_task()
            .unwrap_err();
        assert!(matches!(err, SchedulerError::EmptyTaskId));
    }

    #[test]
    fn test_progress_conversions() {
        assert_eq!(Progress::from(true), Progress::Done);
        assert_eq!(Progress::from(false), Progress::NotDone);
        assert_eq!(Progress::from(()), Progress::Done);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::from("draw").to_string(), "`draw`");
        assert_eq!(TaskId::from(7u64).to_string(), "#7");
    }
}
