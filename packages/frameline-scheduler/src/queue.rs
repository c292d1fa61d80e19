use std::cell::RefCell;
use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::task::{Task, TaskId};

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    ids: FxHashSet<TaskId>,
}

/// Insertion-ordered set of pending tasks, keyed by id.
/// Since WorkScheduler is single-threaded, we use a RefCell; no borrow is
/// held while a task runs, so tasks may schedule more work.
#[derive(Default)]
pub struct TaskQueue {
    state: RefCell<QueueState>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `task`, or refreshes the pending task with the same id in
    /// place. Returns true if it was appended.
    pub fn upsert(&self, task: Task) -> bool {
        let mut state = self.state.borrow_mut();
        if state.ids.contains(task.id()) {
            if let Some(slot) = state.tasks.iter_mut().find(|t| t.id() == task.id()) {
                *slot = task;
            }
            return false;
        }
        state.ids.insert(task.id().clone());
        state.tasks.push_back(task);
        true
    }

    pub fn pop_front(&self) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        let task = state.tasks.pop_front()?;
        state.ids.remove(task.id());
        Some(task)
    }

    /// Puts `task` at the head unless its id was scheduled again meanwhile.
    /// Returns true if it was requeued.
    pub fn push_front(&self, task: Task) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.ids.insert(task.id().clone()) {
            return false;
        }
        state.tasks.push_front(task);
        true
    }

    /// Puts `tasks` at the head, keeping their order. Ids scheduled again
    /// meanwhile are skipped.
    pub fn prepend(&self, tasks: impl IntoIterator<Item = Task>) {
        let mut state = self.state.borrow_mut();
        let mut head = VecDeque::new();
        for task in tasks {
            if state.ids.insert(task.id().clone()) {
                head.push_back(task);
            }
        }
        if head.is_empty() {
            return;
        }
        head.extend(state.tasks.drain(..));
        state.tasks = head;
    }

    pub fn remove(&self, id: &TaskId) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        if !state.ids.remove(id) {
            return None;
        }
        let index = state.tasks.iter().position(|t| t.id() == id)?;
        state.tasks.remove(index)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.state.borrow().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().tasks.is_empty()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.state.borrow().tasks.iter().map(|t| t.id().clone()).collect()
    }

    /// Drops every pending task and returns them, head first.
    pub fn drain(&self) -> Vec<Task> {
        let mut state = self.state.borrow_mut();
        state.ids.clear();
        state.tasks.drain(..).collect()
    }
}
