use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;

use rustc_hash::FxHashSet;

use crate::error::{CallbackKind, TimingError};

/// Invoked before the next repaint with the batch timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64) -> anyhow::Result<()>>;

/// Invoked once its delay has elapsed. Arguments are captured by the closure.
pub type DelayedCallback = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// Handle returned when a callback is registered with a timing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn kind(self) -> CallbackKind {
        CallbackKind::of(self)
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback #{}", self.0)
    }
}

/// Allocates ids of one parity: 1, 3, 5, ... for frames, 2, 4, 6, ... for delays.
#[derive(Debug)]
pub struct IdSequence {
    next: Cell<u64>,
}

impl IdSequence {
    pub fn new(kind: CallbackKind) -> Self {
        let first = match kind {
            CallbackKind::Frame => 1,
            CallbackKind::Delayed => 2,
        };
        Self {
            next: Cell::new(first),
        }
    }

    pub fn next_id(&self) -> CallbackId {
        let id = self.next.get();
        self.next.set(id + 2);
        CallbackId(id)
    }
}

pub(crate) struct Entry<C> {
    pub(crate) id: CallbackId,
    pub(crate) payload: C,
}

pub(crate) struct Delayed {
    pub(crate) due_ms: f64,
    pub(crate) callback: DelayedCallback,
}

/// Canonical queue of callbacks for one kind.
///
/// A flush detaches the whole queue before running anything, so callbacks
/// registered while it runs land in a fresh queue and wait for the next pass.
/// Detached ids stay cancellable until they are claimed for execution.
pub(crate) struct CallbackRegistry<C> {
    kind: CallbackKind,
    ids: IdSequence,
    queue: VecDeque<Entry<C>>,
    in_flight: FxHashSet<CallbackId>,
    cancelled: FxHashSet<CallbackId>,
}

impl<C> CallbackRegistry<C> {
    pub(crate) fn new(kind: CallbackKind) -> Self {
        Self {
            kind,
            ids: IdSequence::new(kind),
            queue: VecDeque::new(),
            in_flight: FxHashSet::default(),
            cancelled: FxHashSet::default(),
        }
    }

    pub(crate) fn push(&mut self, payload: C) -> CallbackId {
        let id = self.ids.next_id();
        self.queue.push_back(Entry { id, payload });
        id
    }

    /// Unknown or already-run ids are ignored.
    pub(crate) fn cancel(&mut self, id: CallbackId) -> Result<(), TimingError> {
        self.kind.check(id)?;
        if let Some(index) = self.queue.iter().position(|entry| entry.id == id) {
            self.queue.remove(index);
        } else if self.in_flight.remove(&id) {
            self.cancelled.insert(id);
        }
        Ok(())
    }

    pub(crate) fn detach(&mut self) -> VecDeque<Entry<C>> {
        let working = mem::take(&mut self.queue);
        self.in_flight.extend(working.iter().map(|entry| entry.id));
        working
    }

    /// Marks a detached callback as running. Returns false if it was
    /// cancelled after being detached.
    pub(crate) fn claim(&mut self, id: CallbackId) -> bool {
        if self.cancelled.remove(&id) {
            return false;
        }
        self.in_flight.remove(&id);
        true
    }

    /// Puts detached callbacks back ahead of anything registered since.
    pub(crate) fn restore(&mut self, entries: impl IntoIterator<Item = Entry<C>>) {
        let mut restored = VecDeque::with_capacity(self.queue.len());
        for entry in entries {
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            self.in_flight.remove(&entry.id);
            restored.push_back(entry);
        }
        if restored.is_empty() {
            return;
        }
        restored.extend(self.queue.drain(..));
        self.queue = restored;
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn ids(&self) -> Vec<CallbackId> {
        self.queue.iter().map(|entry| entry.id).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.cancelled.extend(self.in_flight.drain());
    }
}

/// Returns unexecuted callbacks to the registry when a pass ends, including
/// when a callback fails or panics part way through.
struct PassGuard<'a, C> {
    registry: &'a RefCell<CallbackRegistry<C>>,
    deferred: VecDeque<Entry<C>>,
    remaining: VecDeque<Entry<C>>,
}

impl<'a, C> PassGuard<'a, C> {
    fn detach(registry: &'a RefCell<CallbackRegistry<C>>) -> Self {
        let remaining = registry.borrow_mut().detach();
        Self {
            registry,
            deferred: VecDeque::new(),
            remaining,
        }
    }

    fn next(&mut self) -> Option<Entry<C>> {
        self.remaining.pop_front()
    }

    fn defer(&mut self, entry: Entry<C>) {
        self.deferred.push_back(entry);
    }

    fn claim(&self, id: CallbackId) -> bool {
        self.registry.borrow_mut().claim(id)
    }
}

impl<C> Drop for PassGuard<'_, C> {
    fn drop(&mut self) {
        let deferred = mem::take(&mut self.deferred);
        let remaining = mem::take(&mut self.remaining);
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.restore(deferred.into_iter().chain(remaining));
        }
    }
}

/// Runs every frame callback queued before the pass started, sharing one
/// timestamp. Returns how many ran.
pub(crate) fn run_frame_pass(
    registry: &RefCell<CallbackRegistry<FrameCallback>>,
    timestamp: f64,
) -> Result<usize, TimingError> {
    let mut pass = PassGuard::detach(registry);
    let mut ran = 0;
    while let Some(entry) = pass.next() {
        if !pass.claim(entry.id) {
            continue;
        }
        tracing::trace!(id = %entry.id, timestamp, "running frame callback");
        ran += 1;
        (entry.payload)(timestamp)?;
    }
    Ok(ran)
}

/// Runs the delayed callbacks due at `now_ms`, keeping the rest queued in
/// their original order. Returns how many ran.
pub(crate) fn run_timer_pass(
    registry: &RefCell<CallbackRegistry<Delayed>>,
    now_ms: f64,
) -> Result<usize, TimingError> {
    let mut pass = PassGuard::detach(registry);
    let mut ran = 0;
    while let Some(entry) = pass.next() {
        if entry.payload.due_ms > now_ms {
            pass.defer(entry);
            continue;
        }
        if !pass.claim(entry.id) {
            continue;
        }
        tracing::trace!(id = %entry.id, now_ms, "running delayed callback");
        ran += 1;
        (entry.payload.callback)()?;
    }
    Ok(ran)
}
