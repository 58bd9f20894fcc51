//! Observable cells and broadcast signals.
//!
//! `Signal<T>` is a fan-out broadcast: subscribers attach by identity, may
//! detach, and receive each emission in subscription order, synchronously on
//! the emitting thread. `Cell<T>` holds a single value and emits the
//! post-mutation value to subscribers whenever it changes.
//!
//! Both primitives are reentrancy-safe: a subscriber that emits onto the
//! signal it is currently handling does not recurse; the nested emission is
//! queued on the signal and drained once the current dispatch completes.
//! A subscriber that panics is caught at the dispatch site and logged, and
//! the remaining subscribers still receive the emission.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use tracing::error;

use crate::error::Error;

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Subscribers<T> {
    slots: Vec<(u64, Slot<T>)>,
    next_id: u64,
}

impl<T> Subscribers<T> {
    fn detach(&mut self, id: u64) {
        self.slots.retain(|(slot_id, _)| *slot_id != id);
    }
}

struct DispatchState<T> {
    /// Threads currently delivering on this signal.
    active: Vec<ThreadId>,
    /// Emissions queued by reentrant emits, drained by the outer dispatch.
    deferred: VecDeque<T>,
}

// ── Connection ────────────────────────────────────────────────────────────────

/// Scoped subscription handle. Dropping it detaches the subscriber; emissions
/// after the drop no longer reach the closure.
pub struct Connection {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Connection {
    fn new(detach: Box<dyn FnOnce() + Send + Sync>) -> Self {
        Self {
            detach: Some(detach),
        }
    }

    /// Detaches eagerly instead of at end of scope.
    pub fn disconnect(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// ── Signal ────────────────────────────────────────────────────────────────────

/// Fan-out broadcast signal. Delivery is synchronous on the emitter's thread.
pub struct Signal<T> {
    subscribers: Arc<Mutex<Subscribers<T>>>,
    dispatch: Mutex<DispatchState<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Subscribers {
                slots: Vec::new(),
                next_id: 0,
            })),
            dispatch: Mutex::new(DispatchState {
                active: Vec::new(),
                deferred: VecDeque::new(),
            }),
        }
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a subscriber. The returned connection severs the
    /// subscription when dropped.
    pub fn connect<F>(&self, f: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut subs = self.subscribers.lock().unwrap();
            let id = subs.next_id;
            subs.next_id += 1;
            subs.slots.push((id, Arc::new(f)));
            id
        };

        let weak: Weak<Mutex<Subscribers<T>>> = Arc::downgrade(&self.subscribers);
        Connection::new(Box::new(move || {
            if let Some(subs) = weak.upgrade() {
                subs.lock().unwrap().detach(id);
            }
        }))
    }

    /// Emits a value to every subscriber, in subscription order. A reentrant
    /// emit from the current thread is queued and delivered after the
    /// in-flight dispatch returns.
    pub fn emit(&self, value: T) {
        let me = thread::current().id();
        {
            let mut dispatch = self.dispatch.lock().unwrap();
            if dispatch.active.contains(&me) {
                dispatch.deferred.push_back(value);
                return;
            }
            dispatch.active.push(me);
        }

        self.deliver(&value);

        // Drain emissions queued while we were delivering.
        loop {
            let next = {
                let mut dispatch = self.dispatch.lock().unwrap();
                match dispatch.deferred.pop_front() {
                    Some(value) => Some(value),
                    None => {
                        dispatch.active.retain(|id| *id != me);
                        None
                    }
                }
            };
            match next {
                Some(value) => self.deliver(&value),
                None => break,
            }
        }
    }

    fn deliver(&self, value: &T) {
        // Snapshot so subscribers may connect/disconnect during dispatch
        // without invalidating the iteration.
        let slots: Vec<Slot<T>> = {
            let subs = self.subscribers.lock().unwrap();
            subs.slots.iter().map(|(_, slot)| Arc::clone(slot)).collect()
        };

        for slot in slots {
            if catch_unwind(AssertUnwindSafe(|| slot(value))).is_err() {
                let err = Error::ProviderFault("subscriber panicked during dispatch".to_string());
                error!("{err}; continuing with remaining subscribers");
            }
        }
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().slots.len()
    }
}

// ── Cell ──────────────────────────────────────────────────────────────────────

/// A single observable value. `set` and `update` notify subscribers with the
/// post-mutation value; notification happens outside the value lock so a
/// subscriber may read the cell while handling the change.
pub struct Cell<T> {
    value: Mutex<T>,
    changed: Signal<T>,
}

impl<T: Clone + PartialEq + Send + 'static> Cell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
            changed: Signal::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.lock().unwrap().clone()
    }

    /// Stores `next` and notifies subscribers if the value actually changed.
    pub fn set(&self, next: T) {
        let emit = {
            let mut value = self.value.lock().unwrap();
            if *value == next {
                false
            } else {
                *value = next.clone();
                true
            }
        };
        if emit {
            self.changed.emit(next);
        }
    }

    /// Mutates in place. The mutator returns true to request notification.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut T) -> bool,
    {
        let notify = {
            let mut value = self.value.lock().unwrap();
            let notify = mutate(&mut value);
            notify.then(|| value.clone())
        };
        if let Some(value) = notify {
            self.changed.emit(value);
        }
    }

    pub fn changed(&self) -> &Signal<T> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + Send + Default + 'static> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
