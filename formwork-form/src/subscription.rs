//! Change subscriptions

use formwork_core::{FieldPath, FormValues};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// What kind of mutation produced a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// A single value was set
    Value,
    /// An entry was appended to an array
    ArrayAppend { index: usize },
    /// An entry was removed from an array
    ArrayRemove { index: usize },
    /// The whole form was reset
    Reset,
}

/// Change notification delivered to subscribers
#[derive(Debug, Clone)]
pub struct FormChange {
    /// Changed field or array; `None` for a reset
    pub path: Option<FieldPath>,
    pub kind: ChangeKind,
    /// Values after the change
    pub values: FormValues,
}

impl FormChange {
    /// Whether the change touches `path`, one of its ancestors or descendants
    pub fn affects(&self, path: &FieldPath) -> bool {
        match &self.path {
            None => true,
            Some(changed) => changed.starts_with(path) || path.starts_with(changed),
        }
    }
}

pub(crate) type Callback = Arc<dyn Fn(&FormChange) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Subscriber list shared by every handle of a store
#[derive(Clone, Default)]
pub(crate) struct Subscribers {
    registry: Arc<Mutex<Registry>>,
}

impl Subscribers {
    pub(crate) fn add(&self, callback: Callback) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push((id, callback));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Deliver to every subscriber in subscription order. The registry lock
    /// is released before any callback runs, so callbacks may subscribe,
    /// unsubscribe or read the store.
    pub(crate) fn notify(&self, change: &FormChange) {
        let callbacks: Vec<Callback> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(change);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }
}

/// Handle to a registered callback.
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe).
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop receiving changes. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}
