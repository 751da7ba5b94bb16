#![forbid(unsafe_code)]

//! Version-tracked shared values with change notification.
//!
//! [`Observable<T>`] holds a value behind `Rc` so clones share state. Every
//! mutation that actually changes the value bumps the version and notifies
//! subscribers in registration order. Setting an equal value is a no-op,
//! which is what makes downstream streams deduplicated for free.
//!
//! Subscribers are stored as `Weak` callbacks; the strong side lives in the
//! returned [`Subscription`]. Dead entries are pruned lazily on the next
//! notification.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::batch;

/// RAII guard for a registered callback.
///
/// Dropping the guard releases the callback; it will not be invoked by any
/// notification cycle that starts afterwards.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Wrap any RAII guard so it can be held alongside callback subscriptions.
    pub fn from_guard(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }

    /// Explicitly release the subscription. Equivalent to dropping it.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered list of weakly-held callbacks shared by [`Observable`] and
/// [`EventStream`](super::EventStream).
pub(crate) struct SubscriberList<T: 'static> {
    entries: RefCell<Vec<Weak<dyn Fn(&T)>>>,
}

impl<T: 'static> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: Rc<dyn Fn(&T)> = Rc::new(callback);
        self.entries.borrow_mut().push(Rc::downgrade(&strong));
        Subscription::from_guard(strong)
    }

    /// Snapshot the live callbacks, pruning released ones.
    ///
    /// The snapshot is taken before any callback runs so callbacks may
    /// subscribe or unsubscribe re-entrantly.
    pub(crate) fn live(&self) -> Vec<Rc<dyn Fn(&T)>> {
        let mut entries = self.entries.borrow_mut();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|weak| match weak.upgrade() {
            Some(cb) => {
                live.push(cb);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn notify(&self, value: &T) {
        for callback in self.live() {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

struct ObservableInner<T: 'static> {
    value: RefCell<T>,
    version: Cell<u64>,
    notify_pending: Cell<bool>,
    subscribers: SubscriberList<T>,
}

/// A shared, version-tracked value with change notification.
pub struct Observable<T: 'static> {
    inner: Rc<ObservableInner<T>>,
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                notify_pending: Cell::new(false),
                subscribers: SubscriberList::new(),
            }),
        }
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Returns `true` if it changed.
    ///
    /// Equal values leave the version untouched and notify nobody.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.notify();
        true
    }

    /// Register a callback invoked with the new value after every change.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.subscribers.add(callback)
    }

    /// Number of mutations that changed the value.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Whether two handles share the same underlying value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        if batch::is_active() {
            // One deferred flush per observable per batch, carrying the final value.
            if self.inner.notify_pending.replace(true) {
                return;
            }
            let this = self.clone();
            batch::defer(Box::new(move || {
                this.inner.notify_pending.set(false);
                this.notify_now();
            }));
            return;
        }
        self.notify_now();
    }

    fn notify_now(&self) {
        let value = self.get();
        self.inner.subscribers.notify(&value);
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}
