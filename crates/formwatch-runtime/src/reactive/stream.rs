#![forbid(unsafe_code)]

//! Value-less event streams.
//!
//! An [`EventStream<T>`] is the push-only sibling of
//! [`Observable`](super::Observable): it has no current value, no equality
//! check and no batching. Every [`emit`](EventStream::emit) reaches every
//! live subscriber, in registration order. Use it for occurrences (a form
//! was submitted, a control was marked touched) rather than state.

use std::rc::Rc;

use super::observable::{SubscriberList, Subscription};

/// A shared broadcast stream of `T` events.
pub struct EventStream<T: 'static> {
    subscribers: Rc<SubscriberList<T>>,
}

impl<T: 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: 'static> EventStream<T> {
    /// Create a stream with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(SubscriberList::new()),
        }
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&self, event: &T) {
        self.subscribers.notify(event);
    }

    /// Register a callback for subsequent events.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribers.add(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
