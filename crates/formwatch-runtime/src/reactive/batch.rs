#![forbid(unsafe_code)]

//! Deferred notification scopes.
//!
//! While a [`BatchScope`] is alive, [`Observable`](super::Observable) values
//! update immediately but their notifications queue up on a thread-local
//! list. When the outermost scope drops, the queue is drained in the order the
//! observables first changed. Each observable is flushed once per batch with
//! its final value.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

type Deferred = Box<dyn FnOnce()>;

#[derive(Default)]
struct BatchContext {
    depth: u32,
    queue: Vec<Deferred>,
}

thread_local! {
    static BATCH: RefCell<BatchContext> = RefCell::new(BatchContext::default());
}

/// RAII guard that defers observable notifications until it drops.
///
/// Nested scopes are allowed; only the outermost one flushes.
#[must_use = "dropping a BatchScope flushes immediately"]
pub struct BatchScope {
    _not_send: PhantomData<Rc<()>>,
}

impl BatchScope {
    /// Open a batch on the current thread.
    pub fn new() -> Self {
        BATCH.with(|ctx| ctx.borrow_mut().depth += 1);
        Self {
            _not_send: PhantomData,
        }
    }

    /// Whether any batch is open on the current thread.
    #[must_use]
    pub fn is_active() -> bool {
        is_active()
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let outermost = BATCH.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            ctx.depth = ctx.depth.saturating_sub(1);
            ctx.depth == 0
        });
        if !outermost {
            return;
        }
        // Flushed callbacks may set more observables; those notify directly
        // now that the depth is zero, but anything they defer inside a fresh
        // batch is picked up by this loop too.
        loop {
            let queue = BATCH.with(|ctx| {
                let mut ctx = ctx.borrow_mut();
                if ctx.depth > 0 {
                    return Vec::new();
                }
                std::mem::take(&mut ctx.queue)
            });
            if queue.is_empty() {
                break;
            }
            for deferred in queue {
                deferred();
            }
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope").finish()
    }
}

pub(crate) fn is_active() -> bool {
    BATCH.with(|ctx| ctx.borrow().depth > 0)
}

pub(crate) fn defer(deferred: Deferred) {
    BATCH.with(|ctx| ctx.borrow_mut().queue.push(deferred));
}
