#![forbid(unsafe_code)]

//! Tracks which overridden error blocks are currently showing, per control.
//!
//! When an error block (or its group) names its own show policy, the
//! engine's decision can disagree with whatever error-state logic an input
//! widget runs on its own. The [`OverrideTracker`] records, per control, the
//! composite keys (`"{error}-{showWhen}"`) of overridden blocks that are
//! visible right now, and announces every change so widget adapters can
//! follow the engine (see [`crate::mirror`]).
//!
//! # Invariants
//!
//! 1. A record exists only for controls passed to [`OverrideTracker::add`].
//! 2. Keys within a record are unique and kept in first-shown order.
//! 3. Visibility changes for controls without a record are ignored and not
//!    announced.
//! 4. Records are never dropped implicitly; the owner calls
//!    [`OverrideTracker::remove`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use formwatch_forms::{Control, ControlId};
use formwatch_runtime::{EventStream, Subscription};

use crate::policy::ShowWhen;

/// Composite key of an error block: `"{error_name}-{show_when}"`.
#[must_use]
pub fn block_key(error_name: &str, show_when: &ShowWhen) -> String {
    format!("{error_name}-{show_when}")
}

struct TrackerInner {
    records: RefCell<HashMap<ControlId, Vec<String>>>,
    notifications: EventStream<Control>,
}

/// Shared per-control record of visible overridden error blocks.
#[derive(Clone)]
pub struct OverrideTracker {
    inner: Rc<TrackerInner>,
}

impl OverrideTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                records: RefCell::new(HashMap::new()),
                notifications: EventStream::new(),
            }),
        }
    }

    /// Start tracking `control` and announce it.
    ///
    /// An existing record is kept as is, so sibling blocks registering the
    /// same control do not erase each other's keys.
    pub fn add(&self, control: &Control) {
        let created = {
            let mut records = self.inner.records.borrow_mut();
            let mut created = false;
            records.entry(control.id()).or_insert_with(|| {
                created = true;
                Vec::new()
            });
            created
        };
        if created {
            tracing::debug!(control = control.id().id(), "override record created");
        }
        self.inner.notifications.emit(control);
    }

    /// Keys of overridden blocks currently showing for `control`.
    #[must_use]
    pub fn get(&self, control: &Control) -> Option<Vec<String>> {
        self.inner.records.borrow().get(&control.id()).cloned()
    }

    /// Whether `control` has a record.
    #[must_use]
    pub fn contains(&self, control: &Control) -> bool {
        self.inner.records.borrow().contains_key(&control.id())
    }

    /// Record that the `error_name`/`show_when` block became visible or hidden.
    pub fn error_visibility_changed(
        &self,
        control: &Control,
        error_name: &str,
        show_when: &ShowWhen,
        is_visible: bool,
    ) {
        {
            let mut records = self.inner.records.borrow_mut();
            let Some(keys) = records.get_mut(&control.id()) else {
                return;
            };
            let key = block_key(error_name, show_when);
            let present = keys.contains(&key);
            if is_visible && !present {
                keys.push(key);
            } else if !is_visible && present {
                keys.retain(|k| *k != key);
            }
        }
        tracing::trace!(
            control = control.id().id(),
            error = error_name,
            show_when = %show_when,
            is_visible,
            "override visibility changed"
        );
        self.inner.notifications.emit(control);
    }

    /// Drop the record for `control`. Announces the removal if there was one.
    pub fn remove(&self, control: &Control) -> bool {
        let removed = self.inner.records.borrow_mut().remove(&control.id()).is_some();
        if removed {
            tracing::debug!(control = control.id().id(), "override record removed");
            self.inner.notifications.emit(control);
        }
        removed
    }

    /// Stream of controls whose record was created, changed or removed.
    #[must_use]
    pub fn notifications(&self) -> EventStream<Control> {
        self.inner.notifications.clone()
    }

    /// Shorthand for `notifications().subscribe(..)`.
    pub fn subscribe(&self, callback: impl Fn(&Control) + 'static) -> Subscription {
        self.inner.notifications.subscribe(callback)
    }

    /// Number of tracked controls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.borrow().is_empty()
    }
}

impl Default for OverrideTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OverrideTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideTracker")
            .field("controls", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(tracker: &OverrideTracker) -> (Rc<Cell<u32>>, Subscription) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = tracker.subscribe(move |_| c.set(c.get() + 1));
        (count, sub)
    }

    #[test]
    fn add_creates_empty_record_and_notifies() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        let (count, _sub) = counting(&tracker);

        assert_eq!(tracker.get(&control), None);
        tracker.add(&control);
        assert_eq!(tracker.get(&control), Some(Vec::new()));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn add_keeps_existing_keys() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        tracker.add(&control);
        tracker.error_visibility_changed(&control, "required", &ShowWhen::DIRTY, true);
        tracker.add(&control);
        assert_eq!(tracker.get(&control), Some(vec!["required-dirty".to_owned()]));
    }

    #[test]
    fn visibility_changes_add_and_remove_keys_once() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        tracker.add(&control);
        let (count, _sub) = counting(&tracker);

        tracker.error_visibility_changed(&control, "required", &ShowWhen::DIRTY, true);
        tracker.error_visibility_changed(&control, "required", &ShowWhen::DIRTY, true);
        tracker.error_visibility_changed(&control, "min", &ShowWhen::TOUCHED, true);
        assert_eq!(
            tracker.get(&control),
            Some(vec!["required-dirty".to_owned(), "min-touched".to_owned()])
        );

        tracker.error_visibility_changed(&control, "required", &ShowWhen::DIRTY, false);
        assert_eq!(tracker.get(&control), Some(vec!["min-touched".to_owned()]));
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn untracked_controls_are_ignored() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        let (count, _sub) = counting(&tracker);
        tracker.error_visibility_changed(&control, "required", &ShowWhen::DIRTY, true);
        assert_eq!(tracker.get(&control), None);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn remove_drops_record() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        tracker.add(&control);
        let (count, _sub) = counting(&tracker);

        assert!(tracker.remove(&control));
        assert!(!tracker.remove(&control));
        assert!(tracker.is_empty());
        assert_eq!(count.get(), 1);
    }
}
