#![forbid(unsafe_code)]

//! Per-group visibility with a cap on how many errors show at once.
//!
//! Each error block publishes a raw "could be hidden" flag under its key.
//! The aggregator turns those flags into the final per-key `hidden`
//! observables: walking keys in insertion order, an eligible key is shown
//! only while the number of eligible keys up to and including it stays
//! within `max_visible`.
//!
//! # Invariants
//!
//! 1. At most `max_visible` keys are shown.
//! 2. Among eligible keys the earliest inserted win, regardless of name.
//! 3. A `hidden` observable only notifies when its own value flips.
//! 4. Observers are notified after the whole capped view is updated.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

use formwatch_runtime::{BatchScope, Observable};

struct Entry {
    key: String,
    holders: usize,
    could_be_hidden: bool,
    hidden: Observable<bool>,
}

struct AggregatorInner {
    max_visible: Option<NonZeroUsize>,
    entries: RefCell<Vec<Entry>>,
}

/// Capped visibility for one errors group.
#[derive(Clone)]
pub struct GroupAggregator {
    inner: Rc<AggregatorInner>,
}

impl GroupAggregator {
    /// An aggregator showing at most `max_visible` keys (unlimited if `None`).
    #[must_use]
    pub fn new(max_visible: Option<NonZeroUsize>) -> Self {
        Self {
            inner: Rc::new(AggregatorInner {
                max_visible,
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Claim `key` for a binding and return its `hidden` observable.
    ///
    /// New keys start hidden and are appended; claiming an existing key
    /// shares its entry.
    pub fn join(&self, key: &str) -> Observable<bool> {
        let mut entries = self.inner.entries.borrow_mut();
        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            entry.holders += 1;
            return entry.hidden.clone();
        }
        let hidden = Observable::new(true);
        entries.push(Entry {
            key: key.to_owned(),
            holders: 1,
            could_be_hidden: true,
            hidden: hidden.clone(),
        });
        hidden
    }

    /// Publish the raw flag for `key` and recompute the capped view.
    ///
    /// Unknown keys are appended first.
    pub fn set_raw(&self, key: &str, could_be_hidden: bool) {
        {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.iter_mut().find(|e| e.key == key) {
                Some(entry) => entry.could_be_hidden = could_be_hidden,
                None => entries.push(Entry {
                    key: key.to_owned(),
                    holders: 0,
                    could_be_hidden,
                    hidden: Observable::new(true),
                }),
            }
        }
        self.recompute();
    }

    /// Release one claim on `key`; the entry goes away with its last holder.
    ///
    /// The removed entry's observable is left untouched, so it emits nothing
    /// further. Remaining keys are recomputed. Returns `true` when the entry
    /// was dropped.
    pub fn remove(&self, key: &str) -> bool {
        let removed = {
            let mut entries = self.inner.entries.borrow_mut();
            let Some(idx) = entries.iter().position(|e| e.key == key) else {
                return false;
            };
            let entry = &mut entries[idx];
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                entries.remove(idx);
                true
            } else {
                false
            }
        };
        if removed {
            self.recompute();
        }
        removed
    }

    /// The `hidden` observable for `key`, if known.
    #[must_use]
    pub fn hidden(&self, key: &str) -> Option<Observable<bool>> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.hidden.clone())
    }

    /// Keys currently shown, in insertion order.
    #[must_use]
    pub fn visible_keys(&self) -> Vec<String> {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|e| !e.hidden.get())
            .map(|e| e.key.clone())
            .collect()
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|e| !e.hidden.get())
            .count()
    }

    /// All known keys, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().iter().map(|e| e.key.clone()).collect()
    }

    #[must_use]
    pub fn max_visible(&self) -> Option<NonZeroUsize> {
        self.inner.max_visible
    }

    fn recompute(&self) {
        let _batch = BatchScope::new();
        let entries = self.inner.entries.borrow();
        let mut eligible = 0usize;
        for entry in entries.iter() {
            let shown = !entry.could_be_hidden && {
                eligible += 1;
                self.inner.max_visible.is_none_or(|max| eligible <= max.get())
            };
            entry.hidden.set(!shown);
        }
        tracing::trace!(keys = entries.len(), eligible, "group visibility recomputed");
    }
}

impl std::fmt::Debug for GroupAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupAggregator")
            .field("max_visible", &self.inner.max_visible)
            .field("keys", &self.keys())
            .field("visible", &self.visible_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn cap(n: usize) -> Option<NonZeroUsize> {
        NonZeroUsize::new(n)
    }

    #[test]
    fn unlimited_shows_every_eligible_key() {
        let agg = GroupAggregator::new(None);
        agg.set_raw("required-touched", false);
        agg.set_raw("min-touched", true);
        agg.set_raw("max-touched", false);
        assert_eq!(agg.visible_keys(), ["required-touched", "max-touched"]);
    }

    #[test]
    fn cap_prefers_earliest_inserted() {
        let agg = GroupAggregator::new(cap(1));
        let first = agg.join("minlength-touched");
        let second = agg.join("maxlength-touched");
        agg.set_raw("maxlength-touched", false);
        assert!(!second.get());

        agg.set_raw("minlength-touched", false);
        assert!(!first.get());
        assert!(second.get());

        agg.set_raw("minlength-touched", true);
        assert!(first.get());
        assert!(!second.get());
    }

    #[test]
    fn hidden_notifies_only_on_flip() {
        let agg = GroupAggregator::new(None);
        let hidden = agg.join("required-touched");
        let flips = Rc::new(Cell::new(0));
        let f = Rc::clone(&flips);
        let _sub = hidden.subscribe(move |_| f.set(f.get() + 1));

        agg.set_raw("required-touched", true);
        agg.set_raw("required-touched", false);
        agg.set_raw("required-touched", false);
        agg.set_raw("required-touched", true);
        assert_eq!(flips.get(), 2);
    }

    #[test]
    fn observers_see_complete_snapshot() {
        let agg = GroupAggregator::new(cap(1));
        let a = agg.join("a-touched");
        let b = agg.join("b-touched");
        agg.set_raw("b-touched", false);

        let seen = Rc::new(Cell::new(usize::MAX));
        let probe = agg.clone();
        let s = Rc::clone(&seen);
        let _sub = b.subscribe(move |_| s.set(probe.visible_count()));

        agg.set_raw("a-touched", false);
        assert!(!a.get());
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn removal_frees_a_slot_without_touching_removed_key() {
        let agg = GroupAggregator::new(cap(1));
        let first = agg.join("a-touched");
        let second = agg.join("b-touched");
        agg.set_raw("a-touched", false);
        agg.set_raw("b-touched", false);
        assert!(second.get());

        let first_events = Rc::new(Cell::new(0));
        let e = Rc::clone(&first_events);
        let _sub = first.subscribe(move |_| e.set(e.get() + 1));

        agg.remove("a-touched");
        assert!(!second.get());
        assert_eq!(first_events.get(), 0);
        assert_eq!(agg.keys(), ["b-touched"]);
    }

    #[test]
    fn shared_keys_are_reference_counted() {
        let agg = GroupAggregator::new(None);
        let one = agg.join("required-touched");
        let two = agg.join("required-touched");
        assert!(one.ptr_eq(&two));

        assert!(!agg.remove("required-touched"));
        assert!(agg.hidden("required-touched").is_some());
        assert!(agg.remove("required-touched"));
        assert!(agg.hidden("required-touched").is_none());
        assert!(!agg.remove("required-touched"));
    }

    proptest! {
        #[test]
        fn cap_is_a_prefix_limit(
            flags in proptest::collection::vec(any::<bool>(), 1..16),
            max in 1usize..5,
        ) {
            let agg = GroupAggregator::new(cap(max));
            for (idx, could_be_hidden) in flags.iter().enumerate() {
                agg.set_raw(&format!("e{idx}-touched"), *could_be_hidden);
            }

            let expected: Vec<String> = flags
                .iter()
                .enumerate()
                .filter(|(_, hidden)| !**hidden)
                .map(|(idx, _)| format!("e{idx}-touched"))
                .take(max)
                .collect();
            prop_assert!(agg.visible_count() <= max);
            prop_assert_eq!(agg.visible_keys(), expected);
        }
    }
}
