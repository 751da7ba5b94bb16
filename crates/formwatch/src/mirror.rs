#![forbid(unsafe_code)]

//! Keeps an input widget's own error styling in step with overridden blocks.
//!
//! Widgets usually decide on their own when to look erroneous (red outline,
//! `aria-invalid`). When an error block overrides its show policy, that
//! decision must follow the block rather than the widget's default. A
//! [`WidgetErrorStateMirror`] listens to the [`OverrideTracker`] and, for
//! its control only, installs a predicate that reports an error state while
//! any overridden block for the control is visible.

use std::rc::{Rc, Weak};

use formwatch_forms::{Control, ControlId};
use formwatch_runtime::Subscription;

use crate::overrides::OverrideTracker;
use crate::policy::{SharedPolicy, policy_fn};

/// Predicate a widget consults to decide whether to render as erroneous.
pub type ErrorStateMatcher = SharedPolicy;

/// Implemented by widgets that accept an external error-state predicate.
pub trait ErrorStateHook {
    /// Replace the widget's error-state predicate.
    fn set_error_state_matcher(&self, matcher: ErrorStateMatcher);
}

/// Installs override-driven predicates into one widget.
///
/// Holds the widget weakly; dropping the mirror stops further installs.
pub struct WidgetErrorStateMirror {
    control: ControlId,
    _subscription: Subscription,
}

impl WidgetErrorStateMirror {
    /// Mirror override state for `control` into `widget`.
    pub fn attach<W>(widget: &Rc<W>, control: &Control, tracker: &OverrideTracker) -> Self
    where
        W: ErrorStateHook + 'static,
    {
        let target = control.id();
        let widget: Weak<W> = Rc::downgrade(widget);
        let records = tracker.clone();
        let subscription = tracker.subscribe(move |overridden| {
            if overridden.id() != target {
                return;
            }
            let Some(widget) = widget.upgrade() else {
                return;
            };
            let shown = records.get(overridden).is_some_and(|keys| !keys.is_empty());
            tracing::trace!(control = target.id(), shown, "widget error state mirrored");
            widget.set_error_state_matcher(policy_fn(move |_, _| shown));
        });
        Self {
            control: target,
            _subscription: subscription,
        }
    }

    /// The mirrored control.
    #[must_use]
    pub fn control(&self) -> ControlId {
        self.control
    }
}

impl std::fmt::Debug for WidgetErrorStateMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetErrorStateMirror")
            .field("control", &self.control)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ShowWhen;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeInput {
        matcher: RefCell<Option<ErrorStateMatcher>>,
        installs: Cell<u32>,
    }

    impl ErrorStateHook for FakeInput {
        fn set_error_state_matcher(&self, matcher: ErrorStateMatcher) {
            *self.matcher.borrow_mut() = Some(matcher);
            self.installs.set(self.installs.get() + 1);
        }
    }

    impl FakeInput {
        fn error_state(&self, control: &Control) -> Option<bool> {
            self.matcher.borrow().as_ref().map(|m| m.show(control, None))
        }
    }

    #[test]
    fn installs_predicate_for_own_control_only() {
        let tracker = OverrideTracker::new();
        let mine = Control::leaf("");
        let other = Control::leaf("");
        let input = Rc::new(FakeInput::default());
        let _mirror = WidgetErrorStateMirror::attach(&input, &mine, &tracker);

        tracker.add(&other);
        assert_eq!(input.installs.get(), 0);

        tracker.add(&mine);
        assert_eq!(input.error_state(&mine), Some(false));

        tracker.error_visibility_changed(&mine, "required", &ShowWhen::DIRTY, true);
        assert_eq!(input.error_state(&mine), Some(true));

        tracker.error_visibility_changed(&mine, "required", &ShowWhen::DIRTY, false);
        assert_eq!(input.error_state(&mine), Some(false));
        assert_eq!(input.installs.get(), 3);
    }

    #[test]
    fn dropping_the_mirror_stops_installs() {
        let tracker = OverrideTracker::new();
        let control = Control::leaf("");
        let input = Rc::new(FakeInput::default());
        let mirror = WidgetErrorStateMirror::attach(&input, &control, &tracker);
        drop(mirror);

        tracker.add(&control);
        assert_eq!(input.installs.get(), 0);
    }
}
