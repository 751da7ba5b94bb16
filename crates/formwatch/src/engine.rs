#![forbid(unsafe_code)]

//! The error visibility engine.
//!
//! An [`ErrorBlock`] binds one error name of an [`ErrorsGroup`]'s control to
//! a show policy and keeps a `hidden` flag current as the control and its
//! form change.
//!
//! # Lifecycle
//!
//! ```text
//! Unattached --attach()--> Attached --subscribe--> Active --detach()/drop--> TornDown
//! ```
//!
//! `attach` resolves the policy (block, then group, then global default),
//! subscribes to the control's value, status and touched streams and to the
//! form's submit stream, then evaluates once synchronously so the first
//! visibility is correct before any event arrives.
//!
//! # Invariants
//!
//! 1. The resolved policy never changes while attached.
//! 2. Bursts of events within one scheduler tick produce one evaluation.
//! 3. Evaluations with unchanged inputs emit nothing.
//! 4. After teardown the block publishes nothing, whatever the control does.
//!
//! # Failure Modes
//!
//! - Async validators that complete without announcing a status change leave
//!   the control `Pending` from the engine's point of view. While the control
//!   reads `Pending`, a bounded poll on the scheduler re-checks it and
//!   re-evaluates once it settles. The poll gives up after
//!   [`PendingPoll::max_ticks`](crate::config::PendingPoll) ticks.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use formwatch_forms::{Control, ParentForm};
use formwatch_runtime::{
    BatchScope, Binding, BindingScope, Observable, Scheduler, TimerHandle, bind_mapped,
    bind_mapped2,
};
use serde_json::Value;

use crate::aggregator::GroupAggregator;
use crate::config::PendingPoll;
use crate::error::{FormwatchError, Result};
use crate::group::ErrorsGroup;
use crate::overrides::{OverrideTracker, block_key};
use crate::policy::{PolicySource, SharedPolicy, ShowWhen, resolve_show_when};

/// Where an error block is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingState {
    #[default]
    Unattached,
    /// Policy resolved, not yet subscribed.
    Attached,
    /// Subscribed and publishing.
    Active,
    TornDown,
}

struct BindingCore {
    this: Weak<BindingCore>,
    control: Control,
    parent_form: Option<ParentForm>,
    error_name: String,
    show_when: ShowWhen,
    key: String,
    policy: SharedPolicy,
    aggregator: GroupAggregator,
    scheduler: Scheduler,
    tracker: Option<OverrideTracker>,
    hidden: Observable<bool>,
    details: Observable<Option<Value>>,
    pending_poll: PendingPoll,
    state: Cell<BindingState>,
    dirty: Cell<bool>,
    evaluations: Cell<u64>,
    scope: RefCell<BindingScope>,
    poll: RefCell<Option<TimerHandle>>,
}

impl BindingCore {
    fn activate(&self) {
        let mut scope = self.scope.borrow_mut();

        let weak = self.this.clone();
        scope.listen(&self.control.value_changes(), move |_| {
            if let Some(core) = weak.upgrade() {
                core.schedule();
            }
        });

        let weak = self.this.clone();
        scope.listen(&self.control.status_changes(), move |_| {
            if let Some(core) = weak.upgrade() {
                // The status stream is live again; the poll is redundant.
                core.stop_poll();
                core.schedule();
            }
        });

        let weak = self.this.clone();
        scope.listen(&self.control.touched_changes(), move |_| {
            if let Some(core) = weak.upgrade() {
                core.schedule();
            }
        });

        if let Some(form) = &self.parent_form {
            let weak = self.this.clone();
            scope.listen(&form.submits(), move |()| {
                if let Some(core) = weak.upgrade() {
                    core.schedule();
                }
            });
        }

        if let Some(tracker) = &self.tracker {
            let tracker = tracker.clone();
            let control = self.control.clone();
            let error_name = self.error_name.clone();
            let show_when = self.show_when.clone();
            scope.subscribe(&self.hidden, move |hidden| {
                tracker.error_visibility_changed(&control, &error_name, &show_when, !hidden);
            });
        }

        self.state.set(BindingState::Active);
    }

    /// Mark dirty and queue one evaluation for the end of the tick.
    fn schedule(&self) {
        if self.state.get() != BindingState::Active || self.dirty.replace(true) {
            return;
        }
        let weak = self.this.clone();
        self.scheduler.queue_microtask(move || {
            if let Some(core) = weak.upgrade() {
                core.flush();
            }
        });
    }

    fn flush(&self) {
        if self.dirty.replace(false) && self.state.get() == BindingState::Active {
            self.evaluate();
        }
    }

    fn evaluate(&self) {
        let has_error = self.control.has_error(&self.error_name);
        let has_error_state = self.policy.show(&self.control, self.parent_form.as_ref());
        let could_be_hidden = !(has_error && has_error_state);
        let evaluations = self.evaluations.get() + 1;
        self.evaluations.set(evaluations);
        tracing::trace!(
            key = %self.key,
            has_error,
            has_error_state,
            evaluations,
            "error visibility evaluated"
        );

        {
            let _batch = BatchScope::new();
            self.details.set(self.control.get_error(&self.error_name));
            self.aggregator.set_raw(&self.key, could_be_hidden);
        }

        if self.control.pending() {
            self.start_poll();
        }
    }

    fn start_poll(&self) {
        if self.poll.borrow().is_some() {
            return;
        }
        let PendingPoll {
            interval,
            max_ticks,
        } = self.pending_poll;
        let weak = self.this.clone();
        let mut ticks = 0u32;
        let handle = self.scheduler.set_interval(interval, move || {
            let Some(core) = weak.upgrade() else {
                return;
            };
            ticks += 1;
            if !core.control.pending() {
                tracing::trace!(key = %core.key, ticks, "pending status settled");
                core.stop_poll();
                core.schedule();
            } else if ticks >= max_ticks {
                tracing::debug!(key = %core.key, ticks, "pending poll gave up");
                core.stop_poll();
            }
        });
        *self.poll.borrow_mut() = Some(handle);
    }

    fn stop_poll(&self) {
        let handle = self.poll.borrow_mut().take();
        drop(handle);
    }

    fn teardown(&self) {
        if self.state.replace(BindingState::TornDown) == BindingState::TornDown {
            return;
        }
        self.scope.borrow_mut().clear();
        self.stop_poll();
        self.dirty.set(false);
        // A key still held by a sibling block keeps its visibility.
        let last_holder = self.aggregator.remove(&self.key);
        if let Some(tracker) = self.tracker.as_ref().filter(|_| last_holder) {
            tracker.error_visibility_changed(
                &self.control,
                &self.error_name,
                &self.show_when,
                false,
            );
        }
        tracing::debug!(
            key = %self.key,
            evaluations = self.evaluations.get(),
            "error block torn down"
        );
    }
}

/// One error name displayed for an errors group's control.
///
/// Created with [`ErrorsGroup::error`] or [`ErrorBlock::new`] plus
/// [`in_group`](Self::in_group). Detaches on drop.
pub struct ErrorBlock {
    error_name: String,
    show_when: Option<ShowWhen>,
    group: Option<ErrorsGroup>,
    core: Option<Rc<BindingCore>>,
    state: BindingState,
}

impl ErrorBlock {
    /// An unattached block for `error_name`.
    pub fn new(error_name: impl Into<String>) -> Self {
        Self {
            error_name: error_name.into(),
            show_when: None,
            group: None,
            core: None,
            state: BindingState::Unattached,
        }
    }

    /// Override the show policy for this block only.
    #[must_use]
    pub fn show_when(mut self, show_when: impl Into<ShowWhen>) -> Self {
        self.show_when = Some(show_when.into());
        self
    }

    /// Place the block in `group`.
    #[must_use]
    pub fn in_group(mut self, group: &ErrorsGroup) -> Self {
        self.group = Some(group.clone());
        self
    }

    /// Resolve the policy, subscribe and evaluate once.
    ///
    /// Attaching an active block does nothing. A torn-down block attaches
    /// afresh. On error the block is left torn down.
    pub fn attach(&mut self) -> Result<()> {
        if self.state == BindingState::Active {
            return Ok(());
        }
        match self.build_core() {
            Ok(core) => {
                self.state = BindingState::Attached;
                core.activate();
                core.evaluate();
                self.state = BindingState::Active;
                tracing::debug!(
                    key = %core.key,
                    control = core.control.id().id(),
                    "error block attached"
                );
                self.core = Some(core);
                Ok(())
            }
            Err(err) => {
                self.state = BindingState::TornDown;
                Err(err)
            }
        }
    }

    fn build_core(&self) -> Result<Rc<BindingCore>> {
        let group = self.group.as_ref().ok_or(FormwatchError::MissingParentGroup)?;
        if self.error_name.trim().is_empty() {
            return Err(FormwatchError::InvalidErrorName);
        }

        let root = group.root();
        let resolved = resolve_show_when(
            self.show_when.as_ref(),
            group.show_when(),
            &root.config().show_errors_when_input,
            group.parent_form().is_some(),
        );
        if resolved.source == PolicySource::GlobalFallback {
            tracing::debug!(
                error = %self.error_name,
                "no parent form, formIsSubmitted falls back to touched"
            );
        }
        let policy = root.registry().resolve(&resolved.show_when)?;

        let control = group.control().clone();
        let tracker = resolved.source.is_override().then(|| {
            let tracker = root.tracker().clone();
            tracker.add(&control);
            tracker
        });
        let key = block_key(&self.error_name, &resolved.show_when);
        let hidden = group.aggregator().join(&key);

        Ok(Rc::new_cyclic(|this| BindingCore {
            this: this.clone(),
            control,
            parent_form: group.parent_form().cloned(),
            error_name: self.error_name.clone(),
            show_when: resolved.show_when,
            key,
            policy,
            aggregator: group.aggregator().clone(),
            scheduler: root.scheduler().clone(),
            tracker,
            hidden,
            details: Observable::new(None),
            pending_poll: root.config().pending_poll,
            state: Cell::new(BindingState::Attached),
            dirty: Cell::new(false),
            evaluations: Cell::new(0),
            scope: RefCell::new(BindingScope::new()),
            poll: RefCell::new(None),
        }))
    }

    /// Unsubscribe everything and withdraw from the group. Idempotent.
    pub fn detach(&mut self) {
        if let Some(core) = self.core.take() {
            core.teardown();
        }
        if self.state != BindingState::Unattached {
            self.state = BindingState::TornDown;
        }
    }

    #[must_use]
    pub fn state(&self) -> BindingState {
        self.state
    }

    #[must_use]
    pub fn error_name(&self) -> &str {
        &self.error_name
    }

    /// The policy in force, once attached.
    #[must_use]
    pub fn resolved_show_when(&self) -> Option<&ShowWhen> {
        self.core.as_ref().map(|core| &core.show_when)
    }

    /// Composite key in the group, once attached.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.core.as_ref().map(|core| core.key.as_str())
    }

    /// The capped `hidden` flag, once attached.
    #[must_use]
    pub fn hidden(&self) -> Option<Observable<bool>> {
        self.core.as_ref().map(|core| core.hidden.clone())
    }

    /// Whether the error is displayed right now.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.core.as_ref().is_some_and(|core| !core.hidden.get())
    }

    /// Live visibility view, once attached.
    #[must_use]
    pub fn visibility(&self) -> Option<Binding<bool>> {
        self.core.as_ref().map(|core| bind_mapped(&core.hidden, |hidden| !hidden))
    }

    /// Latest payload of the named error, shown or not.
    #[must_use]
    pub fn details(&self) -> Option<Observable<Option<Value>>> {
        self.core.as_ref().map(|core| core.details.clone())
    }

    /// The payload while the error is displayed, `None` while hidden.
    #[must_use]
    pub fn rich_details(&self) -> Option<Binding<Option<Value>>> {
        self.core.as_ref().map(|core| {
            bind_mapped2(&core.hidden, &core.details, |hidden, details| {
                if *hidden { None } else { details.clone() }
            })
        })
    }

    /// Number of evaluations run by the current attachment.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.core.as_ref().map_or(0, |core| core.evaluations.get())
    }
}

impl Drop for ErrorBlock {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ErrorBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBlock")
            .field("error_name", &self.error_name)
            .field("show_when", &self.show_when)
            .field("state", &self.state)
            .field("key", &self.key())
            .field("visible", &self.is_visible())
            .finish()
    }
}
