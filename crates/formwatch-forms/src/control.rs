#![forbid(unsafe_code)]

//! Form controls: leaf values, keyed groups and indexed arrays.
//!
//! A [`Control`] is a cheap, clonable handle to a shared node. Identity is the
//! node, not the value: two handles are equal iff they point at the same node,
//! and every node carries a process-unique [`ControlId`].
//!
//! Each node owns three event streams:
//!
//! - `value_changes`: emitted after every evented value update;
//! - `status_changes`: emitted after every evented validity update;
//! - `touched_changes`: emitted by every `mark_as_touched` /
//!   `mark_as_untouched` call on that node, after the flag is written.
//!
//! # Validation
//!
//! Sync validators run first. Async validators run only when the sync pass
//! (including children) leaves the control valid; the control is `Pending`
//! until the scheduled verdict lands. Starting a new pass cancels the verdict
//! of the previous one.
//!
//! # Failure Modes
//!
//! - Async validators without a scheduler are ignored.
//! - The validation pass performed at construction runs with events
//!   suppressed, and so does the completion of any async verdict it started:
//!   the control silently flips from `Pending` to its final status. Observers
//!   that care must poll `status()` while it reads `Pending`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use formwatch_runtime::{EventStream, Scheduler, TimerHandle};
use serde_json::Value;

/// Error name to error payload, e.g. `{"min": {"min": 10, "actual": 3}}`.
pub type ValidationErrors = BTreeMap<String, Value>;

/// Shared synchronous validator.
pub type ValidatorFn = Rc<dyn Fn(&Control) -> Option<ValidationErrors>>;

/// Outcome of an asynchronous validator: what it decides and when.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AsyncVerdict {
    /// Delay before the verdict is applied.
    pub delay: Duration,
    /// Errors to apply, `None` for valid.
    pub errors: Option<ValidationErrors>,
}

impl AsyncVerdict {
    /// Valid after `delay`.
    #[must_use]
    pub fn valid_after(delay: Duration) -> Self {
        Self {
            delay,
            errors: None,
        }
    }

    /// Invalid with a single `name: payload` error after `delay`.
    #[must_use]
    pub fn invalid_after(delay: Duration, name: impl Into<String>, payload: Value) -> Self {
        let mut errors = ValidationErrors::new();
        errors.insert(name.into(), payload);
        Self {
            delay,
            errors: Some(errors),
        }
    }
}

/// Shared asynchronous validator.
pub type AsyncValidatorFn = Rc<dyn Fn(&Control) -> AsyncVerdict>;

/// Global counter for unique control IDs.
static CONTROL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(u64);

impl ControlId {
    fn next() -> Self {
        Self(CONTROL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// The three recognized control shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// A single value.
    Leaf,
    /// Named children.
    Group,
    /// Positional children.
    Array,
}

/// Validity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlStatus {
    #[default]
    Valid,
    Invalid,
    /// An async validator has not reported yet.
    Pending,
}

enum Shape {
    Leaf(Value),
    Group(Vec<(String, Control)>),
    Array(Vec<Control>),
}

#[derive(Debug, Default)]
struct ControlState {
    status: ControlStatus,
    errors: Option<ValidationErrors>,
    touched: bool,
    dirty: bool,
}

struct ControlNode {
    id: ControlId,
    shape: RefCell<Shape>,
    state: RefCell<ControlState>,
    validators: RefCell<Vec<ValidatorFn>>,
    async_validators: RefCell<Vec<AsyncValidatorFn>>,
    scheduler: RefCell<Option<Scheduler>>,
    async_run: RefCell<Option<TimerHandle>>,
    parent: RefCell<Weak<ControlNode>>,
    value_changes: EventStream<Value>,
    status_changes: EventStream<ControlStatus>,
    touched_changes: EventStream<bool>,
}

/// Handle to a form control node.
#[derive(Clone)]
pub struct Control {
    node: Rc<ControlNode>,
}

/// Non-owning handle to a form control node.
#[derive(Clone, Default)]
pub struct WeakControl {
    node: Weak<ControlNode>,
}

impl WeakControl {
    /// Recover the control if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Control> {
        self.node.upgrade().map(|node| Control { node })
    }
}

impl std::fmt::Debug for WeakControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakControl")
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Control {}

impl Control {
    // --- Construction ---

    /// Create a leaf control holding `value`.
    pub fn leaf(value: impl Into<Value>) -> Self {
        Self::from_shape(Shape::Leaf(value.into()))
    }

    /// Create a keyed group. Children keep their insertion order.
    pub fn group<K: Into<String>>(children: impl IntoIterator<Item = (K, Control)>) -> Self {
        let children = children
            .into_iter()
            .map(|(name, child)| (name.into(), child))
            .collect();
        Self::from_shape(Shape::Group(children))
    }

    /// Create an indexed array.
    pub fn array(children: impl IntoIterator<Item = Control>) -> Self {
        Self::from_shape(Shape::Array(children.into_iter().collect()))
    }

    fn from_shape(shape: Shape) -> Self {
        let control = Self {
            node: Rc::new(ControlNode {
                id: ControlId::next(),
                shape: RefCell::new(shape),
                state: RefCell::new(ControlState::default()),
                validators: RefCell::new(Vec::new()),
                async_validators: RefCell::new(Vec::new()),
                scheduler: RefCell::new(None),
                async_run: RefCell::new(None),
                parent: RefCell::new(Weak::new()),
                value_changes: EventStream::new(),
                status_changes: EventStream::new(),
                touched_changes: EventStream::new(),
            }),
        };
        for child in control.children() {
            *child.node.parent.borrow_mut() = Rc::downgrade(&control.node);
        }
        control.update_with(false, true);
        control
    }

    /// Add a synchronous validator and revalidate silently.
    #[must_use]
    pub fn with_validator(
        self,
        validator: impl Fn(&Control) -> Option<ValidationErrors> + 'static,
    ) -> Self {
        self.node.validators.borrow_mut().push(Rc::new(validator));
        self.update_with(false, true);
        self
    }

    /// Add an asynchronous validator driven by `scheduler` and revalidate
    /// silently.
    #[must_use]
    pub fn with_async_validator(
        self,
        scheduler: &Scheduler,
        validator: impl Fn(&Control) -> AsyncVerdict + 'static,
    ) -> Self {
        *self.node.scheduler.borrow_mut() = Some(scheduler.clone());
        self.node.async_validators.borrow_mut().push(Rc::new(validator));
        self.update_with(false, true);
        self
    }

    // --- Identity and structure ---

    /// Unique node identifier.
    #[must_use]
    pub fn id(&self) -> ControlId {
        self.node.id
    }

    /// Shape of this control.
    #[must_use]
    pub fn kind(&self) -> ControlKind {
        match &*self.node.shape.borrow() {
            Shape::Leaf(_) => ControlKind::Leaf,
            Shape::Group(_) => ControlKind::Group,
            Shape::Array(_) => ControlKind::Array,
        }
    }

    /// A non-owning handle to this control.
    #[must_use]
    pub fn downgrade(&self) -> WeakControl {
        WeakControl {
            node: Rc::downgrade(&self.node),
        }
    }

    /// Direct children, in order. Empty for leaves.
    #[must_use]
    pub fn children(&self) -> Vec<Control> {
        match &*self.node.shape.borrow() {
            Shape::Leaf(_) => Vec::new(),
            Shape::Group(children) => children.iter().map(|(_, c)| c.clone()).collect(),
            Shape::Array(children) => children.clone(),
        }
    }

    /// Enclosing group or array, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Control> {
        self.node.parent.borrow().upgrade().map(|node| Control { node })
    }

    /// Topmost ancestor, or `self` when detached.
    #[must_use]
    pub fn root(&self) -> Control {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Look up a descendant by dotted path (`"address.street"`, `"items.0"`).
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Control> {
        let mut current = self.clone();
        for segment in path.split('.') {
            current = current.child(segment)?;
        }
        Some(current)
    }

    fn child(&self, segment: &str) -> Option<Control> {
        match &*self.node.shape.borrow() {
            Shape::Leaf(_) => None,
            Shape::Group(children) => children
                .iter()
                .find(|(name, _)| name == segment)
                .map(|(_, c)| c.clone()),
            Shape::Array(children) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| children.get(idx).cloned()),
        }
    }

    // --- State ---

    /// Current value; groups and arrays aggregate their children.
    #[must_use]
    pub fn value(&self) -> Value {
        match &*self.node.shape.borrow() {
            Shape::Leaf(value) => value.clone(),
            Shape::Group(children) => Value::Object(
                children
                    .iter()
                    .map(|(name, c)| (name.clone(), c.value()))
                    .collect(),
            ),
            Shape::Array(children) => Value::Array(children.iter().map(Control::value).collect()),
        }
    }

    /// Current validity status.
    #[must_use]
    pub fn status(&self) -> ControlStatus {
        self.node.state.borrow().status
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.status() == ControlStatus::Valid
    }

    #[must_use]
    pub fn invalid(&self) -> bool {
        self.status() == ControlStatus::Invalid
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.status() == ControlStatus::Pending
    }

    #[must_use]
    pub fn touched(&self) -> bool {
        self.node.state.borrow().touched
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        self.node.state.borrow().dirty
    }

    /// This control's own errors (not its children's).
    #[must_use]
    pub fn errors(&self) -> Option<ValidationErrors> {
        self.node.state.borrow().errors.clone()
    }

    /// Whether this control currently carries the named error.
    #[must_use]
    pub fn has_error(&self, name: &str) -> bool {
        self.node
            .state
            .borrow()
            .errors
            .as_ref()
            .is_some_and(|errors| errors.contains_key(name))
    }

    /// Payload of the named error, if present.
    #[must_use]
    pub fn get_error(&self, name: &str) -> Option<Value> {
        self.node
            .state
            .borrow()
            .errors
            .as_ref()
            .and_then(|errors| errors.get(name).cloned())
    }

    // --- Streams ---

    /// Emits the new value after every evented update.
    #[must_use]
    pub fn value_changes(&self) -> EventStream<Value> {
        self.node.value_changes.clone()
    }

    /// Emits the new status after every evented validity update.
    #[must_use]
    pub fn status_changes(&self) -> EventStream<ControlStatus> {
        self.node.status_changes.clone()
    }

    /// Emits `true`/`false` on every touch mark of this node.
    #[must_use]
    pub fn touched_changes(&self) -> EventStream<bool> {
        self.node.touched_changes.clone()
    }

    // --- Mutation ---

    /// Programmatically replace the value, revalidate and notify.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.write_value(value.into());
        self.update_with(true, false);
    }

    /// Simulate user input: mark dirty, then [`set_value`](Self::set_value).
    pub fn input(&self, value: impl Into<Value>) {
        self.mark_as_dirty();
        self.set_value(value);
    }

    /// Replace the value and return to a pristine, untouched state.
    pub fn reset(&self, value: impl Into<Value>) {
        self.mark_as_pristine();
        self.mark_as_untouched();
        self.set_value(value);
    }

    fn write_value(&self, value: Value) {
        let children = self.children_with_keys();
        if children.is_empty() {
            if let Shape::Leaf(current) = &mut *self.node.shape.borrow_mut() {
                *current = value;
            }
            return;
        }
        for (key, child) in children {
            let next = match &key {
                ChildKey::Name(name) => value.get(name.as_str()),
                ChildKey::Index(idx) => value.get(*idx),
            };
            if let Some(next) = next {
                child.write_value(next.clone());
                child.update_with(true, true);
            }
        }
    }

    fn children_with_keys(&self) -> Vec<(ChildKey, Control)> {
        match &*self.node.shape.borrow() {
            Shape::Leaf(_) => Vec::new(),
            Shape::Group(children) => children
                .iter()
                .map(|(name, c)| (ChildKey::Name(name.clone()), c.clone()))
                .collect(),
            Shape::Array(children) => children
                .iter()
                .enumerate()
                .map(|(idx, c)| (ChildKey::Index(idx), c.clone()))
                .collect(),
        }
    }

    /// Re-run validation, notify, and walk up to the root.
    pub fn update_value_and_validity(&self) {
        self.update_with(true, false);
    }

    fn update_with(&self, emit_event: bool, only_self: bool) {
        self.run_validation(emit_event);
        if emit_event {
            self.node.value_changes.emit(&self.value());
            self.node.status_changes.emit(&self.status());
        }
        if !only_self {
            if let Some(parent) = self.parent() {
                parent.update_with(emit_event, false);
            }
        }
    }

    fn run_validation(&self, emit_event: bool) {
        // Any verdict still in flight belongs to a stale value.
        let stale = self.node.async_run.borrow_mut().take();
        drop(stale);

        let errors = self.run_sync_validators();
        let mut status = self.calculate_status(errors.as_ref());
        if status != ControlStatus::Invalid && self.start_async_validation(emit_event) {
            status = ControlStatus::Pending;
        }
        let mut state = self.node.state.borrow_mut();
        state.errors = errors;
        state.status = status;
    }

    fn run_sync_validators(&self) -> Option<ValidationErrors> {
        let validators = self.node.validators.borrow().clone();
        let mut merged: Option<ValidationErrors> = None;
        for validator in validators {
            if let Some(errors) = validator(self) {
                merged.get_or_insert_with(ValidationErrors::new).extend(errors);
            }
        }
        merged
    }

    fn start_async_validation(&self, emit_event: bool) -> bool {
        let validators = self.node.async_validators.borrow().clone();
        if validators.is_empty() {
            return false;
        }
        let Some(scheduler) = self.node.scheduler.borrow().clone() else {
            return false;
        };

        let mut delay = Duration::ZERO;
        let mut merged: Option<ValidationErrors> = None;
        for validator in validators {
            let verdict = validator(self);
            delay = delay.max(verdict.delay);
            if let Some(errors) = verdict.errors {
                merged.get_or_insert_with(ValidationErrors::new).extend(errors);
            }
        }

        let target = self.downgrade();
        let handle = scheduler.set_timeout(delay, move || {
            if let Some(control) = target.upgrade() {
                control.finish_async_validation(merged, emit_event);
            }
        });
        *self.node.async_run.borrow_mut() = Some(handle);
        true
    }

    fn finish_async_validation(&self, errors: Option<ValidationErrors>, emit_event: bool) {
        let finished = self.node.async_run.borrow_mut().take();
        drop(finished);

        let status = self.calculate_status(errors.as_ref());
        {
            let mut state = self.node.state.borrow_mut();
            state.errors = errors;
            state.status = status;
        }
        if emit_event {
            self.node.status_changes.emit(&status);
        }
        if let Some(parent) = self.parent() {
            parent.refresh_status(emit_event);
        }
    }

    fn refresh_status(&self, emit_event: bool) {
        let errors = self.errors();
        let status = self.calculate_status(errors.as_ref());
        self.node.state.borrow_mut().status = status;
        if emit_event {
            self.node.status_changes.emit(&status);
        }
        if let Some(parent) = self.parent() {
            parent.refresh_status(emit_event);
        }
    }

    fn calculate_status(&self, errors: Option<&ValidationErrors>) -> ControlStatus {
        if errors.is_some() {
            return ControlStatus::Invalid;
        }
        if self.node.async_run.borrow().is_some() {
            return ControlStatus::Pending;
        }
        let children = self.children();
        if children.iter().any(Control::invalid) {
            ControlStatus::Invalid
        } else if children.iter().any(Control::pending) {
            ControlStatus::Pending
        } else {
            ControlStatus::Valid
        }
    }

    /// Mark touched, emit on this node's touched stream, then mark ancestors.
    pub fn mark_as_touched(&self) {
        self.node.state.borrow_mut().touched = true;
        self.node.touched_changes.emit(&true);
        if let Some(parent) = self.parent() {
            parent.mark_as_touched();
        }
    }

    /// Mark this subtree untouched and recompute ancestors.
    pub fn mark_as_untouched(&self) {
        self.mark_subtree_untouched();
        let mut ancestor = self.parent();
        while let Some(parent) = ancestor {
            let touched = parent.children().iter().any(Control::touched);
            parent.node.state.borrow_mut().touched = touched;
            ancestor = parent.parent();
        }
    }

    fn mark_subtree_untouched(&self) {
        self.node.state.borrow_mut().touched = false;
        self.node.touched_changes.emit(&false);
        for child in self.children() {
            child.mark_subtree_untouched();
        }
    }

    /// Mark this control and all descendants touched.
    pub fn mark_all_as_touched(&self) {
        self.node.state.borrow_mut().touched = true;
        self.node.touched_changes.emit(&true);
        for child in self.children() {
            child.mark_all_as_touched();
        }
    }

    /// Mark dirty up to the root. No event is emitted; value updates carry it.
    pub fn mark_as_dirty(&self) {
        self.node.state.borrow_mut().dirty = true;
        if let Some(parent) = self.parent() {
            parent.mark_as_dirty();
        }
    }

    /// Mark this subtree pristine and recompute ancestors.
    pub fn mark_as_pristine(&self) {
        self.mark_subtree_pristine();
        let mut ancestor = self.parent();
        while let Some(parent) = ancestor {
            let dirty = parent.children().iter().any(Control::dirty);
            parent.node.state.borrow_mut().dirty = dirty;
            ancestor = parent.parent();
        }
    }

    fn mark_subtree_pristine(&self) {
        self.node.state.borrow_mut().dirty = false;
        for child in self.children() {
            child.mark_subtree_pristine();
        }
    }
}

enum ChildKey {
    Name(String),
    Index(usize),
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.node.state.borrow();
        f.debug_struct("Control")
            .field("id", &self.node.id)
            .field("kind", &self.kind())
            .field("status", &state.status)
            .field("touched", &state.touched)
            .field("dirty", &state.dirty)
            .finish()
    }
}
