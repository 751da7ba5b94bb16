#![forbid(unsafe_code)]

//! Show policies: when an existing error may be displayed.
//!
//! A show policy answers "is this control currently in an error-displaying
//! state", independently of which error is being asked about. Policies are
//! looked up by name in a [`PolicyRegistry`] once, when an error block
//! attaches.
//!
//! # Built-ins
//!
//! | Name | Shows when the control is invalid and ... |
//! |------|--------------------------------------------|
//! | `touched` | touched, or the parent form is submitted |
//! | `dirty` | dirty, or the parent form is submitted |
//! | `touchedAndDirty` | touched and dirty, or the parent form is submitted |
//! | `formIsSubmitted` | the parent form is submitted |

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use formwatch_forms::{Control, ParentForm};

use crate::error::{FormwatchError, Result};

/// A named display predicate.
pub trait ShowPolicy {
    /// Whether `control` is in an error-displaying state.
    fn show(&self, control: &Control, form: Option<&ParentForm>) -> bool;
}

impl<F> ShowPolicy for F
where
    F: Fn(&Control, Option<&ParentForm>) -> bool,
{
    fn show(&self, control: &Control, form: Option<&ParentForm>) -> bool {
        self(control, form)
    }
}

/// Shared, type-erased show policy.
pub type SharedPolicy = Rc<dyn ShowPolicy>;

/// Wrap a closure as a [`SharedPolicy`].
pub fn policy_fn<F>(f: F) -> SharedPolicy
where
    F: Fn(&Control, Option<&ParentForm>) -> bool + 'static,
{
    Rc::new(f)
}

/// Name of a show policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ShowWhen(Cow<'static, str>);

impl ShowWhen {
    pub const TOUCHED: Self = Self(Cow::Borrowed("touched"));
    pub const DIRTY: Self = Self(Cow::Borrowed("dirty"));
    pub const TOUCHED_AND_DIRTY: Self = Self(Cow::Borrowed("touchedAndDirty"));
    pub const FORM_IS_SUBMITTED: Self = Self(Cow::Borrowed("formIsSubmitted"));

    /// A policy name, built-in or custom.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShowWhen {
    fn default() -> Self {
        Self::TOUCHED
    }
}

impl fmt::Display for ShowWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShowWhen {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ShowWhen {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&ShowWhen> for ShowWhen {
    fn from(name: &ShowWhen) -> Self {
        name.clone()
    }
}

fn submitted(form: Option<&ParentForm>) -> bool {
    form.is_some_and(ParentForm::submitted)
}

fn touched(control: &Control, form: Option<&ParentForm>) -> bool {
    control.invalid() && (control.touched() || submitted(form))
}

fn dirty(control: &Control, form: Option<&ParentForm>) -> bool {
    control.invalid() && (control.dirty() || submitted(form))
}

fn touched_and_dirty(control: &Control, form: Option<&ParentForm>) -> bool {
    control.invalid() && ((control.dirty() && control.touched()) || submitted(form))
}

fn form_is_submitted(control: &Control, form: Option<&ParentForm>) -> bool {
    control.invalid() && submitted(form)
}

/// Name-to-evaluator table.
///
/// Names are kept sorted so error messages and [`valid_names`](Self::valid_names)
/// are deterministic.
#[derive(Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<ShowWhen, SharedPolicy>,
}

impl PolicyRegistry {
    /// A registry holding the four built-in policies.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ShowWhen::TOUCHED, touched);
        registry.register(ShowWhen::DIRTY, dirty);
        registry.register(ShowWhen::TOUCHED_AND_DIRTY, touched_and_dirty);
        registry.register(ShowWhen::FORM_IS_SUBMITTED, form_is_submitted);
        registry
    }

    /// A registry with no policies at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    /// Built-ins with `custom` merged on top. Custom entries win on collision.
    pub fn with_custom(custom: impl IntoIterator<Item = (ShowWhen, SharedPolicy)>) -> Self {
        let mut registry = Self::new();
        for (name, policy) in custom {
            registry.register_shared(name, policy);
        }
        registry
    }

    /// Register `policy` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<ShowWhen>, policy: impl ShowPolicy + 'static) {
        self.register_shared(name.into(), Rc::new(policy));
    }

    fn register_shared(&mut self, name: ShowWhen, policy: SharedPolicy) {
        if self.policies.insert(name.clone(), policy).is_some() {
            tracing::debug!(policy = %name, "show policy replaced");
        }
    }

    /// Look up the evaluator for `name`.
    pub fn resolve(&self, name: &ShowWhen) -> Result<SharedPolicy> {
        self.policies
            .get(name)
            .cloned()
            .ok_or_else(|| FormwatchError::UnknownShowPolicy {
                name: name.to_string(),
                valid: self.valid_names(),
            })
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn valid_names(&self) -> Vec<String> {
        self.policies.keys().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &ShowWhen) -> bool {
        self.policies.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("names", &self.valid_names())
            .finish()
    }
}

/// Which level a resolved policy name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicySource {
    /// Declared on the error block itself.
    Error,
    /// Declared on the enclosing errors group.
    Group,
    /// The configured global default.
    Global,
    /// The global default was `formIsSubmitted` without a parent form.
    GlobalFallback,
}

impl PolicySource {
    /// Whether the name was declared locally rather than inherited.
    #[must_use]
    pub const fn is_override(self) -> bool {
        matches!(self, Self::Error | Self::Group)
    }
}

/// A policy name together with the level it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShowWhen {
    pub show_when: ShowWhen,
    pub source: PolicySource,
}

/// Pick the policy for an error block: block, then group, then global.
///
/// A global `formIsSubmitted` default with no parent form could never show
/// anything, so it degrades to `touched`. Explicit local choices are taken
/// as written.
#[must_use]
pub fn resolve_show_when(
    block: Option<&ShowWhen>,
    group: Option<&ShowWhen>,
    global: &ShowWhen,
    has_parent_form: bool,
) -> ResolvedShowWhen {
    if let Some(show_when) = block {
        return ResolvedShowWhen {
            show_when: show_when.clone(),
            source: PolicySource::Error,
        };
    }
    if let Some(show_when) = group {
        return ResolvedShowWhen {
            show_when: show_when.clone(),
            source: PolicySource::Group,
        };
    }
    if *global == ShowWhen::FORM_IS_SUBMITTED && !has_parent_form {
        return ResolvedShowWhen {
            show_when: ShowWhen::TOUCHED,
            source: PolicySource::GlobalFallback,
        };
    }
    ResolvedShowWhen {
        show_when: global.clone(),
        source: PolicySource::Global,
    }
}
