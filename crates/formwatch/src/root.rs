#![forbid(unsafe_code)]

//! The composition root.
//!
//! A [`Formwatch`] owns everything error groups share for one composition
//! lifetime: configuration, the policy registry, the override tracker and
//! the scheduler. Handles are cheap to clone and share the same state.
//!
//! ```ignore
//! let root = Formwatch::builder()
//!     .config(ErrorsConfig::new().show_when(ShowWhen::DIRTY).max_errors(1))
//!     .custom_policy("always", always_when_invalid)
//!     .build()?;
//! ```

use std::rc::Rc;

use formwatch_forms::Control;
use formwatch_runtime::Scheduler;

use crate::config::ErrorsConfig;
use crate::error::Result;
use crate::group::ErrorsGroupBuilder;
use crate::mirror::ErrorStateMatcher;
use crate::overrides::OverrideTracker;
use crate::policy::{PolicyRegistry, SharedPolicy, ShowPolicy, ShowWhen};
use crate::resolver::ControlDeclaration;

struct RootInner {
    config: ErrorsConfig,
    registry: PolicyRegistry,
    tracker: OverrideTracker,
    scheduler: Scheduler,
    default_policy: SharedPolicy,
}

/// Shared state for every errors group of one composition.
#[derive(Clone)]
pub struct Formwatch {
    inner: Rc<RootInner>,
}

impl Formwatch {
    #[must_use]
    pub fn builder() -> FormwatchBuilder {
        FormwatchBuilder::default()
    }

    /// Start an errors group for `control` under this root.
    pub fn group(&self, control: impl Into<ControlDeclaration>) -> ErrorsGroupBuilder {
        ErrorsGroupBuilder::new(self).control(control)
    }

    #[must_use]
    pub fn config(&self) -> &ErrorsConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn tracker(&self) -> &OverrideTracker {
        &self.inner.tracker
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Error-state predicate for widgets outside any override: the
    /// configured global policy.
    #[must_use]
    pub fn default_error_state_matcher(&self) -> ErrorStateMatcher {
        Rc::clone(&self.inner.default_policy)
    }

    /// Forget the override record of a control that is going away.
    pub fn release_control(&self, control: &Control) -> bool {
        self.inner.tracker.remove(control)
    }

    /// Whether both handles share the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Formwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formwatch")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("tracker", &self.inner.tracker)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Formwatch`].
#[derive(Default)]
pub struct FormwatchBuilder {
    config: ErrorsConfig,
    custom: Vec<(ShowWhen, SharedPolicy)>,
    scheduler: Option<Scheduler>,
}

impl FormwatchBuilder {
    #[must_use]
    pub fn config(mut self, config: ErrorsConfig) -> Self {
        self.config = config;
        self
    }

    /// Add or replace a show policy. Later registrations win.
    #[must_use]
    pub fn custom_policy(
        mut self,
        name: impl Into<ShowWhen>,
        policy: impl ShowPolicy + 'static,
    ) -> Self {
        self.custom.push((name.into(), Rc::new(policy)));
        self
    }

    /// Share an existing scheduler instead of creating one.
    #[must_use]
    pub fn scheduler(mut self, scheduler: &Scheduler) -> Self {
        self.scheduler = Some(scheduler.clone());
        self
    }

    /// Build the root, checking the global default policy exists.
    pub fn build(self) -> Result<Formwatch> {
        let registry = PolicyRegistry::with_custom(self.custom);
        let default_policy = registry.resolve(&self.config.show_errors_when_input)?;
        tracing::debug!(
            show_when = %self.config.show_errors_when_input,
            max_errors = ?self.config.show_max_errors,
            policies = registry.len(),
            "formwatch root built"
        );
        Ok(Formwatch {
            inner: Rc::new(RootInner {
                config: self.config,
                registry,
                tracker: OverrideTracker::new(),
                scheduler: self.scheduler.unwrap_or_default(),
                default_policy,
            }),
        })
    }
}

impl std::fmt::Debug for FormwatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormwatchBuilder")
            .field("config", &self.config)
            .field("custom", &self.custom.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
