#![forbid(unsafe_code)]

//! Decides when form validation errors are shown.
//!
//! Each [`ErrorBlock`] watches one error name on the control of its
//! [`ErrorsGroup`] and publishes whether that error should be displayed,
//! according to a named show policy (`touched`, `dirty`, `touchedAndDirty`,
//! `formIsSubmitted`, or a custom one). Policies can be set per block, per
//! group, or globally through [`ErrorsConfig`]. Groups can cap how many of
//! their errors show at once.
//!
//! ```ignore
//! let root = Formwatch::builder().build()?;
//! let email = Control::leaf("").with_validator(validators::required());
//! let group = root.group(&email).attach()?;
//! let mut required = group.error("required");
//! required.attach()?;
//!
//! email.mark_as_touched();
//! root.scheduler().run_microtasks();
//! assert!(required.is_visible());
//! ```
//!
//! The form model lives in [`forms`] and the reactive runtime in [`runtime`];
//! both are re-exported.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod mirror;
pub mod overrides;
pub mod policy;
pub mod resolver;
pub mod root;

pub use formwatch_forms as forms;
pub use formwatch_runtime as runtime;

pub use aggregator::GroupAggregator;
pub use config::{ErrorsConfig, PendingPoll};
pub use engine::{BindingState, ErrorBlock};
pub use error::{FormwatchError, Result};
pub use group::{ErrorsGroup, ErrorsGroupBuilder};
pub use mirror::{ErrorStateHook, ErrorStateMatcher, WidgetErrorStateMirror};
pub use overrides::OverrideTracker;
pub use policy::{
    PolicyRegistry, PolicySource, ResolvedShowWhen, SharedPolicy, ShowPolicy, ShowWhen,
    policy_fn, resolve_show_when,
};
pub use resolver::ControlDeclaration;
pub use root::{Formwatch, FormwatchBuilder};

/// Everything needed to wire error blocks to a form.
pub mod prelude {
    pub use crate::forms::{Control, FormScope, ParentForm, validators};
    pub use crate::runtime::Scheduler;
    pub use crate::{
        ControlDeclaration, ErrorBlock, ErrorsConfig, ErrorsGroup, Formwatch, FormwatchError,
        ShowWhen,
    };
}
