#![forbid(unsafe_code)]

//! Form model for formwatch.
//!
//! Controls ([`Control`]) arranged in groups and arrays, the [`ParentForm`]
//! that submits them, the [`FormScope`] consumers resolve names against, and
//! the built-in [`validators`].

pub mod control;
pub mod form;
pub mod validators;

pub use control::{
    AsyncValidatorFn, AsyncVerdict, Control, ControlId, ControlKind, ControlStatus,
    ValidationErrors, ValidatorFn, WeakControl,
};
pub use form::{FormScope, ParentForm};
pub use validators::{DependentValidatorOptions, dependent_validator};
