#![forbid(unsafe_code)]

//! Resolves an errors group's control declaration to a concrete control.

use std::any::{Any, type_name};
use std::fmt;

use formwatch_forms::{Control, FormScope};

use crate::error::{FormwatchError, Result};

/// How an errors group names its control.
#[derive(Default)]
pub enum ControlDeclaration {
    /// Nothing was declared.
    #[default]
    Missing,
    /// A (possibly dotted) name, looked up in the enclosing form scope.
    Name(String),
    /// A direct reference of arbitrary type; must be a [`Control`].
    Instance {
        value: Box<dyn Any>,
        type_name: &'static str,
    },
}

impl ControlDeclaration {
    /// Declare by direct reference. Any type is accepted here and checked on
    /// resolution.
    pub fn instance<T: Any>(value: T) -> Self {
        Self::Instance {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Declare by name.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl From<Control> for ControlDeclaration {
    fn from(control: Control) -> Self {
        Self::instance(control)
    }
}

impl From<&Control> for ControlDeclaration {
    fn from(control: &Control) -> Self {
        Self::instance(control.clone())
    }
}

impl From<&str> for ControlDeclaration {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ControlDeclaration {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Debug for ControlDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("Missing"),
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Instance { type_name, .. } => {
                f.debug_struct("Instance").field("type_name", type_name).finish()
            }
        }
    }
}

/// Resolve `declaration` against the scope it was declared in.
///
/// Names resolve relative to the scope's container: the nested group when the
/// scope is nested, else the form's top-level group.
pub fn resolve(declaration: &ControlDeclaration, scope: Option<&FormScope>) -> Result<Control> {
    match declaration {
        ControlDeclaration::Missing => Err(FormwatchError::MissingControl),
        ControlDeclaration::Name(name) if name.trim().is_empty() => {
            Err(FormwatchError::MissingControl)
        }
        ControlDeclaration::Name(name) => {
            let scope = scope.ok_or_else(|| FormwatchError::MissingAncestorForm {
                name: name.clone(),
            })?;
            let control = scope
                .lookup(name)
                .ok_or_else(|| FormwatchError::ControlNotFound { name: name.clone() })?;
            tracing::debug!(
                name = %name,
                path = ?scope.path(),
                control = control.id().id(),
                "control resolved by name"
            );
            Ok(control)
        }
        ControlDeclaration::Instance { value, type_name } => value
            .downcast_ref::<Control>()
            .cloned()
            .ok_or_else(|| FormwatchError::InvalidControlType {
                found: (*type_name).to_owned(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwatch_forms::ParentForm;

    #[test]
    fn missing_and_blank_declarations_fail() {
        assert_eq!(
            resolve(&ControlDeclaration::Missing, None),
            Err(FormwatchError::MissingControl)
        );
        assert_eq!(
            resolve(&ControlDeclaration::name("   "), None),
            Err(FormwatchError::MissingControl)
        );
    }

    #[test]
    fn instances_must_be_controls() {
        for control in [
            Control::leaf(1),
            Control::group([("a", Control::leaf(1))]),
            Control::array([Control::leaf(1)]),
        ] {
            let resolved = resolve(&ControlDeclaration::from(&control), None);
            assert_eq!(resolved, Ok(control));
        }

        let err = resolve(&ControlDeclaration::instance(42_u8), None);
        assert_eq!(err, Err(FormwatchError::InvalidControlType { found: "u8".into() }));
    }

    #[test]
    fn names_need_an_ancestor_form() {
        assert_eq!(
            resolve(&"email".into(), None),
            Err(FormwatchError::MissingAncestorForm { name: "email".into() })
        );
    }

    #[test]
    fn names_resolve_in_nearest_group() {
        let street = Control::leaf("");
        let top_street = Control::leaf("");
        let form = ParentForm::new(Control::group([
            ("street", top_street.clone()),
            ("address", Control::group([("street", street.clone())])),
        ]));
        let root = FormScope::root(&form);
        let nested = root.nested("address").expect("address group");

        assert_eq!(resolve(&"street".into(), Some(&root)), Ok(top_street));
        assert_eq!(resolve(&"street".into(), Some(&nested)), Ok(street.clone()));
        assert_eq!(resolve(&"address.street".into(), Some(&root)), Ok(street));
        assert_eq!(
            resolve(&"zip".into(), Some(&nested)),
            Err(FormwatchError::ControlNotFound { name: "zip".into() })
        );
    }
}
