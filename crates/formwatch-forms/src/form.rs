#![forbid(unsafe_code)]

//! Parent forms and form scopes.
//!
//! A [`ParentForm`] wraps the top-level control and owns the submitted flag
//! and the submit stream. A [`FormScope`] is the lookup context a consumer
//! sits in: the form root or a nested group inside it.

use std::cell::Cell;
use std::rc::Rc;

use formwatch_runtime::EventStream;

use crate::control::{Control, ControlKind};

struct FormInner {
    control: Control,
    submitted: Cell<bool>,
    submits: EventStream<()>,
}

/// A submittable form around a top-level control.
#[derive(Clone)]
pub struct ParentForm {
    inner: Rc<FormInner>,
}

impl ParentForm {
    /// Wrap `control` as a form.
    #[must_use]
    pub fn new(control: Control) -> Self {
        Self {
            inner: Rc::new(FormInner {
                control,
                submitted: Cell::new(false),
                submits: EventStream::new(),
            }),
        }
    }

    /// The top-level control.
    #[must_use]
    pub fn control(&self) -> &Control {
        &self.inner.control
    }

    /// Whether the form has been submitted since the last reset.
    #[must_use]
    pub fn submitted(&self) -> bool {
        self.inner.submitted.get()
    }

    /// Mark submitted, then notify submit listeners.
    pub fn submit(&self) {
        self.inner.submitted.set(true);
        tracing::debug!(form = self.inner.control.id().id(), "form submitted");
        self.inner.submits.emit(&());
    }

    /// Clear the submitted flag. Listeners are not notified.
    pub fn reset_submitted(&self) {
        self.inner.submitted.set(false);
    }

    /// Emits once per [`submit`](Self::submit).
    #[must_use]
    pub fn submits(&self) -> EventStream<()> {
        self.inner.submits.clone()
    }

    /// Whether both handles refer to the same form.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ParentForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentForm")
            .field("control", &self.inner.control.id())
            .field("submitted", &self.inner.submitted.get())
            .finish()
    }
}

/// Where a consumer sits inside a form.
#[derive(Clone, Debug)]
pub struct FormScope {
    form: ParentForm,
    container: Control,
    path: Vec<String>,
}

impl FormScope {
    /// The form's top level.
    #[must_use]
    pub fn root(form: &ParentForm) -> Self {
        Self {
            form: form.clone(),
            container: form.control().clone(),
            path: Vec::new(),
        }
    }

    /// Descend into the nested group or array named `name`.
    ///
    /// Returns `None` when no such child exists or it is a leaf.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<Self> {
        let container = self.container.get(name)?;
        if container.kind() == ControlKind::Leaf {
            return None;
        }
        let mut path = self.path.clone();
        path.push(name.to_owned());
        Some(Self {
            form: self.form.clone(),
            container,
            path,
        })
    }

    /// The enclosing form.
    #[must_use]
    pub fn form(&self) -> &ParentForm {
        &self.form
    }

    /// The group or array names resolve against.
    #[must_use]
    pub fn container(&self) -> &Control {
        &self.container
    }

    /// Path of nested names from the form root.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Resolve a (possibly dotted) name relative to this scope.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Control> {
        self.container.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ParentForm, Control) {
        let street = Control::leaf("");
        let form = ParentForm::new(Control::group([
            ("name", Control::leaf("")),
            ("address", Control::group([("street", street.clone())])),
        ]));
        (form, street)
    }

    #[test]
    fn submit_sets_flag_and_emits() {
        let (form, _) = sample();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = form.submits().subscribe(move |()| c.set(c.get() + 1));

        assert!(!form.submitted());
        form.submit();
        form.submit();
        assert!(form.submitted());
        assert_eq!(count.get(), 2);

        form.reset_submitted();
        assert!(!form.submitted());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn nested_scope_resolves_relative_names() {
        let (form, street) = sample();
        let root = FormScope::root(&form);
        assert!(root.lookup("street").is_none());
        assert_eq!(root.lookup("address.street"), Some(street.clone()));

        let address = root.nested("address").expect("address group");
        assert_eq!(address.lookup("street"), Some(street));
        assert_eq!(address.path(), ["address".to_owned()]);
        assert!(address.form().ptr_eq(&form));
    }

    #[test]
    fn nested_rejects_leaves_and_unknown_names() {
        let (form, _) = sample();
        let root = FormScope::root(&form);
        assert!(root.nested("name").is_none());
        assert!(root.nested("phone").is_none());
    }
}
