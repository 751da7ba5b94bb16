#![forbid(unsafe_code)]

//! Errors groups: the container that scopes one control's error blocks.
//!
//! A group resolves its control once, when it attaches, and owns the
//! [`GroupAggregator`] its blocks publish into. Blocks are created with
//! [`ErrorsGroup::error`].

use std::rc::Rc;

use formwatch_forms::{Control, FormScope, ParentForm};

use crate::aggregator::GroupAggregator;
use crate::engine::ErrorBlock;
use crate::error::Result;
use crate::policy::ShowWhen;
use crate::resolver::{self, ControlDeclaration};
use crate::root::Formwatch;

struct GroupInner {
    root: Formwatch,
    control: Control,
    parent_form: Option<ParentForm>,
    show_when: Option<ShowWhen>,
    aggregator: GroupAggregator,
}

/// An attached errors group.
#[derive(Clone)]
pub struct ErrorsGroup {
    inner: Rc<GroupInner>,
}

impl ErrorsGroup {
    #[must_use]
    pub fn builder(root: &Formwatch) -> ErrorsGroupBuilder {
        ErrorsGroupBuilder::new(root)
    }

    /// A new, unattached block for `error_name` in this group.
    pub fn error(&self, error_name: impl Into<String>) -> ErrorBlock {
        ErrorBlock::new(error_name).in_group(self)
    }

    #[must_use]
    pub fn control(&self) -> &Control {
        &self.inner.control
    }

    #[must_use]
    pub fn parent_form(&self) -> Option<&ParentForm> {
        self.inner.parent_form.as_ref()
    }

    /// Group-level policy override, if any.
    #[must_use]
    pub fn show_when(&self) -> Option<&ShowWhen> {
        self.inner.show_when.as_ref()
    }

    #[must_use]
    pub fn aggregator(&self) -> &GroupAggregator {
        &self.inner.aggregator
    }

    #[must_use]
    pub fn root(&self) -> &Formwatch {
        &self.inner.root
    }

    /// Keys of the blocks currently shown, in attachment order.
    #[must_use]
    pub fn visible_errors(&self) -> Vec<String> {
        self.inner.aggregator.visible_keys()
    }
}

impl std::fmt::Debug for ErrorsGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorsGroup")
            .field("control", &self.inner.control.id())
            .field("show_when", &self.inner.show_when)
            .field("has_parent_form", &self.inner.parent_form.is_some())
            .field("aggregator", &self.inner.aggregator)
            .finish()
    }
}

/// Builder for [`ErrorsGroup`].
#[derive(Debug)]
pub struct ErrorsGroupBuilder {
    root: Formwatch,
    declaration: ControlDeclaration,
    scope: Option<FormScope>,
    show_when: Option<ShowWhen>,
}

impl ErrorsGroupBuilder {
    #[must_use]
    pub fn new(root: &Formwatch) -> Self {
        Self {
            root: root.clone(),
            declaration: ControlDeclaration::Missing,
            scope: None,
            show_when: None,
        }
    }

    /// The control to watch: a [`Control`] or a name within the scope.
    #[must_use]
    pub fn control(mut self, declaration: impl Into<ControlDeclaration>) -> Self {
        self.declaration = declaration.into();
        self
    }

    /// The form context the group sits in.
    #[must_use]
    pub fn scope(mut self, scope: &FormScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Policy for every block of the group that does not name its own.
    #[must_use]
    pub fn show_when(mut self, show_when: impl Into<ShowWhen>) -> Self {
        self.show_when = Some(show_when.into());
        self
    }

    /// Resolve the control and create the group.
    pub fn attach(self) -> Result<ErrorsGroup> {
        let control = resolver::resolve(&self.declaration, self.scope.as_ref())?;
        let parent_form = self.scope.as_ref().map(|scope| scope.form().clone());
        let aggregator = GroupAggregator::new(self.root.config().show_max_errors);
        tracing::debug!(
            control = control.id().id(),
            show_when = ?self.show_when,
            has_parent_form = parent_form.is_some(),
            "errors group attached"
        );
        Ok(ErrorsGroup {
            inner: Rc::new(GroupInner {
                root: self.root,
                control,
                parent_form,
                show_when: self.show_when,
                aggregator,
            }),
        })
    }
}
