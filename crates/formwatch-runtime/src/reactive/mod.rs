#![forbid(unsafe_code)]

//! Reactive primitives for form state.
//!
//! This module provides the change-tracking building blocks the visibility
//! engine is wired from:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`EventStream`]: A value-less broadcast stream for occurrences such as
//!   form submission or touch marks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Binding`]: A read-only view derived from one or two observables.
//! - [`BindingScope`]: Owns every subscription of one logical owner.
//! - [`BatchScope`]: RAII guard that defers all `Observable` notifications
//!   until the scope exits, so observers never see a half-updated snapshot.
//!
//! # Architecture
//!
//! Everything is single-threaded. Shared state lives in `Rc<..>` with
//! interior mutability; subscribers are stored as `Weak` function pointers
//! and cleaned up lazily during notification.
//!
//! `BatchScope` uses a thread-local context to defer notifications. Nested
//! scopes are supported; only the outermost scope triggers flush.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. Within a `BatchScope`, values are updated immediately but notifications
//!    are deferred until the outermost scope exits.

pub mod batch;
pub mod binding;
pub mod observable;
pub mod stream;

pub use batch::BatchScope;
pub use binding::{Binding, BindingScope, bind_mapped, bind_mapped2};
pub use observable::{Observable, Subscription};
pub use stream::EventStream;
