#![forbid(unsafe_code)]

//! Single-threaded reactive runtime for formwatch.
//!
//! Provides the [`reactive`] primitives (observables, event streams,
//! subscription scopes, batching) and the cooperative [`Scheduler`] that
//! every formwatch component shares for microtask coalescing and timers.

pub mod reactive;
pub mod scheduler;

pub use reactive::{
    BatchScope, Binding, BindingScope, EventStream, Observable, Subscription, bind_mapped,
    bind_mapped2,
};
pub use scheduler::{Scheduler, TimerHandle};
