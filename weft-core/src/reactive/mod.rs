//! Reactive core.
//!
//! This module implements the dependency-tracking triad: the reactive
//! store ([`Store`]/[`Field`]) that instruments a data tree, the per-field
//! dependency registry ([`Dep`]), and the per-computation tracking unit
//! ([`Watcher`]), glued together by a thread-local tracking scope
//! ([`TrackingScope`]).
//!
//! # Protocol
//!
//! A watcher evaluates its expression inside a tracking scope. Every field
//! read during that evaluation calls `depend` on its registry, which asks
//! the currently evaluating watcher to record the dependency. The watcher
//! deduplicates by registry id and subscribes where needed, so after any
//! evaluation each registry holds exactly the watchers that read its
//! field. A field write notifies its registry, which re-runs every
//! subscriber synchronously, in subscription order; unchanged results are
//! suppressed before callbacks fire.
//!
//! This is the automatic dependency discovery model used by Vue, SolidJS
//! and Leptos: there is no explicit subscription API anywhere.

mod context;
mod dep;
mod store;
mod watcher;

pub use context::TrackingScope;
pub use dep::Dep;
pub use store::{observe, Field, Store};
pub use watcher::Watcher;
