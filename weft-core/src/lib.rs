//! Weft Core
//!
//! Fine-grained reactive dependency tracking: given an observed data tree
//! and a set of computations over it, the engine re-evaluates exactly the
//! computations that read a changed field, and nothing else. Dependencies
//! are discovered automatically, by watching the reads a computation
//! performs while it evaluates; there is no subscription API to call.
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - [`reactive`]: the core triad (reactive store, dependency registries,
//!   watchers) and the thread-local tracking scope that glues them.
//! - [`vm`]: the view-model facade: data proxy, computed properties and
//!   the explicit watch API.
//! - [`error`]: the typed rejection for malformed watch expressions.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use weft_core::ViewModel;
//!
//! let vm = ViewModel::new(json!({"user": {"name": "A"}}));
//!
//! let _watcher = vm.watch("user.name", |new, old| {
//!     println!("{old:?} -> {new:?}");
//! })?;
//!
//! vm.store().child("user").unwrap().set("name", json!("B"));
//! // prints: Some(String("A")) -> Some(String("B"))
//! ```

pub mod error;
pub mod reactive;
pub mod vm;

pub use error::ExpressionError;
pub use reactive::{observe, Dep, Field, Store, TrackingScope, Watcher};
pub use serde_json::Value;
pub use vm::ViewModel;
