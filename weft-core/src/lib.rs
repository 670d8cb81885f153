//! Weft Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! State is wrapped so that reads are recorded as dependencies of the
//! currently running computation, and writes re-run every computation that
//! depends on the written location.
//!
//! It implements:
//!
//! - Observable objects and single-value refs
//! - Effects that re-run when what they read changes
//! - Lazily recomputed, cached computeds
//! - Watchers that call back with new and old values
//!
//! Propagation is synchronous and depth-first: a write returns only after
//! every computation it affects (and everything those affect in turn) has
//! finished. There is no batching and no scheduler.
//!
//! # Architecture
//!
//! - `reactive`: the runtime, its dependency registry and every primitive
//! - `config`: runtime tunables
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use serde_json::json;
//! use weft_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let state = rt.reactive_object(json!({ "count": 0 })).unwrap();
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let (s, l) = (state.clone(), log.clone());
//! rt.effect(move || {
//!     l.lock().unwrap().push(s.get("count")?.as_i64());
//!     Ok(())
//! })
//! .unwrap();
//!
//! state.set("count", 1).unwrap();
//! state.set("count", 1).unwrap(); // same value: no re-run
//! state.set("count", 2).unwrap();
//!
//! assert_eq!(*log.lock().unwrap(), vec![Some(0), Some(1), Some(2)]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
