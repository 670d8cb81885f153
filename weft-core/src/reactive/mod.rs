//! Reactive Primitives
//!
//! This module implements the reactive engine: observable objects, refs,
//! effects, computeds and watchers, all wired through one dependency
//! registry owned by a [`Runtime`].
//!
//! # Concepts
//!
//! ## Observables
//!
//! A [`ReactiveObject`] holds keyed fields and a [`Ref`] holds a single
//! value. When either is read within a tracking context (an effect or a
//! computed), the read location is recorded against that context. When a
//! location is written, everything recorded against it runs again.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation. It runs once when created
//! and again, synchronously, whenever a location it read on its latest run is
//! written.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. A dependency
//! change only marks it dirty; the getter runs again on the next read.
//!
//! ## Watchers
//!
//! [`Runtime::watch`] calls back with the new and old value of a source when
//! it changes. [`Runtime::watch_effect`] is an alias for an effect.
//!
//! # Implementation Notes
//!
//! The currently running computation is found through a thread-local stack
//! (see [`ReactiveContext`]). The registry maps `(target, key)` pairs to the
//! IDs of computations that read them, and is cleared per computation before
//! each run so that dependencies always reflect the latest run only.

mod computed;
mod context;
mod effect;
mod key;
mod object;
mod reference;
mod runtime;
mod subscriber;
mod value;
mod watch;

pub use computed::Computed;
pub use context::ReactiveContext;
pub use effect::Effect;
pub use key::{PropertyKey, TargetId};
pub use object::ReactiveObject;
pub use reference::Ref;
pub use runtime::{Runtime, RuntimeId};
pub use subscriber::{Reactive, SubscriberId};
pub use value::Value;
pub use watch::WatchSource;
