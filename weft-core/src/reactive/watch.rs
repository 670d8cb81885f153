//! Watchers
//!
//! [`Runtime::watch`] runs a callback with the new and the previous value
//! whenever a source changes. The source is evaluated once, untracked, to
//! seed the previous value; after that an effect re-evaluates it (tracked)
//! on every dependency change and calls the callback only when the result
//! differs by `PartialEq`.
//!
//! [`Runtime::watch_effect`] is a plain effect and fires on every dependency
//! change whether or not anything it computes differs.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

use super::effect::Effect;
use super::runtime::Runtime;

type SourceFn<T> = dyn Fn() -> Result<T> + Send + Sync;

/// What a watcher observes.
pub enum WatchSource<T> {
    /// A fixed value. Nothing is tracked, so the callback never fires.
    Value(T),
    /// A function whose reads are tracked.
    Getter(Box<SourceFn<T>>),
}

impl<T> WatchSource<T> {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        WatchSource::Getter(Box::new(f))
    }

    fn evaluate(&self) -> Result<T>
    where
        T: Clone,
    {
        match self {
            WatchSource::Value(value) => Ok(value.clone()),
            WatchSource::Getter(f) => f(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WatchSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            WatchSource::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

pub(crate) fn watch<T, C>(rt: &Runtime, source: WatchSource<T>, callback: C) -> Result<Effect>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    C: Fn(&T, &T) -> Result<()> + Send + Sync + 'static,
{
    let initial = rt.untrack(|| source.evaluate())?;
    let previous = Arc::new(Mutex::new(initial));

    rt.effect(move || {
        let next = source.evaluate()?;

        // Never hold the lock across the callback: it may write to a
        // dependency and re-enter this effect.
        let old = {
            let previous = previous.lock();
            if *previous == next {
                return Ok(());
            }
            previous.clone()
        };

        callback(&next, &old)?;
        *previous.lock() = next;
        Ok(())
    })
}
