//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observable is read,
//! the current computation is recorded as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect or evaluating a
//! computed pushes a frame holding that subscriber; the returned guard pops
//! it when dropped. Because the pop lives in `Drop`, it also happens when the
//! computation returns early with an error or panics, so a failing effect
//! never leaves its frame behind to capture reads that belong to someone
//! else.
//!
//! A frame may also be empty: [`ReactiveContext::untracked`] pushes one so
//! reads beneath it are not attributed to the enclosing computation.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use super::subscriber::{Reactive, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// The running computation, or `None` for an untracked frame.
    subscriber: Option<Arc<dyn Reactive>>,
}

impl ContextEntry {
    fn subscriber_id(&self) -> Option<SubscriberId> {
        self.subscriber.as_ref().map(|s| s.subscriber_id())
    }
}

/// Guard that pops the context when dropped.
///
/// The guard is tied to the thread that created it.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    _not_send: PhantomData<*const ()>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is on top of the stack, tracked reads record the
    /// subscriber as a dependent.
    pub fn enter(subscriber: Arc<dyn Reactive>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        Self::push(ContextEntry {
            subscriber: Some(subscriber),
        });
        Self {
            subscriber_id,
            _not_send: PhantomData,
        }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(ContextEntry { subscriber: None });
        Self {
            subscriber_id: None,
            _not_send: PhantomData,
        }
    }

    fn push(entry: ContextEntry) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
    }

    /// Check if a read right now would be tracked.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map_or(false, |entry| entry.subscriber.is_some())
        })
    }

    /// The computation on top of the stack, if any.
    pub fn current() -> Option<Arc<dyn Reactive>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::subscriber_id))
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Release the borrow before the popped subscriber is dropped; its
        // destructor may unregister from the runtime.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber_id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.subscriber_id()
            );
        }
        drop(popped);
    }
}
