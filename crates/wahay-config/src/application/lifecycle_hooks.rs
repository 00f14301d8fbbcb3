//! Run-once callback queues for post-load and post-save notification.
//!
//! Consumers that need to react to configuration events (for example, to
//! start the anonymity-network daemon only once the custom binary path is
//! known) register a callback.  The store drains the matching queue after
//! each successful load or save.
//!
//! # Drain semantics
//!
//! A drain first swaps the queue for an empty one and only then runs the
//! callbacks it took out, in registration order.  Two things follow:
//!
//! - A callback that registers another callback (or itself) lands in the
//!   fresh, empty queue and runs on the *next* trigger, never in the current
//!   batch.
//! - Callbacks in one batch run sequentially against the same store, so each
//!   one sees the mutations made by those before it.

/// An ordered list of boxed callbacks, consumed whole on each drain.
///
/// `F` is an unsized callback type such as `dyn FnOnce() + Send`.
pub struct LifecycleHookQueue<F: ?Sized> {
    entries: Vec<Box<F>>,
}

impl<F: ?Sized> LifecycleHookQueue<F> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a callback to the end of the queue.
    pub fn push(&mut self, hook: Box<F>) {
        self.entries.push(hook);
    }

    /// Removes and returns every queued callback, leaving the queue empty.
    pub fn take(&mut self) -> Vec<Box<F>> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<F: ?Sized> Default for LifecycleHookQueue<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> std::fmt::Debug for LifecycleHookQueue<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHookQueue")
            .field("len", &self.entries.len())
            .finish()
    }
}
