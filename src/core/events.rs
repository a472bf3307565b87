//! Observer plumbing shared by the rate limiter and the PRD lock.

use std::fmt;
use std::sync::Arc;

/// Callback invoked synchronously for every emitted event.
///
/// Observers run on the emitting task and must not block.
pub type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Optional observer slot. Emitting into an empty slot is a no-op.
pub struct ObserverSlot<E> {
    observer: Option<Observer<E>>,
}

impl<E> ObserverSlot<E> {
    #[must_use]
    pub const fn empty() -> Self {
        Self { observer: None }
    }

    #[must_use]
    pub fn new(observer: Observer<E>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    pub fn emit(&self, event: &E) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.observer.is_some()
    }
}

impl<E> Default for ObserverSlot<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E> Clone for ObserverSlot<E> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
        }
    }
}

impl<E> fmt::Debug for ObserverSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("set", &self.is_set())
            .finish()
    }
}
