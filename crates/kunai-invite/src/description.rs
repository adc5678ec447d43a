//! Invite description text, materialized lazily.
//!
//! Long descriptions live in an external blob store. The first reader loads
//! them through a [`DescriptionSource`]; later readers get the memoized copy.

use std::sync::{Mutex, PoisonError};

use crate::error::InviteResult;
use crate::invite::ItemRef;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Description {
    pub plain: Option<String>,
    pub html: Option<String>,
}

impl Description {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            html: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.as_deref().is_none_or(str::is_empty) && self.html.as_deref().is_none_or(str::is_empty)
    }

    /// Combined byte length of both forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plain.as_ref().map_or(0, String::len) + self.html.as_ref().map_or(0, String::len)
    }
}

/// Loads descriptions that were not persisted with the invite.
pub trait DescriptionSource {
    /// ## Errors
    /// Returns an error if the backing store cannot be read.
    fn load_description(&self, item: &ItemRef) -> InviteResult<Option<Description>>;
}

/// Memoized description of one invite.
///
/// `None` inside the mutex means "not loaded yet".
#[derive(Debug, Default)]
pub struct DescriptionSlot {
    state: Mutex<Option<Description>>,
}

impl DescriptionSlot {
    /// A slot already holding `description`.
    #[must_use]
    pub fn loaded(description: Description) -> Self {
        Self {
            state: Mutex::new(Some(description)),
        }
    }

    /// A slot that loads on first access.
    #[must_use]
    pub fn unloaded() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Description>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// The description if it is already in memory.
    #[must_use]
    pub fn peek(&self) -> Option<Description> {
        self.lock().clone()
    }

    pub fn set(&self, description: Description) {
        *self.lock() = Some(description);
    }

    /// ## Summary
    /// Returns the description, loading it once from `source`.
    ///
    /// The lock is held across the load, so concurrent readers wait for the
    /// first load instead of repeating it.
    ///
    /// ## Errors
    /// Propagates errors from `source`; the slot stays unloaded.
    pub fn get_or_load(
        &self,
        source: &dyn DescriptionSource,
        item: &ItemRef,
    ) -> InviteResult<Description> {
        let mut state = self.lock();
        if let Some(description) = state.as_ref() {
            return Ok(description.clone());
        }
        let description = source.load_description(item)?.unwrap_or_default();
        tracing::debug!(item = ?item, bytes = description.len(), "Materialized description");
        *state = Some(description.clone());
        Ok(description)
    }
}

impl Clone for DescriptionSlot {
    fn clone(&self) -> Self {
        Self {
            state: Mutex::new(self.peek()),
        }
    }
}

impl PartialEq for DescriptionSlot {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.peek() == other.peek()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingStore {
        loads: AtomicUsize,
    }

    impl DescriptionSource for CountingStore {
        fn load_description(&self, _item: &ItemRef) -> InviteResult<Option<Description>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Description::plain("Quarterly planning notes")))
        }
    }

    #[test_log::test]
    fn concurrent_readers_load_once() {
        let store = Arc::new(CountingStore {
            loads: AtomicUsize::new(0),
        });
        let slot = Arc::new(DescriptionSlot::unloaded());
        let item = ItemRef::default();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let slot = Arc::clone(&slot);
                let item = item.clone();
                std::thread::spawn(move || slot.get_or_load(store.as_ref(), &item))
            })
            .collect();
        for handle in handles {
            let description = handle.join().expect("thread").expect("load");
            assert_eq!(description.plain.as_deref(), Some("Quarterly planning notes"));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert!(slot.is_loaded());
    }

    #[test]
    fn loaded_slot_never_touches_the_store() {
        let store = CountingStore {
            loads: AtomicUsize::new(0),
        };
        let slot = DescriptionSlot::loaded(Description::plain("inline"));
        let got = slot.get_or_load(&store, &ItemRef::default()).expect("load");
        assert_eq!(got, Description::plain("inline"));
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_are_independent() {
        let slot = DescriptionSlot::loaded(Description::plain("original"));
        let copy = slot.clone();
        copy.set(Description::plain("changed"));
        assert_eq!(slot.peek(), Some(Description::plain("original")));
        assert_ne!(slot, copy);
    }
}
