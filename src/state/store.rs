//! Lock-free holder of the current state snapshot.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::state::reducer::{reduce, Action, AppState};

/// Current [`AppState`], replaced atomically on every action.
#[derive(Debug)]
pub struct Store {
    inner: ArcSwap<AppState>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.inner.load_full()
    }

    /// Apply `action` and return the resulting snapshot.
    ///
    /// Concurrent dispatches are serialized by retrying the reducer on the
    /// latest state.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        self.inner.rcu(|current| reduce(current, action.clone()));
        self.inner.load_full()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::ObjectId;

    #[test]
    fn test_snapshots_are_immutable() {
        let store = Store::default();
        let before = store.snapshot();
        store.dispatch(Action::ActionStarted(ObjectId::ZERO));
        assert!(before.pending.is_empty());
        assert!(store.snapshot().pending.contains(&ObjectId::ZERO));
    }

    #[test]
    fn test_concurrent_dispatch_loses_nothing() {
        let store = Arc::new(Store::default());
        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.dispatch(Action::ActionStarted(ObjectId::from_bytes([n; 32])));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().pending.len(), 8);
    }
}
