use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::StoreError,
    sequence::{CounterState, SequenceCounter, SequenceStore, mutex::Mutex},
};

/// An in-process [`SequenceStore`] backed by a mutex-guarded map.
///
/// Suitable for tests and for single-process deployments where counters need
/// not survive a restart. Every method holds the lock for its whole duration,
/// which makes each one atomic.
///
/// ## Recommended When
/// - Tests, or a process that is the only writer of its counters
///
/// ## See Also
/// - [`SqliteStore`]
///
/// [`SqliteStore`]: crate::sequence::SqliteStore
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, CounterState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `counters`, e.g. restored from a
    /// snapshot. Later entries win on duplicate names.
    pub fn from_counters(counters: impl IntoIterator<Item = SequenceCounter>) -> Self {
        let counters = counters
            .into_iter()
            .map(|counter| (counter.name, counter.state))
            .collect();
        Self {
            counters: Mutex::new(counters),
        }
    }

    /// Returns every counter, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if the lock was poisoned.
    pub fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        self.with_counters(|counters| {
            let mut all: Vec<_> = counters
                .iter()
                .map(|(name, &state)| SequenceCounter {
                    name: name.clone(),
                    state,
                })
                .collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            all
        })
    }

    fn with_counters<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, CounterState>) -> R,
    ) -> Result<R, StoreError> {
        #[cfg(feature = "parking-lot")]
        let mut counters = self.counters.lock();
        #[cfg(not(feature = "parking-lot"))]
        let mut counters = self.counters.lock()?;

        Ok(f(&mut counters))
    }
}

impl SequenceStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        self.with_counters(|counters| {
            counters.get(name).map(|&state| SequenceCounter {
                name: name.to_owned(),
                state,
            })
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        self.with_counters(|counters| {
            if counters.contains_key(&counter.name) {
                false
            } else {
                counters.insert(counter.name.clone(), counter.state);
                true
            }
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError> {
        self.with_counters(|counters| match counters.get_mut(name) {
            Some(state) if *state == expected => {
                *state = next;
                true
            }
            _ => false,
        })
    }
}
