use crate::{
    error::StoreError,
    sequence::{CounterState, SequenceCounter},
};

/// The persistence collaborator behind [`SequenceGenerator`].
///
/// Implementations hold one [`SequenceCounter`] per name and must make each
/// method individually atomic. The generator composes them into an atomic
/// allocation by retrying [`SequenceStore::compare_and_swap`] until it wins.
///
/// Counters for different names are independent; no cross-name coordination is
/// expected.
///
/// [`SequenceGenerator`]: crate::sequence::SequenceGenerator
pub trait SequenceStore {
    /// Point lookup by sequence name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be read.
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError>;

    /// Inserts `counter` unless a counter with the same name already exists.
    ///
    /// Returns `true` if the counter was created. An existing counter is never
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be written.
    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError>;

    /// Replaces the state of `name` with `next` if, and only if, it currently
    /// equals `expected`.
    ///
    /// Returns `false` when the stored state differs (or the counter is
    /// missing), in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be written.
    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError>;
}

impl<S: SequenceStore + ?Sized> SequenceStore for &S {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        (**self).load(name)
    }

    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        (**self).insert_if_absent(counter)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_swap(name, expected, next)
    }
}

impl<S: SequenceStore + ?Sized> SequenceStore for std::sync::Arc<S> {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        (**self).load(name)
    }

    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        (**self).insert_if_absent(counter)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_swap(name, expected, next)
    }
}
