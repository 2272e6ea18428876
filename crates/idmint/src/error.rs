//! Error types for sequence allocation.
//!
//! Validation failures are not errors: they are reported through
//! [`ValidationOutcome`] so callers can branch on them without unwinding a
//! `Result`. The types here cover the stateful half of the crate, where the
//! persistence collaborator or contention can make an allocation fail.
//!
//! ## Error Cases
//! - [`Error::StoreUnavailable`]: the store failed, or kept failing
//!   transiently past the configured retry bound.
//! - [`Error::ConcurrentModificationExceeded`]: the compare-and-swap loop lost
//!   the race more times than allowed.
//! - [`Error::Overflow`]: the day's ordinal no longer fits the serial format.
//!
//! [`ValidationOutcome`]: crate::checksum::ValidationOutcome

/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that [`SequenceGenerator`] can produce.
///
/// [`SequenceGenerator`]: crate::sequence::SequenceGenerator
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The store could not serve the request.
    ///
    /// Fatal to the current allocation. Retry the surrounding record-creation
    /// operation as a whole.
    #[error("sequence store unavailable after {attempts} attempt(s): {source}")]
    StoreUnavailable {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The last error reported by the store.
        #[source]
        source: StoreError,
    },

    /// Every compare-and-swap attempt observed a concurrent writer.
    ///
    /// Retryable, and distinct from [`Error::StoreUnavailable`]: the store is
    /// healthy but heavily contended.
    #[error("sequence `{name}` was modified concurrently {attempts} time(s) in a row")]
    ConcurrentModificationExceeded {
        /// The sequence being allocated from.
        name: String,
        /// Number of lost compare-and-swap rounds.
        attempts: u32,
    },

    /// The ordinal exceeds the fixed serial padding width.
    ///
    /// Produced under [`OverflowPolicy::Fail`] once the ordinal passes three
    /// digits, and under any policy once the stored count reaches `u64::MAX`.
    /// The counter is left untouched so no ordinal is consumed.
    ///
    /// [`OverflowPolicy::Fail`]: crate::sequence::OverflowPolicy::Fail
    #[error("sequence `{name}` exhausted for the day: ordinal {count} exceeds {max}")]
    Overflow {
        /// The sequence being allocated from.
        name: String,
        /// The ordinal that would have been issued.
        count: u64,
        /// The largest ordinal the format can carry.
        max: u64,
    },
}

impl Error {
    /// Returns `true` when retrying the whole operation later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::ConcurrentModificationExceeded { .. }
        )
    }
}

/// Errors reported by a [`SequenceStore`] implementation.
///
/// [`SequenceStore`]: crate::sequence::SequenceStore
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The in-process lock guarding the store was poisoned.
    ///
    /// This can happen if another thread panicked while holding the lock. When
    /// the `parking-lot` feature is enabled, mutexes do not poison and this
    /// variant is never produced.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The backend is temporarily unable to serve the request (locked,
    /// busy). Safe to retry.
    #[error("store busy: {0}")]
    Busy(String),

    /// A persisted row could not be decoded.
    #[error("corrupt row for sequence `{name}`: {reason}")]
    Corrupt {
        /// The sequence whose row failed to decode.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Underlying SQLite failure.
    #[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    /// Returns `true` if the operation may succeed when retried as-is.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Busy(err.to_string())
            }
            _ => Self::Sqlite(err),
        }
    }
}
