use std::{thread, time::Duration};

use chrono::NaiveDate;
#[cfg(feature = "tracing")]
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result, StoreError},
    sequence::{
        CounterState, MAX_PADDED_ORDINAL, OverflowPolicy, SequenceCounter, SequenceStore,
        SerialNumber,
    },
    time::{DateSource, LocalDate},
};

/// Default number of extra compare-and-swap rounds after a lost race.
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 256;

/// Default number of extra attempts after a transient store error.
pub const DEFAULT_MAX_STORE_RETRIES: u32 = 8;

/// The largest ordinal that can be issued under [`OverflowPolicy::Widen`]:
/// issuing it must leave room for the stored count to advance.
const MAX_ORDINAL: u64 = u64::MAX - 1;

/// Upper bound for the pause between transient store retries.
const MAX_STORE_BACKOFF: Duration = Duration::from_millis(64);

/// Retry bounds and formatting policy for a [`SequenceGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Extra compare-and-swap rounds allowed after losing a race before
    /// [`Error::ConcurrentModificationExceeded`].
    pub max_cas_retries: u32,
    /// Extra attempts allowed after a transient [`StoreError`] before
    /// [`Error::StoreUnavailable`].
    pub max_store_retries: u32,
    /// What to do once a day's ordinal no longer fits three digits.
    pub overflow: OverflowPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
            max_store_retries: DEFAULT_MAX_STORE_RETRIES,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Allocates daily-resetting serial numbers from a [`SequenceStore`].
///
/// Each allocation is one compare-and-swap against the store: the rollover
/// decision, the read of the ordinal and the increment are computed from a
/// single observed [`CounterState`] and committed together, or not at all. A
/// lost race re-reads and tries again, up to
/// [`GeneratorConfig::max_cas_retries`] extra rounds.
///
/// For `N` concurrent allocations on one name within a day, the ordinals
/// handed out are exactly `0..N`.
///
/// ## Features
/// - ✅ Thread-safe (when the store is `Sync`)
/// - ✅ Safe across processes sharing a durable store
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use idmint::{FixedDate, sequence::{MemoryStore, SequenceGenerator}};
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let generator = SequenceGenerator::new(MemoryStore::new(), FixedDate(today));
///
/// generator.ensure_sequence("invoices").unwrap();
/// let first = generator.allocate("invoices", "INV").unwrap();
/// let second = generator.allocate("invoices", "INV").unwrap();
///
/// assert_eq!(first.to_string(), "#INV20240115-000");
/// assert_eq!(second.to_string(), "#INV20240115-001");
/// ```
#[derive(Debug)]
pub struct SequenceGenerator<S, D = LocalDate> {
    store: S,
    dates: D,
    config: GeneratorConfig,
}

impl<S, D> SequenceGenerator<S, D>
where
    S: SequenceStore,
    D: DateSource,
{
    /// Creates a generator with the default [`GeneratorConfig`].
    pub fn new(store: S, dates: D) -> Self {
        Self::with_config(store, dates, GeneratorConfig::default())
    }

    /// Creates a generator with explicit retry bounds and overflow policy.
    pub const fn with_config(store: S, dates: D, config: GeneratorConfig) -> Self {
        Self {
            store,
            dates,
            config,
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Creates the counter for `name` if it does not exist yet.
    ///
    /// Idempotent: an existing counter keeps its count and epoch date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store cannot be reached.
    pub fn ensure_sequence(&self, name: &str) -> Result<()> {
        self.ensure_on(name, self.dates.today()).map(|_| ())
    }

    /// Allocates the next serial number for `name` on today's date.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreUnavailable`] if the store fails or stays busy.
    /// - [`Error::ConcurrentModificationExceeded`] if every round lost a race.
    /// - [`Error::Overflow`] if the day is exhausted under
    ///   [`OverflowPolicy::Fail`], or the stored count cannot advance at all.
    pub fn allocate(&self, name: &str, prefix: &str) -> Result<SerialNumber> {
        self.allocate_on(name, prefix, self.dates.today())
    }

    /// Allocates the next serial number for `name` as of `today`.
    ///
    /// A `today` strictly after the counter's epoch date resets the count to
    /// zero in the same compare-and-swap that issues the ordinal. A `today`
    /// before the epoch date (a clock that went backwards) keeps the stored
    /// epoch.
    ///
    /// # Errors
    ///
    /// See [`Self::allocate`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn allocate_on(&self, name: &str, prefix: &str, today: NaiveDate) -> Result<SerialNumber> {
        let mut current = self.ensure_on(name, today)?;

        for _ in 0..=self.config.max_cas_retries {
            let state = self.effective_state(name, current, today);
            let ordinal = state.count;

            if self.config.overflow == OverflowPolicy::Fail && ordinal > MAX_PADDED_ORDINAL {
                return Err(Error::Overflow {
                    name: name.to_owned(),
                    count: ordinal,
                    max: MAX_PADDED_ORDINAL,
                });
            }

            let Some(next) = state.advanced() else {
                return Err(Error::Overflow {
                    name: name.to_owned(),
                    count: ordinal,
                    max: MAX_ORDINAL,
                });
            };
            if self.retry_store(|| self.store.compare_and_swap(name, current, next))? {
                return Ok(SerialNumber::new(prefix, state.epoch_date, ordinal));
            }

            // Another writer moved the counter since we read it.
            thread::yield_now();
            current = self.ensure_on(name, today)?;
        }

        Err(Error::ConcurrentModificationExceeded {
            name: name.to_owned(),
            attempts: self.config.max_cas_retries.saturating_add(1),
        })
    }

    /// Returns the serial number the next [`Self::allocate`] would produce,
    /// without consuming it or creating the counter.
    ///
    /// Concurrent allocations may claim it first, so the preview is only a
    /// hint (e.g. a form's initial value).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store cannot be read.
    pub fn peek(&self, name: &str, prefix: &str) -> Result<SerialNumber> {
        let today = self.dates.today();
        let state = self
            .retry_store(|| self.store.load(name))?
            .map_or_else(|| CounterState::fresh(today), |counter| counter.state)
            .on(today);
        Ok(SerialNumber::new(prefix, state.epoch_date, state.count))
    }

    /// Fills `slot` with a freshly allocated serial number unless it already
    /// holds a non-empty one.
    ///
    /// Returns `true` if an allocation happened. Call this once when a record
    /// is created, never on update.
    ///
    /// # Errors
    ///
    /// See [`Self::allocate`]. On error `slot` is left untouched.
    pub fn assign_if_missing(
        &self,
        slot: &mut Option<String>,
        name: &str,
        prefix: &str,
    ) -> Result<bool> {
        if slot.as_deref().is_some_and(|serial| !serial.is_empty()) {
            return Ok(false);
        }
        *slot = Some(self.allocate(name, prefix)?.to_string());
        Ok(true)
    }

    /// Loads the counter for `name`, creating it on `today` if absent.
    fn ensure_on(&self, name: &str, today: NaiveDate) -> Result<CounterState> {
        if let Some(counter) = self.retry_store(|| self.store.load(name))? {
            return Ok(counter.state);
        }

        let fresh = SequenceCounter::new(name, today);
        if self.retry_store(|| self.store.insert_if_absent(&fresh))? {
            #[cfg(feature = "tracing")]
            debug!(sequence = name, %today, "created sequence");
            return Ok(fresh.state);
        }

        // Lost the creation race; the winner's row is there now.
        match self.retry_store(|| self.store.load(name))? {
            Some(counter) => Ok(counter.state),
            None => Err(Error::StoreUnavailable {
                attempts: 1,
                source: StoreError::Corrupt {
                    name: name.to_owned(),
                    reason: "counter vanished after insert".to_owned(),
                },
            }),
        }
    }

    fn effective_state(&self, _name: &str, current: CounterState, today: NaiveDate) -> CounterState {
        let state = current.on(today);

        #[cfg(feature = "tracing")]
        if state != current {
            debug!(
                sequence = _name,
                from = %current.epoch_date,
                to = %today,
                "rolling sequence over"
            );
        } else if today < current.epoch_date {
            warn!(
                sequence = _name,
                epoch = %current.epoch_date,
                %today,
                "date is behind the sequence epoch; keeping stored epoch"
            );
        }

        state
    }

    /// Runs `op`, retrying transient store errors with a capped exponential
    /// pause.
    fn retry_store<T>(
        &self,
        mut op: impl FnMut() -> core::result::Result<T, StoreError>,
    ) -> Result<T> {
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempts <= self.config.max_store_retries => {
                    #[cfg(feature = "tracing")]
                    debug!(attempts, error = %err, "transient store error, retrying");
                    thread::sleep(backoff(attempts));
                }
                Err(source) => return Err(Error::StoreUnavailable { attempts, source }),
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(1_u64 << attempt.min(6)).min(MAX_STORE_BACKOFF)
}
