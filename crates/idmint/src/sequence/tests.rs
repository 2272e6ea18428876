use crate::{
    DateSource, Error, FixedDate, StoreError,
    sequence::{
        CounterState, GeneratorConfig, MemoryStore, OverflowPolicy, SequenceCounter,
        SequenceGenerator, SequenceStore,
    },
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread::scope;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn jan(d: u32) -> NaiveDate {
    date(2024, 1, d)
}

struct StepDate {
    dates: Vec<NaiveDate>,
    index: AtomicUsize,
}

impl StepDate {
    fn new(dates: Vec<NaiveDate>) -> Arc<Self> {
        Arc::new(Self {
            dates,
            index: AtomicUsize::new(0),
        })
    }

    fn advance(&self) {
        self.index.fetch_add(1, Ordering::SeqCst);
    }
}

impl DateSource for StepDate {
    fn today(&self) -> NaiveDate {
        self.dates[self.index.load(Ordering::SeqCst)]
    }
}

/// Fails every compare-and-swap, as if another writer always got there first.
#[derive(Default)]
struct AlwaysContended {
    inner: MemoryStore,
    swaps: AtomicU32,
}

impl SequenceStore for AlwaysContended {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        self.inner.load(name)
    }

    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        self.inner.insert_if_absent(counter)
    }

    fn compare_and_swap(
        &self,
        _name: &str,
        _expected: CounterState,
        _next: CounterState,
    ) -> Result<bool, StoreError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

/// Reports busy for the first `failures` calls, then behaves.
struct Flaky {
    inner: MemoryStore,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl Flaky {
    fn new(failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let busy = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            Err(StoreError::Busy("database is locked".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl SequenceStore for Flaky {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        self.gate()?;
        self.inner.load(name)
    }

    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        self.gate()?;
        self.inner.insert_if_absent(counter)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError> {
        self.gate()?;
        self.inner.compare_and_swap(name, expected, next)
    }
}

/// Always fails with a non-transient error.
struct Broken;

impl SequenceStore for Broken {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        Err(StoreError::Corrupt {
            name: name.to_owned(),
            reason: "unreadable".to_owned(),
        })
    }

    fn insert_if_absent(&self, _counter: &SequenceCounter) -> Result<bool, StoreError> {
        unreachable!()
    }

    fn compare_and_swap(
        &self,
        _name: &str,
        _expected: CounterState,
        _next: CounterState,
    ) -> Result<bool, StoreError> {
        unreachable!()
    }
}

fn seed<S: SequenceStore>(store: &S, name: &str, count: u64, epoch_date: NaiveDate) {
    let counter = SequenceCounter {
        name: name.to_owned(),
        state: CounterState { count, epoch_date },
    };
    assert!(store.insert_if_absent(&counter).unwrap());
}

fn state_of<S: SequenceStore>(store: &S, name: &str) -> CounterState {
    store.load(name).unwrap().unwrap().state
}

fn run_allocations_increment_within_a_day<S: SequenceStore>(store: S) {
    let generator = SequenceGenerator::new(store, FixedDate(jan(15)));

    let first = generator.allocate("invoices", "INV").unwrap();
    let second = generator.allocate("invoices", "INV").unwrap();
    let third = generator.allocate("invoices", "INV").unwrap();

    assert_eq!(first.to_string(), "#INV20240115-000");
    assert_eq!(second.to_string(), "#INV20240115-001");
    assert_eq!(third.to_string(), "#INV20240115-002");
    assert_eq!(third.ordinal(), 2);
    assert_eq!(third.prefix(), "INV");
    assert_eq!(
        state_of(generator.store(), "invoices"),
        CounterState {
            count: 3,
            epoch_date: jan(15)
        }
    );
}

fn run_rollover_resets_on_next_day<S: SequenceStore>(store: S) {
    seed(&store, "orders", 5, jan(15));
    let dates = StepDate::new(vec![jan(16)]);
    let generator = SequenceGenerator::new(store, Arc::clone(&dates));

    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240116-000"
    );
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240116-001"
    );
    assert_eq!(
        state_of(generator.store(), "orders"),
        CounterState {
            count: 2,
            epoch_date: jan(16)
        }
    );
}

fn run_rollover_across_steps<S: SequenceStore>(store: S) {
    let dates = StepDate::new(vec![jan(15), jan(15), date(2024, 3, 1)]);
    let generator = SequenceGenerator::new(store, Arc::clone(&dates));

    assert_eq!(generator.allocate("orders", "ORD").unwrap().ordinal(), 0);
    dates.advance();
    assert_eq!(generator.allocate("orders", "ORD").unwrap().ordinal(), 1);
    dates.advance();
    let serial = generator.allocate("orders", "ORD").unwrap();
    assert_eq!(serial.to_string(), "#ORD20240301-000");
}

fn run_ensure_sequence_is_idempotent<S: SequenceStore>(store: S) {
    let dates = StepDate::new(vec![jan(15), jan(20)]);
    let generator = SequenceGenerator::new(store, Arc::clone(&dates));

    generator.ensure_sequence("orders").unwrap();
    let created = state_of(generator.store(), "orders");
    assert_eq!(created, CounterState::fresh(jan(15)));

    generator.ensure_sequence("orders").unwrap();
    assert_eq!(state_of(generator.store(), "orders"), created);

    generator.allocate("orders", "ORD").unwrap();
    generator.allocate("orders", "ORD").unwrap();
    let advanced = state_of(generator.store(), "orders");

    dates.advance();
    generator.ensure_sequence("orders").unwrap();
    assert_eq!(state_of(generator.store(), "orders"), advanced);
}

fn run_concurrent_allocations_are_dense<S: SequenceStore + Sync>(store: S) {
    const THREADS: usize = 16;

    let generator = SequenceGenerator::new(store, FixedDate(jan(15)));
    let barrier = Barrier::new(THREADS);
    let serials = Mutex::new(Vec::with_capacity(THREADS));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                let serial = generator.allocate("orders", "ORD").unwrap();
                serials.lock().unwrap().push(serial);
            });
        }
    });

    let serials = serials.into_inner().unwrap();
    let ordinals: HashSet<u64> = serials.iter().map(|s| s.ordinal()).collect();
    let formatted: HashSet<String> = serials.iter().map(ToString::to_string).collect();

    assert_eq!(ordinals, (0..THREADS as u64).collect());
    assert_eq!(formatted.len(), THREADS);
}

fn run_bulk_concurrent_allocations_are_dense<S: SequenceStore + Sync>(store: S) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 100;
    const TOTAL: usize = THREADS * PER_THREAD;

    // A thread can lose at most TOTAL - 1 races, so this bound cannot trip.
    let config = GeneratorConfig {
        max_cas_retries: TOTAL as u32,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(store, FixedDate(jan(15)), config);
    let seen = Mutex::new(HashSet::with_capacity(TOTAL));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..PER_THREAD {
                    let serial = generator.allocate("orders", "ORD").unwrap();
                    assert!(seen.lock().unwrap().insert(serial.ordinal()));
                }
            });
        }
    });

    assert_eq!(seen.into_inner().unwrap(), (0..TOTAL as u64).collect());
    assert_eq!(state_of(generator.store(), "orders").count, TOTAL as u64);
}

fn run_sequences_are_independent<S: SequenceStore>(store: S) {
    let generator = SequenceGenerator::new(store, FixedDate(jan(15)));

    generator.allocate("orders", "ORD").unwrap();
    generator.allocate("orders", "ORD").unwrap();
    let invoice = generator.allocate("invoices", "INV").unwrap();

    assert_eq!(invoice.to_string(), "#INV20240115-000");
    assert_eq!(state_of(generator.store(), "orders").count, 2);
    assert_eq!(state_of(generator.store(), "invoices").count, 1);
}

fn run_overflow_fails_closed<S: SequenceStore>(store: S) {
    seed(&store, "orders", 998, jan(15));
    let dates = StepDate::new(vec![jan(15), jan(16)]);
    let generator = SequenceGenerator::new(store, Arc::clone(&dates));

    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-998"
    );
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-999"
    );

    let err = generator.allocate("orders", "ORD").unwrap_err();
    assert!(
        matches!(err, Error::Overflow { count: 1000, max: 999, .. }),
        "{err:?}"
    );
    assert!(!err.is_retryable());
    assert_eq!(state_of(generator.store(), "orders").count, 1000);

    dates.advance();
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240116-000"
    );
}

fn run_overflow_widens<S: SequenceStore>(store: S) {
    seed(&store, "orders", 999, jan(15));
    let config = GeneratorConfig {
        overflow: OverflowPolicy::Widen,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(store, FixedDate(jan(15)), config);

    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-999"
    );
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-1000"
    );
}

fn run_clock_behind_keeps_epoch<S: SequenceStore>(store: S) {
    seed(&store, "orders", 3, jan(16));
    let generator = SequenceGenerator::new(store, FixedDate(jan(15)));

    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240116-003"
    );
    assert_eq!(
        state_of(generator.store(), "orders"),
        CounterState {
            count: 4,
            epoch_date: jan(16)
        }
    );
}

fn run_peek_does_not_consume<S: SequenceStore>(store: S) {
    let dates = StepDate::new(vec![jan(15), jan(16)]);
    let generator = SequenceGenerator::new(store, Arc::clone(&dates));

    assert_eq!(
        generator.peek("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-000"
    );
    assert!(generator.store().load("orders").unwrap().is_none());

    generator.allocate("orders", "ORD").unwrap();
    let peeked = generator.peek("orders", "ORD").unwrap();
    assert_eq!(peeked.to_string(), "#ORD20240115-001");
    assert_eq!(generator.peek("orders", "ORD").unwrap(), peeked);
    assert_eq!(generator.allocate("orders", "ORD").unwrap(), peeked);

    dates.advance();
    assert_eq!(
        generator.peek("orders", "ORD").unwrap().to_string(),
        "#ORD20240116-000"
    );
    assert_eq!(state_of(generator.store(), "orders").epoch_date, jan(15));
}

fn run_assign_if_missing<S: SequenceStore>(store: S) {
    let generator = SequenceGenerator::new(store, FixedDate(jan(15)));

    let mut fresh = None;
    assert!(generator.assign_if_missing(&mut fresh, "orders", "ORD").unwrap());
    assert_eq!(fresh.as_deref(), Some("#ORD20240115-000"));

    let mut existing = Some("#ORD20230101-042".to_owned());
    assert!(!generator.assign_if_missing(&mut existing, "orders", "ORD").unwrap());
    assert_eq!(existing.as_deref(), Some("#ORD20230101-042"));

    let mut blank = Some(String::new());
    assert!(generator.assign_if_missing(&mut blank, "orders", "ORD").unwrap());
    assert_eq!(blank.as_deref(), Some("#ORD20240115-001"));

    assert_eq!(state_of(generator.store(), "orders").count, 2);
}

fn run_all<F, S>(make_store: F)
where
    F: Fn() -> S,
    S: SequenceStore + Sync,
{
    run_allocations_increment_within_a_day(make_store());
    run_rollover_resets_on_next_day(make_store());
    run_rollover_across_steps(make_store());
    run_ensure_sequence_is_idempotent(make_store());
    run_concurrent_allocations_are_dense(make_store());
    run_bulk_concurrent_allocations_are_dense(make_store());
    run_sequences_are_independent(make_store());
    run_overflow_fails_closed(make_store());
    run_overflow_widens(make_store());
    run_clock_behind_keeps_epoch(make_store());
    run_peek_does_not_consume(make_store());
    run_assign_if_missing(make_store());
}

#[test]
fn memory_store_generator() {
    run_all(MemoryStore::new);
}

#[test]
fn shared_memory_store_generator() {
    run_all(|| Arc::new(MemoryStore::new()));
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_in_memory_generator() {
    run_all(|| crate::sequence::SqliteStore::open_in_memory().unwrap());
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_file_generator() {
    let dir = tempfile::tempdir().unwrap();
    let counter = AtomicUsize::new(0);
    run_all(|| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        crate::sequence::SqliteStore::open(dir.path().join(format!("seq-{n}.db"))).unwrap()
    });
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_state_survives_reopen() {
    use crate::sequence::SqliteStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sequences.db");

    {
        let generator = SequenceGenerator::new(SqliteStore::open(&path).unwrap(), FixedDate(jan(15)));
        generator.allocate("orders", "ORD").unwrap();
        generator.allocate("orders", "ORD").unwrap();
    }

    let generator = SequenceGenerator::new(SqliteStore::open(&path).unwrap(), FixedDate(jan(15)));
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-002"
    );
    assert_eq!(
        generator.store().snapshot().unwrap(),
        vec![SequenceCounter {
            name: "orders".to_owned(),
            state: CounterState {
                count: 3,
                epoch_date: jan(15)
            },
        }]
    );
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_separate_connections_share_one_sequence() {
    use crate::sequence::SqliteStore;

    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;
    const TOTAL: usize = THREADS * PER_THREAD;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let config = GeneratorConfig {
        max_cas_retries: TOTAL as u32,
        ..GeneratorConfig::default()
    };
    let seen = Mutex::new(HashSet::with_capacity(TOTAL));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let store = SqliteStore::open(&path).unwrap();
                let generator = SequenceGenerator::with_config(store, FixedDate(jan(15)), config);
                for _ in 0..PER_THREAD {
                    let serial = generator.allocate("orders", "ORD").unwrap();
                    assert!(seen.lock().unwrap().insert(serial.ordinal()));
                }
            });
        }
    });

    assert_eq!(seen.into_inner().unwrap(), (0..TOTAL as u64).collect());
}

#[test]
fn memory_store_snapshot_is_sorted() {
    let store = MemoryStore::from_counters([
        SequenceCounter::new("orders", jan(15)),
        SequenceCounter::new("invoices", jan(14)),
    ]);
    let names: Vec<_> = store
        .snapshot()
        .unwrap()
        .into_iter()
        .map(|counter| counter.name)
        .collect();
    assert_eq!(names, ["invoices", "orders"]);
}

#[test]
fn store_insert_if_absent_never_overwrites() {
    let store = MemoryStore::new();
    assert!(store.insert_if_absent(&SequenceCounter::new("orders", jan(15))).unwrap());
    assert!(!store.insert_if_absent(&SequenceCounter::new("orders", jan(20))).unwrap());
    assert_eq!(state_of(&store, "orders"), CounterState::fresh(jan(15)));
}

#[test]
fn store_compare_and_swap_requires_expected_state() {
    let store = MemoryStore::new();
    let fresh = CounterState::fresh(jan(15));

    assert!(!store.compare_and_swap("orders", fresh, fresh.advanced().unwrap()).unwrap());

    seed(&store, "orders", 0, jan(15));
    assert!(store.compare_and_swap("orders", fresh, fresh.advanced().unwrap()).unwrap());
    assert!(!store.compare_and_swap("orders", fresh, fresh.advanced().unwrap()).unwrap());
    assert_eq!(state_of(&store, "orders").count, 1);
}

#[test]
fn counter_state_rollover_rules() {
    let state = CounterState {
        count: 7,
        epoch_date: jan(15),
    };
    assert_eq!(state.on(jan(15)), state);
    assert_eq!(state.on(jan(14)), state);
    assert_eq!(state.on(jan(16)), CounterState::fresh(jan(16)));
    assert_eq!(state.advanced().map(|next| next.count), Some(8));

    let exhausted = CounterState {
        count: u64::MAX,
        epoch_date: jan(15),
    };
    assert_eq!(exhausted.advanced(), None);
}

#[test]
fn contention_exhausts_bounded_retries() {
    let config = GeneratorConfig {
        max_cas_retries: 3,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(AlwaysContended::default(), FixedDate(jan(15)), config);

    let err = generator.allocate("orders", "ORD").unwrap_err();
    assert!(
        matches!(&err, Error::ConcurrentModificationExceeded { name, attempts: 4 } if name == "orders"),
        "{err:?}"
    );
    assert!(err.is_retryable());
    assert_eq!(generator.store().swaps.load(Ordering::SeqCst), 4);
    assert_eq!(state_of(generator.store(), "orders").count, 0);
}

#[test]
fn transient_store_errors_are_retried() {
    let config = GeneratorConfig {
        max_store_retries: 2,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(Flaky::new(2), FixedDate(jan(15)), config);

    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-000"
    );
}

#[test]
fn persistent_busy_store_is_unavailable() {
    let config = GeneratorConfig {
        max_store_retries: 2,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(Flaky::new(u32::MAX), FixedDate(jan(15)), config);

    let err = generator.allocate("orders", "ORD").unwrap_err();
    assert!(
        matches!(
            err,
            Error::StoreUnavailable {
                attempts: 3,
                source: StoreError::Busy(_)
            }
        ),
        "{err:?}"
    );
    assert!(err.is_retryable());
    assert_eq!(generator.store().calls.load(Ordering::SeqCst), 3);
}

#[test]
fn permanent_store_error_is_not_retried() {
    let generator = SequenceGenerator::new(Broken, FixedDate(jan(15)));

    let err = generator.ensure_sequence("orders").unwrap_err();
    assert!(
        matches!(
            err,
            Error::StoreUnavailable {
                attempts: 1,
                source: StoreError::Corrupt { .. }
            }
        ),
        "{err:?}"
    );
}

#[cfg(feature = "serde")]
#[test]
fn counter_serializes_flat() {
    let counter = SequenceCounter {
        name: "orders".to_owned(),
        state: CounterState {
            count: 3,
            epoch_date: jan(15),
        },
    };
    let json = serde_json::to_string(&counter).unwrap();
    assert_eq!(json, r#"{"name":"orders","count":3,"epoch_date":"2024-01-15"}"#);
    assert_eq!(serde_json::from_str::<SequenceCounter>(&json).unwrap(), counter);
}

#[test]
fn widened_count_stops_before_wrapping() {
    let store = MemoryStore::new();
    seed(&store, "orders", u64::MAX - 1, jan(15));
    let config = GeneratorConfig {
        overflow: OverflowPolicy::Widen,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(store, FixedDate(jan(15)), config);

    assert_eq!(generator.allocate("orders", "ORD").unwrap().ordinal(), u64::MAX - 1);

    let err = generator.allocate("orders", "ORD").unwrap_err();
    assert!(
        matches!(err, Error::Overflow { count: u64::MAX, max, .. } if max == u64::MAX - 1),
        "{err:?}"
    );
    assert_eq!(state_of(generator.store(), "orders").count, u64::MAX);

    // The next day starts over.
    assert_eq!(
        generator
            .allocate_on("orders", "ORD", jan(16))
            .unwrap()
            .to_string(),
        "#ORD20240116-000"
    );
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_locked_database_is_retried_as_busy() {
    use crate::sequence::SqliteStore;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let store = SqliteStore::open_with_timeout(&path, Duration::from_millis(10)).unwrap();

    let holder = rusqlite::Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let config = GeneratorConfig {
        max_store_retries: 1,
        ..GeneratorConfig::default()
    };
    let generator = SequenceGenerator::with_config(store, FixedDate(jan(15)), config);

    let err = generator.allocate("orders", "ORD").unwrap_err();
    assert!(
        matches!(
            err,
            Error::StoreUnavailable {
                attempts: 2,
                source: StoreError::Busy(_)
            }
        ),
        "{err:?}"
    );
    assert!(err.is_retryable());

    holder.execute_batch("COMMIT").unwrap();
    assert_eq!(
        generator.allocate("orders", "ORD").unwrap().to_string(),
        "#ORD20240115-000"
    );
}
