//! SQLite-backed sequence store.
//!
//! Counters live in a single `sequence_store` table keyed by sequence name.
//! Creation uses `INSERT OR IGNORE` so it is idempotent, and the
//! compare-and-swap is a conditional `UPDATE` whose row count reports whether
//! the expected state was still in place. Several processes may share one
//! database file: SQLite serializes the writes and the conditional update
//! rejects stale ones.

use std::{path::Path, time::Duration};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::{
    error::StoreError,
    sequence::{CounterState, SequenceCounter, SequenceStore, mutex::Mutex},
};

/// How long a connection waits on a locked database before reporting busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A durable [`SequenceStore`] on top of SQLite.
///
/// The connection is guarded by a mutex, so one store can be shared across
/// threads. Open one store per process and share it; separate stores on the
/// same file also work, at the cost of SQLite-level lock contention.
///
/// ## See Also
/// - [`MemoryStore`]
///
/// [`MemoryStore`]: crate::sequence::MemoryStore
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a store at `path`, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`Self::open`], with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be opened or migrated.
    pub fn open_with_timeout<P: AsRef<Path>>(
        path: P,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS sequence_store (
                sequence_name TEXT PRIMARY KEY,
                count INTEGER NOT NULL CHECK (count >= 0),
                epoch_date TEXT NOT NULL
            );
            ",
        )?;

        #[cfg(feature = "tracing")]
        debug!("sequence store schema initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns every counter, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the table cannot be read or a row is
    /// corrupt.
    pub fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sequence_name, count, epoch_date FROM sequence_store ORDER BY sequence_name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, NaiveDate>(2)?,
                ))
            })?;

            rows.map(|row| -> Result<SequenceCounter, StoreError> {
                let (name, count, epoch_date) = row?;
                let count = decode_count(&name, count)?;
                Ok(SequenceCounter {
                    name,
                    state: CounterState { count, epoch_date },
                })
            })
            .collect()
        })
    }

    fn with_conn<R>(
        &self,
        f: impl FnOnce(&Connection) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        #[cfg(feature = "parking-lot")]
        let conn = self.conn.lock();
        #[cfg(not(feature = "parking-lot"))]
        let conn = self.conn.lock()?;

        f(&conn)
    }
}

fn decode_count(name: &str, count: i64) -> Result<u64, StoreError> {
    u64::try_from(count).map_err(|_| StoreError::Corrupt {
        name: name.to_owned(),
        reason: format!("negative count {count}"),
    })
}

fn encode_count(name: &str, count: u64) -> Result<i64, StoreError> {
    i64::try_from(count).map_err(|_| StoreError::Corrupt {
        name: name.to_owned(),
        reason: format!("count {count} exceeds the INTEGER range"),
    })
}

impl SequenceStore for SqliteStore {
    fn load(&self, name: &str) -> Result<Option<SequenceCounter>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT count, epoch_date FROM sequence_store WHERE sequence_name = ?1",
                    params![name],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, NaiveDate>(1)?)),
                )
                .optional()?;

            row.map(|(count, epoch_date)| -> Result<SequenceCounter, StoreError> {
                Ok(SequenceCounter {
                    name: name.to_owned(),
                    state: CounterState {
                        count: decode_count(name, count)?,
                        epoch_date,
                    },
                })
            })
            .transpose()
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn insert_if_absent(&self, counter: &SequenceCounter) -> Result<bool, StoreError> {
        let count = encode_count(&counter.name, counter.count())?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO sequence_store (sequence_name, count, epoch_date) VALUES (?1, ?2, ?3)",
                params![counter.name, count, counter.epoch_date()],
            )?;
            Ok(inserted == 1)
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn compare_and_swap(
        &self,
        name: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<bool, StoreError> {
        let expected_count = encode_count(name, expected.count)?;
        let next_count = encode_count(name, next.count)?;
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE sequence_store SET count = ?1, epoch_date = ?2 \
                 WHERE sequence_name = ?3 AND count = ?4 AND epoch_date = ?5",
                params![
                    next_count,
                    next.epoch_date,
                    name,
                    expected_count,
                    expected.epoch_date
                ],
            )?;
            Ok(updated == 1)
        })
    }
}
