use chrono::NaiveDate;

/// The mutable part of a [`SequenceCounter`]: what a compare-and-swap
/// compares and replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterState {
    /// The next ordinal to issue within the current epoch.
    pub count: u64,
    /// The date `count` was last reset.
    pub epoch_date: NaiveDate,
}

impl CounterState {
    /// A fresh state for `date`: nothing issued yet.
    #[must_use]
    pub const fn fresh(date: NaiveDate) -> Self {
        Self {
            count: 0,
            epoch_date: date,
        }
    }

    /// Returns the state the counter is in on `today`.
    ///
    /// If `today` is strictly after the epoch date, the count starts over at
    /// zero on `today`. Otherwise, including when the clock is behind the
    /// stored epoch, the state is unchanged.
    #[must_use]
    pub fn on(self, today: NaiveDate) -> Self {
        if today > self.epoch_date {
            Self::fresh(today)
        } else {
            self
        }
    }

    /// The state after issuing `self.count`, or `None` if the count cannot
    /// grow any further.
    #[must_use]
    pub const fn advanced(self) -> Option<Self> {
        match self.count.checked_add(1) {
            Some(count) => Some(Self {
                count,
                epoch_date: self.epoch_date,
            }),
            None => None,
        }
    }
}

/// A named, persistent, daily-resetting counter.
///
/// Created lazily the first time its name is used, mutated on every
/// allocation, and never deleted during normal operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceCounter {
    /// Unique key, one per owning record type.
    pub name: String,
    /// Current count and epoch.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub state: CounterState,
}

impl SequenceCounter {
    /// A counter that has issued nothing yet on `date`.
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            state: CounterState::fresh(date),
        }
    }

    /// The next ordinal to issue within the current epoch.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.state.count
    }

    /// The date the count was last reset.
    #[must_use]
    pub const fn epoch_date(&self) -> NaiveDate {
        self.state.epoch_date
    }
}
