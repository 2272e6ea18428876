use core::fmt;

use chrono::NaiveDate;

/// Width the ordinal is zero-padded to.
pub const ORDINAL_WIDTH: usize = 3;

/// The largest ordinal that fits [`ORDINAL_WIDTH`] digits.
pub const MAX_PADDED_ORDINAL: u64 = 999;

/// What to do once a day's ordinal no longer fits [`ORDINAL_WIDTH`] digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OverflowPolicy {
    /// Refuse with [`Error::Overflow`] and leave the counter untouched.
    ///
    /// [`Error::Overflow`]: crate::Error::Overflow
    #[default]
    Fail,
    /// Keep counting and print the ordinal at its natural width
    /// (`-1000`, `-1001`, ...).
    Widen,
}

/// A formatted, date-scoped serial number.
///
/// Renders as `#<prefix><YYYYMMDD>-<ordinal>`, with the ordinal zero-padded
/// to three digits.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use idmint::sequence::SerialNumber;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let serial = SerialNumber::new("INV", date, 3);
/// assert_eq!(serial.to_string(), "#INV20240115-003");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialNumber {
    prefix: String,
    epoch_date: NaiveDate,
    ordinal: u64,
}

impl SerialNumber {
    /// Creates a serial number from its parts.
    pub fn new(prefix: impl Into<String>, epoch_date: NaiveDate, ordinal: u64) -> Self {
        Self {
            prefix: prefix.into(),
            epoch_date,
            ordinal,
        }
    }

    /// The caller-supplied prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The epoch date the ordinal belongs to.
    #[must_use]
    pub const fn epoch_date(&self) -> NaiveDate {
        self.epoch_date
    }

    /// The ordinal within the day.
    #[must_use]
    pub const fn ordinal(&self) -> u64 {
        self.ordinal
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}{}-{:0width$}",
            self.prefix,
            self.epoch_date.format("%Y%m%d"),
            self.ordinal,
            width = ORDINAL_WIDTH
        )
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> Self {
        serial.to_string()
    }
}
