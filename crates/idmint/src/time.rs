use std::sync::Arc;

use chrono::{Local, NaiveDate};

/// A trait for sources of the current calendar date.
///
/// The generator never reads the clock itself: the date that decides rollover
/// is always supplied through this trait, so tests and backfills can plug in a
/// fixed or stepped date.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use idmint::DateSource;
///
/// struct Launch;
/// impl DateSource for Launch {
///     fn today(&self) -> NaiveDate {
///         NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
///     }
/// }
///
/// assert_eq!(Launch.today().to_string(), "2024-01-15");
/// ```
pub trait DateSource {
    /// Returns the current calendar date.
    fn today(&self) -> NaiveDate;
}

/// The local wall-clock date, in the process's configured timezone.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDate;

impl DateSource for LocalDate {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A date source that always returns the same date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedDate(pub NaiveDate);

impl DateSource for FixedDate {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

impl<T: DateSource + ?Sized> DateSource for &T {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

impl<T: DateSource + ?Sized> DateSource for Arc<T> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
