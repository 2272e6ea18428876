//! Persistent, daily-resetting serial number allocation.
//!
//! A [`SequenceGenerator`] owns no counters itself: they live in an injected
//! [`SequenceStore`], one [`SequenceCounter`] per name. Allocation is a
//! bounded compare-and-swap loop over that store.

mod counter;
mod generator;
mod memory;
mod mutex;
mod serial;
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;
#[cfg(test)]
mod tests;

pub use counter::*;
pub use generator::*;
pub use memory::*;
pub use serial::*;
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
#[cfg(feature = "sqlite")]
pub use sqlite::*;
pub use store::*;
