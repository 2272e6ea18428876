//! Pure, stateless validators for statutory identifiers.
//!
//! Each validator returns a [`ValidationOutcome`]: structural failures (length,
//! character class at a position) are [`InvalidReason::MalformedInput`] and are
//! always reported ahead of any checksum comparison, so a malformed candidate
//! never yields [`InvalidReason::ChecksumMismatch`].

mod gstin;
mod kind;
mod layout;
mod outcome;
mod pan;
mod verhoeff;

pub use gstin::*;
pub use kind::*;
pub use outcome::*;
pub use pan::*;
pub use verhoeff::*;
