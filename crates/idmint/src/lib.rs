#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod checksum;
mod error;
pub mod sequence;
mod time;

pub use crate::checksum::{IdentifierKind, InvalidReason, ValidationOutcome};
pub use crate::error::*;
pub use crate::sequence::{SequenceGenerator, SequenceStore, SerialNumber};
pub use crate::time::*;
