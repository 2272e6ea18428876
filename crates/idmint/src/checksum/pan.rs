use crate::checksum::{
    InvalidReason, ValidationOutcome,
    layout::{CharClass, matches_layout},
};

/// Length of a Permanent Account Number.
pub const PAN_LEN: usize = 10;

const LAYOUT: [CharClass; PAN_LEN] = [
    CharClass::Letter,
    CharClass::Letter,
    CharClass::Letter,
    CharClass::Letter,
    CharClass::Letter,
    CharClass::Digit,
    CharClass::Digit,
    CharClass::Digit,
    CharClass::Digit,
    CharClass::Letter,
];

/// Validates a Permanent Account Number: five letters, four digits, one
/// letter.
///
/// The format carries no checksum, so the only possible rejection is
/// [`InvalidReason::MalformedInput`].
#[must_use]
pub fn validate_pan(candidate: &str) -> ValidationOutcome {
    if matches_layout(candidate, &LAYOUT) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Invalid(InvalidReason::MalformedInput)
    }
}
