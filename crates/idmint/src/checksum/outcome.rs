use core::fmt;

/// Why a candidate identifier was rejected.
///
/// The two reasons are kept apart so callers can give different feedback: a
/// typo in the shape of the identifier versus a well-formed identifier whose
/// check character does not add up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InvalidReason {
    /// Wrong length, or a character of the wrong class at some position.
    MalformedInput,
    /// Structurally valid, but the embedded checksum does not match.
    ChecksumMismatch,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput => f.write_str("malformed input"),
            Self::ChecksumMismatch => f.write_str("checksum mismatch"),
        }
    }
}

impl core::error::Error for InvalidReason {}

/// Represents the result of validating a candidate identifier.
///
/// - [`ValidationOutcome::Valid`] the candidate passed every structural and
///   checksum rule of its type.
/// - [`ValidationOutcome::Invalid`] the candidate was rejected, with the
///   [`InvalidReason`].
///
/// # Example
///
/// ```
/// use idmint::checksum::{InvalidReason, ValidationOutcome, validate_verhoeff};
///
/// assert_eq!(validate_verhoeff("2363"), ValidationOutcome::Valid);
/// assert_eq!(
///     validate_verhoeff("2368"),
///     ValidationOutcome::Invalid(InvalidReason::ChecksumMismatch)
/// );
/// assert_eq!(
///     validate_verhoeff("23a3"),
///     ValidationOutcome::Invalid(InvalidReason::MalformedInput)
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", content = "reason", rename_all = "snake_case"))]
pub enum ValidationOutcome {
    /// The candidate is a valid identifier.
    Valid,
    /// The candidate was rejected.
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    /// Returns `true` for [`ValidationOutcome::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }

    /// Converts the outcome into a [`Result`] so it composes with `?`.
    ///
    /// # Errors
    ///
    /// Returns the [`InvalidReason`] when the candidate was rejected.
    pub const fn into_result(self) -> Result<(), InvalidReason> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(reason) => Err(reason),
        }
    }
}

impl From<ValidationOutcome> for Result<(), InvalidReason> {
    fn from(outcome: ValidationOutcome) -> Self {
        outcome.into_result()
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::Invalid(reason) => write!(f, "invalid ({reason})"),
        }
    }
}
