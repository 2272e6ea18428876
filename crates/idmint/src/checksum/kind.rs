use core::{fmt, str::FromStr};

use crate::checksum::{
    AADHAAR_LEN, GSTIN_LEN, InvalidReason, PAN_LEN, ValidationOutcome, gstin_check_char,
    validate_aadhaar, validate_gstin, validate_pan, validate_verhoeff, verhoeff_check_digit,
};

/// The identifier types this crate knows how to validate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IdentifierKind {
    /// Any decimal digit string ending in a Verhoeff check digit.
    Verhoeff,
    /// 12-digit national ID number, Verhoeff checked.
    Aadhaar,
    /// 15-character tax registration number with a base-36 check character.
    Gstin,
    /// 10-character permanent account number, no checksum.
    Pan,
}

impl IdentifierKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Verhoeff, Self::Aadhaar, Self::Gstin, Self::Pan];

    /// Validates `candidate` against this kind's grammar and checksum.
    #[must_use]
    pub fn validate(self, candidate: &str) -> ValidationOutcome {
        match self {
            Self::Verhoeff => validate_verhoeff(candidate),
            Self::Aadhaar => validate_aadhaar(candidate),
            Self::Gstin => validate_gstin(candidate),
            Self::Pan => validate_pan(candidate),
        }
    }

    /// The fixed length of this kind, or `None` if it accepts any length.
    #[must_use]
    pub const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Verhoeff => None,
            Self::Aadhaar => Some(AADHAAR_LEN),
            Self::Gstin => Some(GSTIN_LEN),
            Self::Pan => Some(PAN_LEN),
        }
    }

    /// Returns `true` if the grammar embeds a check character.
    #[must_use]
    pub const fn has_checksum(self) -> bool {
        !matches!(self, Self::Pan)
    }

    /// Computes the check character to append to `payload`.
    ///
    /// Returns `Ok(None)` for kinds without a checksum.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReason::MalformedInput`] if `payload` does not match
    /// the grammar minus its final character.
    pub fn check_char(self, payload: &str) -> Result<Option<char>, InvalidReason> {
        match self {
            Self::Verhoeff => verhoeff_check_digit(payload).map(Some),
            Self::Aadhaar => {
                if payload.len() != AADHAAR_LEN - 1 {
                    return Err(InvalidReason::MalformedInput);
                }
                verhoeff_check_digit(payload).map(Some)
            }
            Self::Gstin => gstin_check_char(payload).map(Some),
            Self::Pan => Ok(None),
        }
    }

    /// The lower-case name used by [`FromStr`] and [`fmt::Display`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verhoeff => "verhoeff",
            Self::Aadhaar => "aadhaar",
            Self::Gstin => "gstin",
            Self::Pan => "pan",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown [`IdentifierKind`] name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown identifier kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for IdentifierKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_owned()))
    }
}
