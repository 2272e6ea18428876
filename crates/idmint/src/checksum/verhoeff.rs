use crate::checksum::{InvalidReason, ValidationOutcome};

/// Cayley table of the dihedral group D5.
const MULTIPLICATION: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

/// Position-dependent permutations, indexed by `position % 8`.
const PERMUTATION: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Multiplicative inverses in D5, used to derive a check digit.
const INVERSE: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

/// Length of an Aadhaar number, check digit included.
pub const AADHAAR_LEN: usize = 12;

fn is_digit_string(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// Folds the digits right to left. `offset` is 0 when validating and 1 when
/// the check digit is still missing from the end.
fn fold(candidate: &str, offset: usize) -> u8 {
    candidate
        .bytes()
        .rev()
        .enumerate()
        .fold(0, |acc, (j, b)| {
            let digit = usize::from(b - b'0');
            MULTIPLICATION[usize::from(acc)][usize::from(PERMUTATION[(j + offset) % 8][digit])]
        })
}

/// Validates a decimal digit string whose last digit is a Verhoeff check
/// digit.
///
/// Detects every single-digit substitution and every adjacent transposition.
/// Any non-digit character, or an empty string, is
/// [`InvalidReason::MalformedInput`].
///
/// # Example
/// ```
/// use idmint::checksum::validate_verhoeff;
///
/// assert!(validate_verhoeff("2363").is_valid());
/// assert!(!validate_verhoeff("2336").is_valid());
/// ```
#[must_use]
pub fn validate_verhoeff(candidate: &str) -> ValidationOutcome {
    if !is_digit_string(candidate) {
        return ValidationOutcome::Invalid(InvalidReason::MalformedInput);
    }
    if fold(candidate, 0) == 0 {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Invalid(InvalidReason::ChecksumMismatch)
    }
}

/// Computes the Verhoeff check digit for `payload`.
///
/// Appending the returned character to `payload` yields a string accepted by
/// [`validate_verhoeff`].
///
/// # Errors
///
/// Returns [`InvalidReason::MalformedInput`] if `payload` is empty or holds a
/// non-digit character.
///
/// # Example
/// ```
/// use idmint::checksum::verhoeff_check_digit;
///
/// assert_eq!(verhoeff_check_digit("236"), Ok('3'));
/// ```
pub fn verhoeff_check_digit(payload: &str) -> Result<char, InvalidReason> {
    if !is_digit_string(payload) {
        return Err(InvalidReason::MalformedInput);
    }
    let check = INVERSE[usize::from(fold(payload, 1))];
    Ok(char::from(b'0' + check))
}

/// Validates a 12-digit Aadhaar number: fixed length, digits only, Verhoeff
/// check digit last.
#[must_use]
pub fn validate_aadhaar(candidate: &str) -> ValidationOutcome {
    if candidate.len() != AADHAAR_LEN {
        return ValidationOutcome::Invalid(InvalidReason::MalformedInput);
    }
    validate_verhoeff(candidate)
}
