use crate::checksum::{
    InvalidReason, ValidationOutcome,
    layout::{CharClass, matches_layout},
};

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NO_VALUE: u8 = 255;
const RADIX: u32 = 36;

/// Length of a GSTIN, check character included.
pub const GSTIN_LEN: usize = 15;

/// Lookup table for base-36 code point values (upper-case only).
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while i < 36 {
        lut[ALPHABET[i as usize] as usize] = i;
        i += 1;
    }
    lut
};

/// State code, the holder's PAN, entity number, default `Z`, check character.
const LAYOUT: [CharClass; GSTIN_LEN] = [
    CharClass::Digit,
    CharClass::Digit,
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
    CharClass::NonZeroAlphanumeric,
    CharClass::Alphanumeric,
    CharClass::Alphanumeric,
];

/// Mod-36 checksum over the 14 payload characters. Callers must have checked
/// the layout, so every byte is in `ALPHABET`.
fn check_char(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let factor = if i % 2 == 0 { 1 } else { 2 };
            let product = u32::from(LOOKUP[usize::from(b)]) * factor;
            product / RADIX + product % RADIX
        })
        .sum();
    ALPHABET[((RADIX - sum % RADIX) % RADIX) as usize]
}

/// Validates a 15-character Goods and Services Tax Identification Number.
///
/// The layout is `NNLLLLLNNNNLEAC`: a two-digit state code, the holder's
/// ten-character PAN, an entity number (`1-9A-Z`), an alphanumeric (normally
/// `Z`) and the base-36 check character.
///
/// # Example
/// ```
/// use idmint::checksum::{InvalidReason, ValidationOutcome, validate_gstin};
///
/// assert!(validate_gstin("27AAPFU0939F1ZV").is_valid());
/// assert_eq!(
///     validate_gstin("27AAPFU0939F1ZW"),
///     ValidationOutcome::Invalid(InvalidReason::ChecksumMismatch)
/// );
/// ```
#[must_use]
pub fn validate_gstin(candidate: &str) -> ValidationOutcome {
    if !matches_layout(candidate, &LAYOUT) {
        return ValidationOutcome::Invalid(InvalidReason::MalformedInput);
    }
    let (payload, check) = candidate.as_bytes().split_at(GSTIN_LEN - 1);
    if check_char(payload) == check[0] {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Invalid(InvalidReason::ChecksumMismatch)
    }
}

/// Computes the check character for the first 14 characters of a GSTIN.
///
/// # Errors
///
/// Returns [`InvalidReason::MalformedInput`] unless `payload` is exactly 14
/// characters matching the GSTIN layout.
pub fn gstin_check_char(payload: &str) -> Result<char, InvalidReason> {
    if !matches_layout(payload, &LAYOUT[..GSTIN_LEN - 1]) {
        return Err(InvalidReason::MalformedInput);
    }
    Ok(char::from(check_char(payload.as_bytes())))
}
