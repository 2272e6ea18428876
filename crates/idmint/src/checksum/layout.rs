/// The character class a fixed position of an identifier must belong to.
///
/// Only upper-case ASCII is accepted. Candidates are never case-folded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CharClass {
    /// `0-9`
    Digit,
    /// `A-Z`
    Letter,
    /// `1-9` or `A-Z`
    NonZeroAlphanumeric,
    /// `0-9` or `A-Z`
    Alphanumeric,
}

impl CharClass {
    #[inline]
    pub(crate) const fn matches(self, b: u8) -> bool {
        match self {
            Self::Digit => b.is_ascii_digit(),
            Self::Letter => b.is_ascii_uppercase(),
            Self::NonZeroAlphanumeric => matches!(b, b'1'..=b'9' | b'A'..=b'Z'),
            Self::Alphanumeric => b.is_ascii_digit() || b.is_ascii_uppercase(),
        }
    }
}

/// Returns `true` if `candidate` has exactly `layout.len()` bytes and each one
/// belongs to the class expected at its position.
pub(crate) fn matches_layout(candidate: &str, layout: &[CharClass]) -> bool {
    candidate.len() == layout.len()
        && candidate
            .bytes()
            .zip(layout)
            .all(|(b, class)| class.matches(b))
}
