//! Redemption code generation
//!
//! A redemption code doubles as the TCP port the offer's transfer server binds
//! to, so codes are drawn from the IANA dynamic/private port range. The
//! generator makes no uniqueness promise; the offer registry retries until it
//! finds a code that is not already in use.

use std::ops::RangeInclusive;

/// Lowest code the generator will produce (start of the dynamic port range)
pub const CODE_MIN: u16 = 49152;

/// Highest code the generator will produce
pub const CODE_MAX: u16 = u16::MAX;

/// Inclusive range of valid redemption codes
pub const CODE_RANGE: RangeInclusive<u16> = CODE_MIN..=CODE_MAX;

/// Number of distinct codes the generator can produce
pub const CODE_SPACE: usize = (CODE_MAX - CODE_MIN) as usize + 1;

/// Draw a pseudo-random redemption code
#[must_use]
pub fn generate_code() -> u16 {
    rand::random_range(CODE_RANGE)
}

/// Check whether a code lies in the range the generator draws from
#[must_use]
pub fn is_valid_code(code: u16) -> bool {
    CODE_RANGE.contains(&code)
}
