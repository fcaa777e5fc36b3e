use crate::Token;
use crate::rules::numeral::helpers::group;

/// Digits captured by a zone regex (group 1 of the first token).
pub fn zone_digits(tokens: &[Token]) -> Option<&str> {
    group(tokens, 0, 1)
}

/// Zone numbers too large for `u32` saturate, so they surface as an
/// out-of-range zone rather than as a missing one.
pub fn parse_zone_number(digits: &str) -> u32 {
    digits.parse::<u32>().unwrap_or(u32::MAX)
}
