use crate::{NumeralData, Token, TokenKind};

/// Return the first regex capture group from `tokens[0]`.
pub fn first_match_lower(tokens: &[Token]) -> Option<String> {
    match &tokens.first()?.kind {
        // Groups are already lowercased by the parser.
        TokenKind::RegexMatch(groups) => groups.first().cloned(),
        _ => None,
    }
}

/// Return capture group `idx` of the regex token at `tokens[pos]`.
pub fn group(tokens: &[Token], pos: usize, idx: usize) -> Option<&str> {
    match &tokens.get(pos)?.kind {
        TokenKind::RegexMatch(groups) => groups.get(idx).map(String::as_str),
        _ => None,
    }
}

/// Parse a decimal number string (`3`, `2.5`, `.75`) into `f64`.
pub fn parse_decimal(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn make_numeral(value: f64) -> NumeralData {
    NumeralData { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_leading_dot() {
        assert_eq!(parse_decimal("3"), Some(3.0));
        assert_eq!(parse_decimal(".75"), Some(0.75));
        assert_eq!(parse_decimal("x"), None);
    }
}
