use crate::{Token, TokenKind};

/// Returns true for any numeral token. Zero is accepted here so that
/// `0 lb` reaches weight validation and gets a precise error.
pub fn is_numeral(t: &Token) -> bool {
    matches!(&t.kind, TokenKind::Numeral(_))
}
