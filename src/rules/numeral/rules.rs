use crate::rules::numeral::helpers::{first_match_lower, make_numeral, parse_decimal};
use crate::{BucketMask, NumeralData, Rule, Token};

/// Plain decimal numbers: `3`, `2.5`, `.75`. Signs are not part of the
/// match, so `-2` yields `2`; weights are validated later.
pub fn rule_decimal() -> Rule {
    rule! {
        name: "decimal number",
        pattern: [re!(r"(\d+(?:\.\d+)?|\.\d+)")],
        buckets: BucketMask::HAS_DIGITS.bits(),
        prod: |tokens: &[Token]| -> Option<NumeralData> {
            let m = first_match_lower(tokens)?;
            parse_decimal(&m).map(make_numeral)
        },
    }
}

pub fn get() -> Vec<Rule> {
    vec![rule_decimal()]
}
