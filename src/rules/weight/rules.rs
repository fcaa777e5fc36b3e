use crate::rules::numeral::helpers::group;
use crate::rules::numeral::predicates::is_numeral;
use crate::{BucketMask, Dimension, Rule, Token, TokenKind, WeightData};

/// `<numeral> <unit>` where the unit is `lb`, `lbs`, `pound` or `pounds`,
/// optionally separated by whitespace: `3lb`, `3 lbs`, `2.5 Pounds`.
pub fn rule_weight_pounds() -> Rule {
    rule! {
        name: "<numeral> lb|lbs|pound|pounds",
        pattern: [
            pred!(is_numeral),
            re!(r"(?i)\s*(pounds?|lbs?)\b"),
        ],
        buckets: BucketMask::HAS_DIGITS.bits() | BucketMask::UNITISH.bits(),
        deps: [Dimension::Numeral],
        prod: |tokens: &[Token]| -> Option<WeightData> {
            let pounds = match &tokens.first()?.kind {
                TokenKind::Numeral(nd) => nd.value,
                _ => return None,
            };
            let unit = group(tokens, 1, 1)?.to_string();
            Some(WeightData { pounds, unit })
        },
    }
}

pub fn get() -> Vec<Rule> {
    vec![rule_weight_pounds()]
}
