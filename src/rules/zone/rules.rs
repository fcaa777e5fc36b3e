use crate::rules::zone::helpers::{parse_zone_number, zone_digits};
use crate::{BucketMask, Rule, Token, ZoneData};

const ZONE_BUCKETS: u32 = BucketMask::ZONEISH.bits() | BucketMask::HAS_DIGITS.bits();

/// `zone 5`, `Zone 5`, `zone5`, `ZONE   12`.
pub fn rule_zone_word() -> Rule {
    rule! {
        name: "zone <digits>",
        pattern: [re!(r"(?i)\bzone\s*(\d+)\b")],
        buckets: ZONE_BUCKETS,
        priority: 1,
        prod: |tokens: &[Token]| -> Option<ZoneData> {
            let digits = zone_digits(tokens)?;
            Some(ZoneData { number: parse_zone_number(digits) })
        },
    }
}

/// `z5`, `Z8`.
pub fn rule_zone_short() -> Rule {
    rule! {
        name: "zone short form z<digits>",
        pattern: [re!(r"(?i)\bz(\d+)\b")],
        buckets: ZONE_BUCKETS,
        prod: |tokens: &[Token]| -> Option<ZoneData> {
            zone_digits(tokens).map(|digits| ZoneData { number: parse_zone_number(digits) })
        },
    }
}

pub fn get() -> Vec<Rule> {
    vec![rule_zone_word(), rule_zone_short()]
}
