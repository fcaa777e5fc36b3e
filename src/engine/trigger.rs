//! Trigger scanning (input pre-classification).
//!
//! Inspects the raw query and produces coarse `BucketMask` signals that let
//! the parser skip rules which cannot possibly match.
//!
//! This is a heuristic scan. False positives are fine because the parser
//! still has to match full rule patterns; false negatives are not, since they
//! would hide a zone or weight that is actually present.

use super::compiled_rules::BucketMask;

/// Input characteristics detected from the raw query.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInfo {
    pub buckets: BucketMask,
}

impl TriggerInfo {
    pub fn scan(input: &str) -> Self {
        let mut buckets = BucketMask::empty();
        let lower = input.to_ascii_lowercase();

        if input.bytes().any(|b| b.is_ascii_digit()) {
            buckets |= BucketMask::HAS_DIGITS;
        }

        if lower.contains("zone") || has_short_zone(&lower) {
            buckets |= BucketMask::ZONEISH;
        }

        if lower.contains("lb") || lower.contains("pound") {
            buckets |= BucketMask::UNITISH;
        }

        TriggerInfo { buckets }
    }
}

/// `z` directly followed by a digit, e.g. `z5`.
fn has_short_zone(lower: &str) -> bool {
    lower.as_bytes().windows(2).any(|w| w[0] == b'z' && w[1].is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_zone_and_unit() {
        let info = TriggerInfo::scan("FedEx 2Day, Zone 5, 3 LBS");
        assert!(info.buckets.contains(BucketMask::HAS_DIGITS | BucketMask::ZONEISH | BucketMask::UNITISH));
    }

    #[test]
    fn short_zone_form() {
        assert!(TriggerInfo::scan("z8").buckets.contains(BucketMask::ZONEISH));
        assert!(!TriggerInfo::scan("fedex 2day").buckets.contains(BucketMask::ZONEISH));
    }

    #[test]
    fn no_digits_no_digit_bucket() {
        let info = TriggerInfo::scan("ground pounds");
        assert!(!info.buckets.contains(BucketMask::HAS_DIGITS));
        assert!(info.buckets.contains(BucketMask::UNITISH));
    }
}
