//! Rule compilation and indexing.
//!
//! Parsing is split into two phases:
//!
//! 1. **Compile/index rules** (this module): build `CompiledRules` once from
//!    the full rule list and index it by coarse input buckets.
//! 2. **Run** (see `parser.rs`): scan the input for triggers (`trigger.rs`),
//!    select the active subset, then saturate and collect candidates.
//!
//! ## Extension points
//!
//! Adding a new bucket:
//!   1. Add a `BucketMask` bit.
//!   2. Add a `BUCKET_*` constant and bump `BUCKET_COUNT`.
//!   3. Teach `TriggerInfo::scan` (in `trigger.rs`) to detect it.
//!
//! `CompiledRules::new` and `Parser::new_compiled` walk `BUCKETS`, so they do
//! not need to change.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `CompiledRules::rules` and `CompiledRules::metas`.
//!   Those vectors must stay aligned.
//! - `RuleIndex::by_bucket` uses fixed indices (`BUCKET_*`).

use crate::{Dimension, Rule};

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// Coarse buckets for fast input classification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BucketMask: u32 {
        const HAS_DIGITS = 1 << 0;
        const ZONEISH    = 1 << 1;
        const UNITISH    = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Tracks which dimensions are present in the stash.
    ///
    /// Used by the parser to skip rules whose dependencies cannot match yet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DimensionSet: u8 {
        const NUMERAL = 1 << 0;
        const ZONE    = 1 << 1;
        const WEIGHT  = 1 << 2;
        const REGEX   = 1 << 3;
    }
}

impl DimensionSet {
    pub(crate) fn of(dim: Dimension) -> Self {
        match dim {
            Dimension::Numeral => DimensionSet::NUMERAL,
            Dimension::Zone => DimensionSet::ZONE,
            Dimension::Weight => DimensionSet::WEIGHT,
            Dimension::RegexMatch => DimensionSet::REGEX,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RuleMeta {
    pub buckets: BucketMask,
    pub deps: &'static [Dimension],
    pub priority: u16,
}

#[derive(Default, Debug)]
pub struct RuleIndex {
    pub always_on: Vec<RuleId>,
    pub by_bucket: [Vec<RuleId>; BUCKET_COUNT],
}

pub const BUCKET_COUNT: usize = 3;
pub const BUCKET_HAS_DIGITS: usize = 0;
pub const BUCKET_ZONEISH: usize = 1;
pub const BUCKET_UNITISH: usize = 2;

/// Bucket bit paired with its slot in `RuleIndex::by_bucket`.
pub(crate) const BUCKETS: [(BucketMask, usize); BUCKET_COUNT] = [
    (BucketMask::HAS_DIGITS, BUCKET_HAS_DIGITS),
    (BucketMask::ZONEISH, BUCKET_ZONEISH),
    (BucketMask::UNITISH, BUCKET_UNITISH),
];

/// Pre-compiled rule set with metadata and indexes.
#[derive(Debug)]
pub struct CompiledRules<'a> {
    pub rules: Vec<&'a Rule>,
    pub metas: Vec<RuleMeta>,
    pub index: RuleIndex,
}

impl<'a> CompiledRules<'a> {
    /// Create a compiled rule set from a slice of rules.
    ///
    /// This does not rewrite patterns or build automata; metadata comes
    /// directly from the `Rule` fields.
    pub fn new(rules: &'a [Rule]) -> Self {
        let rule_refs: Vec<&Rule> = rules.iter().collect();

        let metas: Vec<RuleMeta> = rule_refs
            .iter()
            .map(|r| RuleMeta { buckets: BucketMask::from_bits_truncate(r.buckets), deps: r.deps, priority: r.priority })
            .collect();

        let mut index = RuleIndex::default();
        for (id, meta) in metas.iter().enumerate() {
            if meta.buckets.is_empty() {
                index.always_on.push(id);
                continue;
            }
            for (bit, slot) in BUCKETS {
                if meta.buckets.contains(bit) {
                    index.by_bucket[slot].push(id);
                }
            }
        }

        CompiledRules { rules: rule_refs, metas, index }
    }

    pub fn priority_of(&self, rule_name: &str) -> u16 {
        self.rules
            .iter()
            .zip(&self.metas)
            .find(|(r, _)| r.name == rule_name)
            .map(|(_, m)| m.priority)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_are_indexed_by_bucket() {
        let rules = crate::rules::get();
        let compiled = CompiledRules::new(&rules);
        assert_eq!(compiled.rules.len(), compiled.metas.len());
        assert!(!compiled.index.by_bucket[BUCKET_ZONEISH].is_empty());
        assert!(!compiled.index.by_bucket[BUCKET_UNITISH].is_empty());
        assert!(!compiled.index.by_bucket[BUCKET_HAS_DIGITS].is_empty());
    }
}
