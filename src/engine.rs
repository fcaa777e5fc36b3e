//! Query parsing engine.
//!
//! Parsing a query line is a pipeline:
//!
//! ```text
//! rules (all)  ──┐
//!               │  CompiledRules::new           (compiled_rules.rs)
//!               └───────────────┬──────────────
//!                               │
//! input ── TriggerInfo::scan ───┼─ select active rules (buckets)
//!         (trigger.rs)          │
//!                               v
//!                     Parser::saturate (parser.rs)
//!                       - seed matches (regex-first)
//!                       - iterate to fixpoint
//!                       - dedup via NodeKey (dedup.rs)
//!                               │
//!                               v
//!                     Parser::select_candidates
//!                       - drop subsumed spans per dimension
//!                               │
//!                               v
//!                     assemble (assemble.rs)
//!                       - zone, weight, service fragment
//!                               │
//!                               v
//!                          ParsedQuery
//! ```
//!
//! Saturation lets one rule build on another's output: the numeral rule
//! seeds `3`, and the weight rule later composes `<numeral> lb` from it.
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: indexes `Rule`s by trigger bucket.
//! - `trigger.rs`: scans the raw input for coarse buckets.
//! - `parser.rs`: matching + saturation over a `Stash`, candidate selection.
//! - `dedup.rs`: stable dedup keys to keep saturation finite.
//! - `assemble.rs`: turns candidates into a validated `ParsedQuery`.
//! - `metrics.rs`: timing/debug data for runs and passes.
//!
//! ## Adding new rules / dimensions
//!
//! - Rules live under `src/rules/` and are collected by `rules::get`.
//! - A rule that needs a new coarse trigger needs a new `BucketMask` bit and
//!   matching detection in `TriggerInfo::scan`.
//! - A new dimension needs a `DimensionSet` bit, a `NodeKindKey` variant and,
//!   if it feeds the query, handling in `assemble`.

#[path = "engine/assemble.rs"]
mod assemble;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/trigger.rs"]
mod trigger;

use once_cell::sync::Lazy;

use crate::Rule;

pub(crate) use assemble::assemble;
pub(crate) use compiled_rules::{BucketMask, CompiledRules};
pub(crate) use metrics::PassMetrics;
pub(crate) use parser::Parser;

static RULES: Lazy<Vec<Rule>> = Lazy::new(crate::rules::get);
static COMPILED: Lazy<CompiledRules<'static>> = Lazy::new(|| CompiledRules::new(&RULES));

/// The full rule set, compiled once per process.
pub(crate) fn compiled() -> &'static CompiledRules<'static> {
    &COMPILED
}
