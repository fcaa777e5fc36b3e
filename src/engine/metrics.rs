//! Engine run metrics.
//!
//! `Parser::run` is the normal entry point; `Parser::run_with_metrics` also
//! returns per-pass timings and, when asked, the nodes each pass produced.
//! The query `--explain` mode is built from these.

use crate::Node;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for [`Parser::run_with_metrics`].
    pub total: Duration,
    pub saturation: SaturationMetrics,
    /// Time spent filtering the stash down to candidates.
    pub select: Duration,
}

/// Timings for the saturation phase.
#[derive(Debug, Default, Clone)]
pub struct SaturationMetrics {
    /// Initial regex pass plus all iterations.
    pub total: Duration,
    pub initial_regex: PassMetrics,
    pub iterations: Vec<PassMetrics>,
}

/// Timing (and node discovery counts) for a single pass.
#[derive(Debug, Default, Clone)]
pub struct PassMetrics {
    pub duration: Duration,
    /// Number of new nodes added to the stash during the pass.
    pub produced: usize,
    /// New nodes produced in this pass; only filled when nodes are recorded.
    pub nodes: Vec<Node>,
    pub rules_considered: usize,
    /// Rules with at least one first-pattern match.
    pub rules_seeded: usize,
}

/// Parser output bundled with timing information.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Non-subsumed nodes per dimension, ordered by dimension then position.
    pub candidates: Vec<Node>,
    pub metrics: RunMetrics,
}
