//! Matching and saturation parser.
//!
//! This module is the operational core of the engine:
//!
//! - Select the rules that are plausible for the input (bucket gating; see
//!   `compiled_rules.rs` and `trigger.rs`).
//! - Repeatedly apply those rules to build up a `Stash` of `Node`s.
//! - Deduplicate produced nodes to keep saturation finite and deterministic
//!   (see `dedup.rs`).
//! - Drop nodes subsumed by a longer node of the same dimension and hand the
//!   remaining candidates to `assemble.rs`.
//!
//! ## Pass structure
//!
//! ```text
//! (0) trigger scan         -> buckets
//! (1) initial regex pass   -> seed from raw input (numerals, zones)
//! (2) iterative passes     -> predicate rules compose stash nodes (weights)
//! (3) select               -> non-subsumed candidates per dimension
//! ```
//!
//! Output is deterministic for a given input and rule set.
//!
//! ## Debugging
//!
//! Rule activation and production are traced at `TRACE` level under the
//! `ratecard::engine` target, e.g. `RUST_LOG=ratecard::engine=trace`.

use super::compiled_rules::{BUCKETS, CompiledRules, DimensionSet, RuleId};
use super::dedup::NodeKey;
use super::metrics::{PassMetrics, RunMetrics, RunResult, SaturationMetrics};
use super::trigger::TriggerInfo;
use crate::{Dimension, Node, Pattern, Range, Rule, Stash, Token, TokenKind};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::time::Instant;
use tracing::trace;

/// A partially matched rule as the engine advances through its pattern.
/// `route` holds the matched `Node`s so far.
///
/// ```text
/// pattern: [Predicate(is_numeral), Regex("\s*lbs?")]
///           ^ consumed          ^ next_idx = 1
///
/// route: [ Node(range:0..1, dim:Numeral) ]
/// position points to the end of the last consumed node (here: 1)
/// ```
struct PartialMatch<'a> {
    rule: &'a Rule,
    next_idx: usize,
    position: usize,
    route: Vec<Node>,
}

/// Parser orchestrates applying `Rule`s against one query line.
///
/// ```text
/// new_compiled() -> saturate() -> select_candidates()
///                     │             └─ discard subsumed nodes
///                     └─ repeatedly grow stash using rules
/// ```
#[derive(Debug)]
pub struct Parser<'a> {
    input: &'a str,
    stash: Stash,
    /// Keys of nodes already in the stash.
    seen: HashSet<NodeKey>,
    compiled: &'a CompiledRules<'a>,
    /// Active rules whose pattern starts with a `Regex`.
    regex_rules: Vec<&'a Rule>,
    /// Active rules whose pattern starts with a `Predicate`.
    predicate_rules: Vec<&'a Rule>,
    /// Keep per-pass node lists in the metrics.
    record_nodes: bool,
}

impl<'a> Parser<'a> {
    /// Create a new `Parser` for `input` using pre-compiled rules.
    pub fn new_compiled(input: &'a str, compiled: &'a CompiledRules<'a>) -> Self {
        let trigger_info = TriggerInfo::scan(input);
        trace!(buckets = ?trigger_info.buckets, "trigger scan");

        let mut active_rule_ids: HashSet<RuleId> = compiled.index.always_on.iter().copied().collect();
        for (bit, slot) in BUCKETS {
            if trigger_info.buckets.contains(bit) {
                active_rule_ids.extend(&compiled.index.by_bucket[slot]);
            }
        }

        // A rule with several buckets needs all of them.
        active_rule_ids.retain(|&id| trigger_info.buckets.contains(compiled.metas[id].buckets));

        let (regex_rules, predicate_rules): (Vec<&Rule>, Vec<&Rule>) = compiled
            .rules
            .iter()
            .enumerate()
            .filter(|(id, _)| active_rule_ids.contains(id))
            .map(|(_, r)| *r)
            .partition(|r| matches!(r.pattern.first(), Some(Pattern::Regex(_))));

        trace!(
            active = active_rule_ids.len(),
            total = compiled.rules.len(),
            regex = regex_rules.len(),
            predicate = predicate_rules.len(),
            "active rules"
        );

        Parser {
            input,
            stash: Stash::empty(),
            seen: HashSet::new(),
            compiled,
            regex_rules,
            predicate_rules,
            record_nodes: false,
        }
    }

    /// Keep the nodes produced by each pass in the returned metrics.
    pub fn with_recorded_nodes(mut self, record: bool) -> Self {
        self.record_nodes = record;
        self
    }

    pub(crate) fn active_rule_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.regex_rules.iter().chain(self.predicate_rules.iter()).map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn regex_node(caps: &Captures<'_>) -> Option<Node> {
        let m = caps.get(0)?;
        let groups: Vec<String> = caps.iter().flatten().map(|g| g.as_str().to_lowercase()).collect();
        Some(Node {
            range: Range { start: m.start(), end: m.end() },
            token: Token { dim: Dimension::RegexMatch, kind: TokenKind::RegexMatch(groups) },
            rule_name: "<regex>",
            evidence: Vec::new(),
        })
    }

    /// Find the leftmost regex match that starts exactly at `position`.
    ///
    /// `captures_at` keeps the surrounding text visible, so `\b` behaves the
    /// same as when scanning the whole input.
    fn regex_at(&self, re: &Regex, position: usize) -> Option<Node> {
        if position > self.input.len() {
            return None;
        }
        re.captures_at(self.input, position)
            .filter(|caps| caps.get(0).is_some_and(|m| m.start() == position))
            .and_then(|caps| Self::regex_node(&caps))
    }

    /// Find nodes that match `pat` and start exactly at `position`.
    ///
    /// ```text
    /// input: "zone 5, 3 lb"
    /// position: 9 (end of "3")
    /// Pattern::Regex("\s*lbs?") -> Node at 9..12
    /// Pattern::Predicate(is_numeral) -> nodes pulled from stash at same offset
    /// ```
    fn lookup_item(&self, pat: &Pattern, position: usize) -> Vec<Node> {
        match pat {
            Pattern::Regex(re) => self.regex_at(re, position).into_iter().collect(),
            Pattern::Predicate(pred) => self
                .stash
                .to_pos_ordered_list_from(position)
                .into_iter()
                .filter(|n| n.range.start == position && pred(&n.token))
                .collect(),
        }
    }

    /// Find nodes that match `pat` anywhere in the input.
    fn lookup_item_anywhere(&self, pat: &Pattern) -> Vec<Node> {
        match pat {
            Pattern::Regex(re) => re.captures_iter(self.input).filter_map(|caps| Self::regex_node(&caps)).collect(),
            Pattern::Predicate(pred) => {
                self.stash.to_pos_ordered_list().into_iter().filter(|n| pred(&n.token)).collect()
            }
        }
    }

    /// Match a rule's first pattern anywhere and return the initial partial
    /// matches.
    fn seed_first_pattern_anywhere(&self, rule: &'a Rule) -> Vec<PartialMatch<'a>> {
        let Some(first) = rule.pattern.first() else {
            return Vec::new();
        };
        self.lookup_item_anywhere(first)
            .into_iter()
            .map(|node| PartialMatch { rule, next_idx: 1, position: node.range.end, route: vec![node] })
            .collect()
    }

    /// Depth-first expansion of partial matches until each rule pattern is
    /// fully consumed. Uses an explicit stack instead of recursion.
    fn match_all(&self, input_matches: Vec<PartialMatch<'a>>) -> Vec<PartialMatch<'a>> {
        let mut results = Vec::new();
        let mut stack: Vec<PartialMatch<'a>> = input_matches;

        while let Some(m) = stack.pop() {
            if m.next_idx >= m.rule.pattern.len() {
                results.push(m);
                continue;
            }

            let pat = &m.rule.pattern[m.next_idx];
            let nodes = self.lookup_item(pat, m.position);

            // Reverse so the stack explores in forward order.
            for node in nodes.into_iter().rev() {
                let mut new_route = m.route.clone();
                let position = node.range.end;
                new_route.push(node);
                stack.push(PartialMatch { rule: m.rule, next_idx: m.next_idx + 1, position, route: new_route });
            }
        }

        results
    }

    /// Turn a completed match into a `Node` via the rule's production.
    fn produce_node(&self, m: &PartialMatch) -> Option<Node> {
        if m.next_idx < m.rule.pattern.len() {
            return None;
        }
        let (first, last) = (m.route.first()?, m.route.last()?);
        let tokens: Vec<Token> = m.route.iter().map(|n| n.token.clone()).collect();

        let Some(tok) = (m.rule.production)(&tokens) else {
            trace!(rule = m.rule.name, "production rejected match");
            return None;
        };

        let range = Range { start: first.range.start, end: last.range.end };
        trace!(
            rule = m.rule.name,
            span = ?(range.start..range.end),
            text = self.input.get(range.start..range.end).unwrap_or(""),
            token = ?tok,
            "production ok"
        );

        let mut evidence = Vec::new();
        for node in &m.route {
            evidence.push(node.rule_name);
            evidence.extend_from_slice(&node.evidence);
        }
        Some(Node { range, token: tok, rule_name: m.rule.name, evidence })
    }

    /// Apply a set of rules once and return the produced nodes along with
    /// the number of rules that seeded at least one match.
    fn apply_rules_once(&self, rule_set: &[&'a Rule]) -> (Vec<Node>, usize) {
        let mut discovered = Vec::new();
        let mut rules_seeded = 0;

        for rule in rule_set {
            let starts = self.seed_first_pattern_anywhere(rule);
            if starts.is_empty() {
                continue;
            }
            rules_seeded += 1;
            trace!(rule = rule.name, seeds = starts.len(), "rule seeded");

            for m in self.match_all(starts) {
                if let Some(node) = self.produce_node(&m) {
                    discovered.push(node);
                }
            }
        }
        (discovered, rules_seeded)
    }

    fn dimensions_in_stash(&self) -> DimensionSet {
        self.stash.nodes().iter().fold(DimensionSet::empty(), |dims, node| dims | DimensionSet::of(node.token.dim))
    }

    fn deps_satisfied(rule: &Rule, dims_in_stash: DimensionSet) -> bool {
        rule.deps.iter().all(|&dep| dims_in_stash.contains(DimensionSet::of(dep)))
    }

    /// Add unseen nodes to the stash and report the pass.
    fn absorb(&mut self, discovered: Vec<Node>, started: Instant, considered: usize, seeded: usize) -> PassMetrics {
        let mut newly_added = Stash::empty();
        for node in discovered {
            if self.seen.insert(NodeKey::from_node(&node)) {
                newly_added.insert(node);
            }
        }
        let produced = newly_added.nodes().len();
        let nodes = if self.record_nodes { newly_added.nodes().to_vec() } else { Vec::new() };
        if !newly_added.null() {
            self.stash = self.stash.union(&newly_added);
        }
        PassMetrics { duration: started.elapsed(), produced, nodes, rules_considered: considered, rules_seeded: seeded }
    }

    /// Saturate the stash by repeatedly applying rules until a fixpoint.
    ///
    /// ```text
    /// regex_rules pass
    ///      │
    ///      ▼
    ///  stash grows ──┐
    ///                │ predicate + regex passes
    ///                └── repeat until fixed point
    /// ```
    fn saturate(&mut self) -> SaturationMetrics {
        let mut metrics = SaturationMetrics::default();
        let saturation_start = Instant::now();

        let regex_start = Instant::now();
        let regex_rules = self.regex_rules.clone();
        let (discovered, seeded) = self.apply_rules_once(&regex_rules);
        metrics.initial_regex = self.absorb(discovered, regex_start, regex_rules.len(), seeded);
        if metrics.initial_regex.produced == 0 {
            metrics.total = saturation_start.elapsed();
            return metrics;
        }

        let all_saturate_rules: Vec<&Rule> =
            self.predicate_rules.iter().chain(self.regex_rules.iter()).copied().collect();

        loop {
            let iteration_start = Instant::now();
            let dims_in_stash = self.dimensions_in_stash();
            let saturate_rules: Vec<&Rule> =
                all_saturate_rules.iter().filter(|rule| Self::deps_satisfied(rule, dims_in_stash)).copied().collect();

            let (discovered, seeded) = self.apply_rules_once(&saturate_rules);
            let pass = self.absorb(discovered, iteration_start, saturate_rules.len(), seeded);
            let produced = pass.produced;
            metrics.iterations.push(pass);
            if produced == 0 {
                break;
            }
        }

        metrics.total = saturation_start.elapsed();
        metrics
    }

    /// Keep, per dimension, the nodes not strictly contained in a longer node
    /// of the same dimension. Raw regex matches are dropped.
    fn select_candidates(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> =
            self.stash.nodes().iter().filter(|n| n.token.dim != Dimension::RegexMatch).cloned().collect();

        nodes.sort_by(|a, b| {
            let priority_a = self.compiled.priority_of(a.rule_name);
            let priority_b = self.compiled.priority_of(b.rule_name);

            (a.token.dim as u8)
                .cmp(&(b.token.dim as u8))
                .then(a.range.start.cmp(&b.range.start))
                .then(b.range.end.cmp(&a.range.end))
                // Higher priority wins when ranges are equal.
                .then(priority_b.cmp(&priority_a))
        });

        let mut filtered: Vec<Node> = Vec::new();
        let mut last_kept_dim = None;
        let mut last_kept_range: Option<Range> = None;

        for node in nodes {
            if last_kept_dim != Some(node.token.dim) {
                last_kept_dim = Some(node.token.dim);
                last_kept_range = None;
            }

            let is_subsumed = last_kept_range.is_some_and(|range| {
                range.start <= node.range.start && range.end >= node.range.end && range != node.range
            });

            if !is_subsumed {
                last_kept_range = Some(node.range);
                filtered.push(node);
            }
        }

        filtered
    }

    /// Saturate and select candidates, returning timing details.
    pub fn run_with_metrics(mut self) -> RunResult {
        let total_start = Instant::now();
        let saturation = self.saturate();
        let select_start = Instant::now();
        let candidates = self.select_candidates();
        let select = select_start.elapsed();

        RunResult { candidates, metrics: RunMetrics { total: total_start.elapsed(), saturation, select } }
    }

    /// Saturate and select candidates. Use [`Parser::run_with_metrics`] to
    /// inspect stage-by-stage durations.
    pub fn run(self) -> Vec<Node> {
        self.run_with_metrics().candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compiled;

    fn dims(input: &str) -> Vec<(Dimension, &str)> {
        Parser::new_compiled(input, compiled())
            .run()
            .into_iter()
            .map(|n| (n.token.dim, &input[n.range.start..n.range.end]))
            .collect()
    }

    #[test]
    fn finds_zone_and_weight() {
        let found = dims("FedEx 2Day, Zone 5, 3 lb");
        assert!(found.contains(&(Dimension::Zone, "Zone 5")));
        assert!(found.contains(&(Dimension::Weight, "3 lb")));
    }

    #[test]
    fn weight_needs_a_unit() {
        let found = dims("zone 5 3");
        assert!(found.iter().all(|(dim, _)| *dim != Dimension::Weight));
    }

    #[test]
    fn unit_must_end_at_word_boundary() {
        let found = dims("zone 5 3 lbx");
        assert!(found.iter().all(|(dim, _)| *dim != Dimension::Weight));
    }

    #[test]
    fn saturation_reaches_fixpoint_with_passes() {
        let result = Parser::new_compiled("zone 5, 2 lb", compiled()).with_recorded_nodes(true).run_with_metrics();
        let sat = &result.metrics.saturation;
        assert!(sat.initial_regex.produced > 0);
        assert_eq!(sat.iterations.last().map(|p| p.produced), Some(0));
        assert_eq!(sat.initial_regex.nodes.len(), sat.initial_regex.produced);
    }

    #[test]
    fn no_digits_activates_nothing_useful() {
        let parser = Parser::new_compiled("FedEx 2Day", compiled());
        assert!(!parser.active_rule_names().iter().any(|n| n.starts_with("zone")));
        assert!(dims("FedEx Ground").is_empty());
    }
}
