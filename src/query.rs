use crate::engine::{self, Parser, PassMetrics};
use crate::error::QueryParseError;
use crate::values::{Weight, Zone, ZoneRange};
use crate::{Dimension, Node, TokenKind};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest query accepted, in characters.
pub const DEFAULT_MAX_QUERY_LEN: usize = 500;

/// A structured query: the service fragment plus a validated zone and weight.
///
/// Only produced by [`QueryParser`]; a query without zone or weight is never
/// constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    fragment: String,
    zone: Zone,
    weight: Weight,
}

impl ParsedQuery {
    pub(crate) fn new(fragment: String, zone: Zone, weight: Weight) -> Self {
        ParsedQuery { fragment, zone, weight }
    }

    /// Text presumed to name the service; empty when the query had none.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn has_fragment(&self) -> bool {
        !self.fragment.is_empty()
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_fragment() {
            write!(f, "{}, {}, {}", self.fragment, self.zone, self.weight)
        } else {
            write!(f, "{}, {}", self.zone, self.weight)
        }
    }
}

/// Turns free-form query lines into [`ParsedQuery`]s.
///
/// ```
/// use ratecard::QueryParser;
///
/// let q = QueryParser::new().parse("2lb to zone 5").unwrap();
/// assert_eq!(q.zone().value(), 5);
/// assert_eq!(q.weight().pounds(), 2.0);
/// assert!(!q.has_fragment());
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    zones: Option<ZoneRange>,
    max_len: usize,
}

impl Default for QueryParser {
    fn default() -> Self {
        QueryParser { zones: None, max_len: DEFAULT_MAX_QUERY_LEN }
    }
}

impl QueryParser {
    /// A parser that accepts any positive zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject zones outside `range`.
    pub fn with_zone_range(mut self, range: Option<ZoneRange>) -> Self {
        self.zones = range;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn zone_range(&self) -> Option<ZoneRange> {
        self.zones
    }

    fn check_input<'q>(&self, raw: &'q str) -> Result<&'q str, QueryParseError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(QueryParseError::Empty);
        }
        let len = text.chars().count();
        if len > self.max_len {
            return Err(QueryParseError::TooLong { len, max: self.max_len });
        }
        Ok(text)
    }

    pub fn parse(&self, raw: &str) -> Result<ParsedQuery, QueryParseError> {
        let text = self.check_input(raw)?;
        let candidates = Parser::new_compiled(text, engine::compiled()).run();
        let parsed = engine::assemble(text, &candidates, self.zones);
        log_parse(text, &parsed);
        parsed
    }

    /// Parse `raw` and also return a compact trace of what the engine did.
    ///
    /// The default [`QueryParser::parse`] path does not allocate these traces.
    pub fn parse_verbose(&self, raw: &str) -> (Result<ParsedQuery, QueryParseError>, ParseDetails) {
        let text = match self.check_input(raw) {
            Ok(text) => text,
            Err(err) => return (Err(err), ParseDetails::default()),
        };

        let parser = Parser::new_compiled(text, engine::compiled()).with_recorded_nodes(true);
        let active_rules = parser.active_rule_names();
        let run = parser.run_with_metrics();

        let assemble_start = Instant::now();
        let parsed = engine::assemble(text, &run.candidates, self.zones);
        let assemble = assemble_start.elapsed();
        log_parse(text, &parsed);

        let sat = &run.metrics.saturation;
        let saturation = std::iter::once(sat.initial_regex.clone())
            .chain(sat.iterations.iter().cloned())
            .enumerate()
            .map(|(idx, pass)| SaturationPass::from_metrics(idx, &pass, text))
            .collect();

        let details = ParseDetails {
            total: run.metrics.total + assemble,
            saturation_total: sat.total,
            saturation,
            select: run.metrics.select,
            assemble,
            active_rules,
            candidates: run.candidates.iter().map(|n| Candidate::from_node(text, n)).collect(),
        };

        (parsed, details)
    }
}

fn log_parse(text: &str, parsed: &Result<ParsedQuery, QueryParseError>) {
    match parsed {
        Ok(q) => debug!(query = text, fragment = q.fragment(), zone = q.zone().value(), weight = q.weight().pounds(), "parsed query"),
        Err(err) => debug!(query = text, error = %err, "query rejected"),
    }
}

/// A zone, weight or numeral token the engine found.
///
/// `start`/`end` are byte offsets into the trimmed query.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    /// Dimension name: `zone`, `weight` or `numeral`.
    pub name: &'static str,
    /// Slice of the query that matched.
    pub body: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
    /// Name of the rule that produced this candidate.
    pub rule: &'static str,
}

impl Candidate {
    fn from_node(input: &str, node: &Node) -> Self {
        Candidate {
            name: dimension_name(node.token.dim),
            body: input.get(node.range.start..node.range.end).unwrap_or("").to_string(),
            value: format_token_preview(&node.token.kind),
            start: node.range.start,
            end: node.range.end,
            rule: node.rule_name,
        }
    }
}

/// A compact per-pass saturation trace.
#[derive(Debug, Clone, Serialize)]
pub struct SaturationPass {
    pub pass: usize,
    #[serde(rename = "duration_ms", with = "crate::serde_duration")]
    pub duration: Duration,
    pub produced: usize,
    pub rules_considered: usize,
    pub rules_seeded: usize,
    pub samples: Vec<NodeSummary>,
}

impl SaturationPass {
    fn from_metrics(pass: usize, metrics: &PassMetrics, input: &str) -> Self {
        SaturationPass {
            pass,
            duration: metrics.duration,
            produced: metrics.produced,
            rules_considered: metrics.rules_considered,
            rules_seeded: metrics.rules_seeded,
            samples: metrics.nodes.iter().take(8).map(|n| NodeSummary::from_node(input, n)).collect(),
        }
    }
}

/// A compact node summary used in verbose traces.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub start: usize,
    pub end: usize,
    pub rule: &'static str,
    pub text: String,
    pub preview: String,
}

impl NodeSummary {
    fn from_node(input: &str, node: &Node) -> Self {
        NodeSummary {
            start: node.range.start,
            end: node.range.end,
            rule: node.rule_name,
            text: input.get(node.range.start..node.range.end).unwrap_or("").to_string(),
            preview: format_token_preview(&node.token.kind),
        }
    }
}

/// Additional details returned by [`QueryParser::parse_verbose`].
///
/// Compact by intent: enough for debugging and timing without dumping the
/// entire stash. Empty when the query was rejected before the engine ran.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseDetails {
    #[serde(rename = "total_ms", with = "crate::serde_duration")]
    pub total: Duration,
    #[serde(rename = "saturation_ms", with = "crate::serde_duration")]
    pub saturation_total: Duration,
    pub saturation: Vec<SaturationPass>,
    /// Time spent dropping subsumed nodes.
    #[serde(rename = "select_ms", with = "crate::serde_duration")]
    pub select: Duration,
    /// Time spent picking zone, weight and fragment.
    #[serde(rename = "assemble_ms", with = "crate::serde_duration")]
    pub assemble: Duration,
    /// Names of rules that were active for this input.
    pub active_rules: Vec<&'static str>,
    pub candidates: Vec<Candidate>,
}

fn dimension_name(dim: Dimension) -> &'static str {
    match dim {
        Dimension::RegexMatch => "regex",
        Dimension::Numeral => "numeral",
        Dimension::Zone => "zone",
        Dimension::Weight => "weight",
    }
}

fn format_token_preview(kind: &TokenKind) -> String {
    let s = match kind {
        TokenKind::Numeral(n) => format!("({})", n.value),
        TokenKind::Zone(z) => format!("zone {}", z.number),
        TokenKind::Weight(w) => format!("{} lb ({})", w.pounds, w.unit),
        TokenKind::RegexMatch(groups) => groups.first().cloned().unwrap_or_default(),
    };
    s.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_overlong() {
        let parser = QueryParser::new();
        assert_eq!(parser.parse("   "), Err(QueryParseError::Empty));

        let long = format!("zone 5 2 lb {}", "x".repeat(600));
        assert!(matches!(parser.parse(&long), Err(QueryParseError::TooLong { max: 500, .. })));
        assert!(QueryParser::new().with_max_len(1000).parse(&long).is_ok());
    }

    #[test]
    fn zone_range_is_enforced() {
        let parser = QueryParser::new().with_zone_range(ZoneRange::new(2, 8));
        assert!(matches!(parser.parse("zone 9, 2 lb"), Err(QueryParseError::Zone { .. })));
        assert!(parser.parse("zone 8, 2 lb").is_ok());
        assert!(QueryParser::new().parse("zone 9, 2 lb").is_ok());
    }

    #[test]
    fn verbose_includes_metrics_and_rules() {
        let (parsed, details) = QueryParser::new().parse_verbose("FedEx 2Day, zone 5, 3 lb");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.fragment(), "FedEx 2Day");
        assert!(details.saturation_total <= details.total);
        assert!(!details.active_rules.is_empty());
        assert!(details.candidates.iter().any(|c| c.name == "zone" && c.body == "zone 5"));
        assert!(details.candidates.iter().any(|c| c.name == "weight" && c.body == "3 lb"));
        assert_eq!(details.saturation[0].pass, 0);
    }

    #[test]
    fn verbose_on_rejected_input_has_empty_details() {
        let (parsed, details) = QueryParser::new().parse_verbose("");
        assert_eq!(parsed, Err(QueryParseError::Empty));
        assert!(details.candidates.is_empty());
        assert!(details.saturation.is_empty());
    }

    #[test]
    fn display_round_trips_through_parser() {
        let q = QueryParser::new().parse("ups ground z4 10 pounds").unwrap();
        assert_eq!(q.to_string(), "ups ground, Zone 4, 10 lb");
        assert_eq!(QueryParser::new().parse(&q.to_string()).unwrap(), q);
    }
}
