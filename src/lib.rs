//! Shipping rate lookup over extracted rate tables.
//!
//! A free-form line such as `"FedEx 2Day, Zone 5, 3 lb"` is parsed by a small
//! rule engine into a [`ParsedQuery`], the service fragment is matched against
//! the loaded [`ShippingService`]s, and the price is looked up exactly in the
//! matched service's rate table. [`PriceResolver`] ties the stages together and
//! memoizes outcomes in a [`ResultCache`].
//!
//! ```
//! use ratecard::{Price, PriceResolver, ShippingService};
//!
//! let service = ShippingService::builder("FedEx 2Day")
//!     .source("fedex_2025.pdf")
//!     .rate(5, 3.0, "33.31".parse::<Price>().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let resolver = PriceResolver::new();
//! resolver.load(vec![service]).unwrap();
//!
//! let found = resolver.resolve("FedEx 2Day, Zone 5, 3 lb").unwrap();
//! assert_eq!(found.price.to_string(), "33.31");
//! ```

use regex::Regex;

#[macro_use]
mod macros;
mod cache;
pub mod config;
mod engine;
mod error;
mod matcher;
mod query;
mod resolver;
mod rules;
mod serde_duration;
mod service;
mod snapshot;
mod values;

pub use cache::{CacheStats, ResultCache, normalize_key};
pub use crate::config::Settings;
pub use error::{
    BuildError, FailureKind, InvalidPrice, InvalidWeight, InvalidZone, LoadError, PriceNotFoundError,
    QueryParseError, ResolveError, ServiceNotFoundError, SnapshotError,
};
pub use matcher::{DEFAULT_PLACEHOLDERS, MatchKind, ServiceMatch, ServiceMatcher, SubstringMatcher, normalize_name};
pub use query::{Candidate, DEFAULT_MAX_QUERY_LEN, NodeSummary, ParseDetails, ParsedQuery, QueryParser, SaturationPass};
pub use resolver::{CURRENCY, LoadSummary, Outcome, PriceResolver, PriceResult, ResolutionFailure};
pub use service::{ServiceInfo, ShippingService, ShippingServiceBuilder};
pub use snapshot::{load_snapshot, parse_snapshot};
pub use values::{Price, Weight, Zone, ZoneRange};

pub(crate) use engine::BucketMask;

// --- Internal types ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Dimension {
    RegexMatch,
    Numeral,
    Zone,
    Weight,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub dim: Dimension,
    pub kind: TokenKind,
}

#[derive(Debug, Clone)]
pub(crate) struct NumeralData {
    pub value: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ZoneData {
    pub number: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct WeightData {
    pub pounds: f64,
    /// Unit as spelled in the input, lowercased (`lb`, `lbs`, `pound`, `pounds`).
    pub unit: String,
}

#[derive(Debug, Clone)]
pub(crate) enum TokenKind {
    Numeral(NumeralData),
    Zone(ZoneData),
    Weight(WeightData),
    RegexMatch(Vec<String>),
}

// Trait to convert rule production results into tokens
pub(crate) trait IntoToken {
    fn into_token(self) -> Option<Token>;
}

impl IntoToken for NumeralData {
    fn into_token(self) -> Option<Token> {
        Some(Token { dim: Dimension::Numeral, kind: TokenKind::Numeral(self) })
    }
}

impl IntoToken for ZoneData {
    fn into_token(self) -> Option<Token> {
        Some(Token { dim: Dimension::Zone, kind: TokenKind::Zone(self) })
    }
}

impl IntoToken for WeightData {
    fn into_token(self) -> Option<Token> {
        Some(Token { dim: Dimension::Weight, kind: TokenKind::Weight(self) })
    }
}

// Pattern items used by rules: either a Regex to match text, or a Predicate
// that matches an existing token in the stash.
#[derive(Debug)]
pub(crate) enum Pattern {
    /// Match a regular expression against the original input. The `Regex`
    /// is stored as a static reference (created via the `regex!` helper macro
    /// in `src/macros.rs`).
    Regex(&'static Regex),

    /// Match an already-discovered `Token` using a predicate function. This
    /// allows rules to combine previously found tokens (from the `Stash`).
    Predicate(fn(&Token) -> bool),
}

pub(crate) type Production = Box<dyn Fn(&[Token]) -> Option<Token> + Send + Sync>;

/// A parsing rule: a name, a positional `pattern` (vector of `Pattern` items)
/// and a `production` function that receives the matched tokens and
/// optionally returns a new `Token`.
pub(crate) struct Rule {
    pub name: &'static str,
    pub pattern: Vec<Pattern>,
    pub production: Production,
    /// Bucket mask - rule only activates if input has matching buckets.
    pub buckets: u32,
    /// Required dimensions in stash before this rule activates.
    pub deps: &'static [Dimension],
    /// Priority for deterministic tie-breaking (higher = preferred).
    pub priority: u16,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("production", &"<function>")
            .field("buckets", &self.buckets)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Range {
    /// Start byte index (inclusive).
    pub start: usize,
    /// End byte index (exclusive).
    pub end: usize,
}

/// Basic parse tree node produced by rules. `Node` pairs a `Token` with the
/// consumed `Range` from the original input.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub range: Range,
    pub token: Token,
    /// Name of the rule that produced this node.
    pub rule_name: &'static str,
    /// Names of rules that directly contributed to producing this node.
    pub evidence: Vec<&'static str>,
}

// --- Stash: lightweight container for discovered nodes ----------------------

#[derive(Debug, Clone)]
pub(crate) struct Stash {
    nodes: Vec<Node>,
}

impl Stash {
    /// Create an empty `Stash`.
    pub fn empty() -> Self {
        Stash { nodes: Vec::new() }
    }

    /// Return true if the stash is empty.
    pub fn null(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow the nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return nodes sorted by `(start, end)`.
    pub fn to_pos_ordered_list(&self) -> Vec<Node> {
        let mut v = self.nodes.clone();
        v.sort_by_key(|n| (n.range.start, n.range.end));
        v
    }

    /// Return nodes sorted and filtered to those starting at or after `position`.
    pub fn to_pos_ordered_list_from(&self, position: usize) -> Vec<Node> {
        self.to_pos_ordered_list().into_iter().filter(|n| n.range.start >= position).collect()
    }

    /// Union two stashes; nodes with the same span, dimension, rule and value
    /// are kept once.
    pub fn union(&self, other: &Stash) -> Stash {
        let mut combined = self.nodes.clone();
        combined.extend(other.nodes.iter().cloned());

        combined.sort_by_key(|n| (n.range.start, n.range.end));
        combined.dedup_by(|a, b| {
            if a.range != b.range || a.token.dim != b.token.dim || a.rule_name != b.rule_name {
                return false;
            }

            match (&a.token.kind, &b.token.kind) {
                (TokenKind::Numeral(da), TokenKind::Numeral(db)) => da.value == db.value,
                (TokenKind::Zone(za), TokenKind::Zone(zb)) => za.number == zb.number,
                (TokenKind::Weight(wa), TokenKind::Weight(wb)) => wa.pounds == wb.pounds && wa.unit == wb.unit,
                (TokenKind::RegexMatch(ga), TokenKind::RegexMatch(gb)) => ga.first() == gb.first(),
                _ => false,
            }
        });

        Stash { nodes: combined }
    }

    /// Insert a node into the stash (appends to internal vector).
    pub fn insert(&mut self, node: Node) {
        self.nodes.push(node);
    }
}
