//! Error taxonomy.
//!
//! Resolution errors (`QueryParseError`, `ServiceNotFoundError`,
//! `PriceNotFoundError`) are recoverable and `Clone` so that a cached failure
//! can be handed out again. Their `Display` output is meant to be shown to an
//! end user as-is.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::values::{Weight, Zone, ZoneRange};

/// A zone number that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidZone {
    #[error("zone must be a positive integer, got {0}")]
    NotPositive(u32),
    #[error("zone {value} is outside the loaded zone range {range}")]
    OutOfRange { value: u32, range: ZoneRange },
    #[error("'{0}' is not a zone number")]
    Unparseable(String),
}

/// A weight that cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidWeight {
    #[error("weight must be greater than 0 lb, got {0}")]
    NotPositive(f64),
    #[error("'{0}' is not a weight in pounds")]
    Unparseable(String),
}

/// A price that cannot be represented exactly in cents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPrice {
    #[error("price must not be negative: '{0}'")]
    Negative(String),
    #[error("price '{0}' has more than two decimal places")]
    TooPrecise(String),
    #[error("'{0}' is not a price")]
    Unparseable(String),
}

/// Raised by the query parser when a line cannot be turned into a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryParseError {
    #[error("query is empty")]
    Empty,
    #[error("query is too long ({len} characters, at most {max} allowed)")]
    TooLong { len: usize, max: usize },
    #[error("no zone found in '{query}' (expected something like 'zone 5' or 'z5')")]
    MissingZone { query: String },
    #[error("no weight found in '{query}' (expected something like '3 lb' or '2 pounds')")]
    MissingWeight { query: String },
    #[error("invalid zone in '{query}': {source}")]
    Zone { query: String, source: InvalidZone },
    #[error("invalid weight in '{query}': {source}")]
    Weight { query: String, source: InvalidWeight },
}

/// Raised when a non-empty fragment matches none of the loaded services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no service matches '{fragment}'; available services: {}", available.join(", "))]
pub struct ServiceNotFoundError {
    pub fragment: String,
    pub available: Vec<String>,
}

/// Raised when the matched service has no entry for the exact zone/weight.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no rate for '{service}' in {zone} at {weight}")]
pub struct PriceNotFoundError {
    pub service: String,
    pub zone: Zone,
    pub weight: Weight,
}

/// Any reason a resolution did not produce a price.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Parse(#[from] QueryParseError),
    #[error(transparent)]
    ServiceNotFound(#[from] ServiceNotFoundError),
    #[error(transparent)]
    PriceNotFound(#[from] PriceNotFoundError),
    #[error("no rate tables are loaded")]
    NotLoaded,
}

impl ResolveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ResolveError::Parse(_) => FailureKind::Parse,
            ResolveError::ServiceNotFound(_) => FailureKind::ServiceNotFound,
            ResolveError::PriceNotFound(_) => FailureKind::PriceNotFound,
            ResolveError::NotLoaded => FailureKind::NotLoaded,
        }
    }

    /// True when the message repeats the query's own text, so two queries
    /// that differ only in case or spacing render differently.
    pub fn quotes_query(&self) -> bool {
        match self {
            ResolveError::Parse(QueryParseError::Empty | QueryParseError::TooLong { .. }) => false,
            ResolveError::Parse(_) | ResolveError::ServiceNotFound(_) => true,
            ResolveError::PriceNotFound(_) | ResolveError::NotLoaded => false,
        }
    }
}

/// Stage-independent tag for a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Parse,
    ServiceNotFound,
    PriceNotFound,
    NotLoaded,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Parse => "parse",
            FailureKind::ServiceNotFound => "service_not_found",
            FailureKind::PriceNotFound => "price_not_found",
            FailureKind::NotLoaded => "not_loaded",
        }
    }
}

/// Raised when a `ShippingService` cannot be built from extracted rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("service name is empty")]
    EmptyName,
    #[error("service '{0}' has no rates")]
    NoRates(String),
    #[error("service '{service}': {source}")]
    Zone { service: String, source: InvalidZone },
    #[error("service '{service}': {source}")]
    Weight { service: String, source: InvalidWeight },
    #[error("service '{service}' lists conflicting prices for {zone} at {weight}")]
    ConflictingRate { service: String, zone: Zone, weight: Weight },
}

/// Raised when a set of services cannot be loaded together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("service '{0}' is listed more than once")]
    DuplicateService(String),
}

/// Errors while reading a rate-table snapshot from disk.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid snapshot {origin}: {source}")]
    Json { origin: String, source: serde_json::Error },
    #[error("service '{service}': invalid zone key: {source}")]
    ZoneKey { service: String, source: InvalidZone },
    #[error("service '{service}': invalid weight key: {source}")]
    WeightKey { service: String, source: InvalidWeight },
    #[error(transparent)]
    Build(#[from] BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_not_found_lists_names() {
        let err = ServiceNotFoundError {
            fragment: "Acme Courier".into(),
            available: vec!["FedEx 2Day".into(), "FedEx Ground".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Acme Courier"));
        assert!(msg.contains("FedEx 2Day, FedEx Ground"));
    }

    #[test]
    fn price_not_found_names_the_lookup() {
        let err = PriceNotFoundError {
            service: "FedEx 2Day".into(),
            zone: Zone::new(5).unwrap(),
            weight: Weight::new(7.5).unwrap(),
        };
        assert_eq!(err.to_string(), "no rate for 'FedEx 2Day' in Zone 5 at 7.5 lb");
    }

    #[test]
    fn resolve_error_kinds() {
        let parse: ResolveError = QueryParseError::Empty.into();
        assert_eq!(parse.kind(), FailureKind::Parse);
        assert_eq!(parse.to_string(), "query is empty");
        assert_eq!(ResolveError::NotLoaded.kind().as_str(), "not_loaded");
    }

    #[test]
    fn only_query_text_errors_quote_the_query() {
        let missing = QueryParseError::MissingZone { query: "FedEx 2Day".into() };
        assert!(ResolveError::Parse(missing).quotes_query());
        assert!(!ResolveError::Parse(QueryParseError::Empty).quotes_query());
        let price = PriceNotFoundError {
            service: "FedEx 2Day".into(),
            zone: Zone::new(5).unwrap(),
            weight: Weight::new(2.5).unwrap(),
        };
        assert!(!ResolveError::PriceNotFound(price).quotes_query());
    }

    #[test]
    fn zone_out_of_range_mentions_range() {
        let range = ZoneRange::new(2, 8).unwrap();
        let err = InvalidZone::OutOfRange { value: 12, range };
        assert_eq!(err.to_string(), "zone 12 is outside the loaded zone range 2-8");
    }
}
