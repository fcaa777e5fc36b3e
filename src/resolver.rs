//! Price resolution: parse, match, look up.
//!
//! ```text
//! raw ──> QueryParser ──> ServiceMatcher ──> ShippingService::lookup ──> Outcome
//!   └──────────── ResultCache (normalized raw -> Outcome) ─────────────────┘
//! ```
//!
//! The loaded service set, the parser configured for its zone range and the
//! cache live together in one immutable `Snapshot`. `load` builds a new
//! snapshot and swaps it in, so a reload drops the old cache in the same step
//! and no call observes a mix of old and new tables.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::cache::{CacheStats, ResultCache};
use crate::config::Settings;
use crate::error::{FailureKind, LoadError, ResolveError};
use crate::matcher::{MatchKind, ServiceMatcher, SubstringMatcher};
use crate::query::{ParseDetails, ParsedQuery, QueryParser};
use crate::service::{ServiceInfo, ShippingService};
use crate::values::{Price, Weight, Zone, ZoneRange};

pub const CURRENCY: &str = "USD";

/// Result of resolving one query line.
pub type Outcome = Result<PriceResult, ResolutionFailure>;

/// A resolved price with the facts it was resolved from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceResult {
    pub price: Price,
    pub currency: &'static str,
    pub service: String,
    pub zone: Zone,
    pub weight: Weight,
    pub source_document: Option<String>,
    pub match_kind: MatchKind,
    pub resolved_at: DateTime<Utc>,
    /// Wall-clock time of the call that returned this result.
    #[serde(rename = "elapsed_ms", with = "crate::serde_duration")]
    pub elapsed: Duration,
}

impl PriceResult {
    /// True when the query named no usable service and the first loaded
    /// service was used instead.
    pub fn is_best_effort(&self) -> bool {
        self.match_kind == MatchKind::Fallback
    }
}

/// A resolution that produced no price. Every stage fails with this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionFailure {
    error: ResolveError,
    elapsed: Duration,
}

impl ResolutionFailure {
    pub(crate) fn new(error: ResolveError, elapsed: Duration) -> Self {
        ResolutionFailure { error, elapsed }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    /// End-user message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn error(&self) -> &ResolveError {
        &self.error
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Loaded service names, filled only when no service matched.
    pub fn available_services(&self) -> &[String] {
        match &self.error {
            ResolveError::ServiceNotFound(err) => &err.available,
            _ => &[],
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for ResolutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl Serialize for ResolutionFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let available = self.available_services();
        let mut state = serializer.serialize_struct("ResolutionFailure", 4)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.message())?;
        if available.is_empty() {
            state.skip_field("available_services")?;
        } else {
            state.serialize_field("available_services", available)?;
        }
        state.serialize_field("elapsed_ms", &(self.elapsed.as_nanos() as f64 / 1_000_000.0))?;
        state.end()
    }
}

/// What a successful [`PriceResolver::load`] installed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub services: usize,
    pub rates: usize,
    pub zone_range: Option<ZoneRange>,
    /// Increments with every load.
    pub generation: u64,
}

#[derive(Debug)]
struct Snapshot {
    services: Vec<ShippingService>,
    parser: QueryParser,
    cache: ResultCache,
    generation: u64,
}

/// Owns the loaded rate tables and answers price queries.
///
/// `PriceResolver` is `Send + Sync`; share it behind an `Arc` and call
/// [`PriceResolver::resolve`] from any thread.
#[derive(Debug)]
pub struct PriceResolver {
    state: RwLock<Arc<Snapshot>>,
    matcher: Box<dyn ServiceMatcher>,
    cache_enabled: bool,
    cache_ttl: Option<Duration>,
    max_query_len: usize,
}

impl Default for PriceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceResolver {
    /// A resolver with default settings and nothing loaded.
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let cache_ttl = settings.cache_ttl();
        PriceResolver {
            state: RwLock::new(Arc::new(build_snapshot(Vec::new(), 0, settings.max_query_len, cache_ttl))),
            matcher: Box::new(SubstringMatcher::with_placeholders(&settings.placeholder_services)),
            cache_enabled: settings.cache_enabled,
            cache_ttl,
            max_query_len: settings.max_query_len,
        }
    }

    /// Replace the service-matching strategy.
    pub fn with_matcher(mut self, matcher: impl ServiceMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read())
    }

    /// Install `services` (in load order), replacing whatever was loaded and
    /// discarding every cached outcome.
    pub fn load(&self, services: Vec<ShippingService>) -> Result<LoadSummary, LoadError> {
        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.name().to_lowercase()) {
                return Err(LoadError::DuplicateService(service.name().to_string()));
            }
        }

        let rates = services.iter().map(ShippingService::len).sum();
        let count = services.len();

        let mut state = self.state.write();
        let generation = state.generation + 1;
        let snapshot = build_snapshot(services, generation, self.max_query_len, self.cache_ttl);
        let zone_range = snapshot.parser.zone_range();
        *state = Arc::new(snapshot);
        drop(state);

        info!(
            services = count,
            rates,
            zones = %zone_range.map(|r| r.to_string()).unwrap_or_else(|| "none".into()),
            generation,
            "rate tables loaded"
        );
        Ok(LoadSummary { services: count, rates, zone_range, generation })
    }

    /// Resolve `raw` to a price, serving repeated queries from the cache.
    ///
    /// `elapsed` on the returned outcome always covers this call, cache hit
    /// or not.
    pub fn resolve(&self, raw: &str) -> Outcome {
        let started = Instant::now();
        let snapshot = self.current();
        if snapshot.services.is_empty() {
            return Err(ResolutionFailure::new(ResolveError::NotLoaded, started.elapsed()));
        }

        let outcome = if self.cache_enabled {
            snapshot.cache.get_or_compute_if(raw, || self.compute(&snapshot, raw, started), is_cacheable)
        } else {
            self.compute(&snapshot, raw, started)
        };
        restamp(outcome, started)
    }

    /// Resolve `raw` without reading or filling the cache.
    pub fn resolve_uncached(&self, raw: &str) -> Outcome {
        let started = Instant::now();
        let snapshot = self.current();
        if snapshot.services.is_empty() {
            return Err(ResolutionFailure::new(ResolveError::NotLoaded, started.elapsed()));
        }
        self.compute(&snapshot, raw, started)
    }

    /// Resolve `raw` uncached and return the parser trace alongside.
    pub fn explain(&self, raw: &str) -> (Outcome, ParseDetails) {
        let started = Instant::now();
        let snapshot = self.current();
        let (parsed, details) = snapshot.parser.parse_verbose(raw);
        if snapshot.services.is_empty() {
            return (Err(ResolutionFailure::new(ResolveError::NotLoaded, started.elapsed())), details);
        }
        let outcome = parsed
            .map_err(ResolveError::from)
            .and_then(|query| self.price_for(&snapshot, &query, started))
            .map_err(|error| ResolutionFailure::new(error, started.elapsed()));
        (outcome, details)
    }

    fn compute(&self, snapshot: &Snapshot, raw: &str, started: Instant) -> Outcome {
        let outcome = snapshot
            .parser
            .parse(raw)
            .map_err(ResolveError::from)
            .and_then(|query| self.price_for(snapshot, &query, started))
            .map_err(|error| ResolutionFailure::new(error, started.elapsed()));

        match &outcome {
            Ok(found) => debug!(query = raw, service = %found.service, price = %found.price, "resolved"),
            Err(failure) => debug!(query = raw, kind = failure.kind().as_str(), error = %failure, "not resolved"),
        }
        outcome
    }

    fn price_for(&self, snapshot: &Snapshot, query: &ParsedQuery, started: Instant) -> Result<PriceResult, ResolveError> {
        let found = self.matcher.find(query.fragment(), &snapshot.services)?;
        let price = found.service.lookup(query.zone(), query.weight())?;

        Ok(PriceResult {
            price,
            currency: CURRENCY,
            service: found.service.name().to_string(),
            zone: query.zone(),
            weight: query.weight(),
            source_document: found.service.source().map(str::to_string),
            match_kind: found.kind,
            resolved_at: Utc::now(),
            elapsed: started.elapsed(),
        })
    }

    /// Loaded services in load order.
    pub fn services(&self) -> Vec<ServiceInfo> {
        self.current().services.iter().map(ShippingService::info).collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.current().services.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn zone_range(&self) -> Option<ZoneRange> {
        self.current().parser.zone_range()
    }

    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.current().cache.stats()
    }

    pub fn clear_cache(&self) {
        self.current().cache.clear();
    }

    /// Drop expired cache entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.current().cache.purge_expired()
    }
}

fn build_snapshot(services: Vec<ShippingService>, generation: u64, max_len: usize, ttl: Option<Duration>) -> Snapshot {
    let zones = ZoneRange::covering(services.iter().flat_map(|s| s.zones()));
    Snapshot {
        services,
        parser: QueryParser::new().with_zone_range(zones).with_max_len(max_len),
        cache: ResultCache::new(ttl),
        generation,
    }
}

/// Failures that quote the query text stay out of the cache: another query
/// sharing the normalized key would get this query's spelling back.
fn is_cacheable(outcome: &Outcome) -> bool {
    outcome.as_ref().err().is_none_or(|failure| !failure.error().quotes_query())
}

fn restamp(outcome: Outcome, started: Instant) -> Outcome {
    let elapsed = started.elapsed();
    match outcome {
        Ok(mut found) => {
            found.elapsed = elapsed;
            Ok(found)
        }
        Err(mut failure) => {
            failure.elapsed = elapsed;
            Err(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PriceNotFoundError, QueryParseError};

    fn cents(c: u64) -> Price {
        Price::from_cents(c)
    }

    fn fedex() -> Vec<ShippingService> {
        vec![
            ShippingService::builder("FedEx 2Day")
                .source("fedex_2025.pdf")
                .rate(5, 3.0, cents(3331))
                .rate(5, 2.0, cents(3100))
                .rate(2, 1.0, cents(2150))
                .build()
                .unwrap(),
            ShippingService::builder("FedEx Ground")
                .source("fedex_2025.pdf")
                .rate(5, 2.0, cents(1210))
                .rate(8, 2.0, cents(1490))
                .build()
                .unwrap(),
        ]
    }

    fn loaded() -> PriceResolver {
        let resolver = PriceResolver::new();
        resolver.load(fedex()).unwrap();
        resolver
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn resolver_is_send_and_sync() {
        assert_send_sync::<PriceResolver>();
    }

    #[test]
    fn resolves_exact_table_price() {
        let found = loaded().resolve("FedEx 2Day, Zone 5, 3 lb").unwrap();
        assert_eq!(found.price, cents(3331));
        assert_eq!(found.currency, "USD");
        assert_eq!(found.service, "FedEx 2Day");
        assert_eq!(found.zone, Zone::new(5).unwrap());
        assert_eq!(found.weight, Weight::new(3.0).unwrap());
        assert_eq!(found.source_document.as_deref(), Some("fedex_2025.pdf"));
        assert_eq!(found.match_kind, MatchKind::Exact);
        assert!(!found.is_best_effort());
    }

    #[test]
    fn nothing_loaded() {
        let failure = PriceResolver::new().resolve("FedEx 2Day, zone 5, 3 lb").unwrap_err();
        assert_eq!(failure.kind(), FailureKind::NotLoaded);
        assert_eq!(failure.message(), "no rate tables are loaded");
    }

    #[test]
    fn each_stage_fails_with_its_kind() {
        let resolver = loaded();

        let parse = resolver.resolve("FedEx 2Day").unwrap_err();
        assert_eq!(parse.kind(), FailureKind::Parse);
        assert!(matches!(parse.error(), ResolveError::Parse(QueryParseError::MissingZone { .. })));

        let service = resolver.resolve("Acme Courier, zone 5, 2 lb").unwrap_err();
        assert_eq!(service.kind(), FailureKind::ServiceNotFound);
        assert_eq!(service.available_services(), ["FedEx 2Day".to_string(), "FedEx Ground".to_string()]);

        let price = resolver.resolve("FedEx 2Day, zone 5, 2.5 lb").unwrap_err();
        assert_eq!(
            price.error(),
            &ResolveError::PriceNotFound(PriceNotFoundError {
                service: "FedEx 2Day".into(),
                zone: Zone::new(5).unwrap(),
                weight: Weight::new(2.5).unwrap(),
            })
        );
        assert!(price.available_services().is_empty());
    }

    #[test]
    fn zone_outside_loaded_tables_is_a_parse_failure() {
        let failure = loaded().resolve("FedEx Ground, zone 9, 2 lb").unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Parse);
        assert!(failure.message().contains("2-8"), "{}", failure.message());
    }

    #[test]
    fn missing_service_falls_back_to_first_loaded() {
        let found = loaded().resolve("zone 5, 2 lb").unwrap();
        assert_eq!(found.service, "FedEx 2Day");
        assert_eq!(found.price, cents(3100));
        assert!(found.is_best_effort());
    }

    #[test]
    fn repeated_resolve_hits_cache_with_same_content() {
        let resolver = loaded();
        let first = resolver.resolve("FedEx Ground, zone 8, 2 lb").unwrap();
        let second = resolver.resolve("  fedex ground,  ZONE 8, 2 LB").unwrap();
        assert_eq!((first.price, &first.service, first.zone, first.weight), (second.price, &second.service, second.zone, second.weight));
        assert_eq!(first.resolved_at, second.resolved_at);

        let stats = resolver.cache_stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn price_failures_are_cached() {
        let resolver = loaded();
        resolver.resolve("FedEx 2Day, zone 5, 2.5 lb").unwrap_err();
        let cached = resolver.resolve("FEDEX 2DAY,  ZONE 5, 2.5 LB").unwrap_err();
        let fresh = resolver.resolve_uncached("FEDEX 2DAY,  ZONE 5, 2.5 LB").unwrap_err();
        assert_eq!(cached.error(), fresh.error());
        assert_eq!(resolver.cache_stats().hits, 1);
    }

    #[test]
    fn cached_content_matches_fresh_content_across_spellings() {
        let resolver = loaded();
        for (first, second) in [
            ("ACME COURIER, zone 5, 2 lb", "acme courier, zone 5, 2 lb"),
            ("FedEx 2Day, zone 5", "fedex 2day,  ZONE 5"),
        ] {
            resolver.resolve(first).unwrap_err();
            let cached = resolver.resolve(second).unwrap_err();
            let fresh = resolver.resolve_uncached(second).unwrap_err();
            assert_eq!(cached.message(), fresh.message(), "{second}");
        }
        assert_eq!(resolver.cache_stats().entries, 0);
    }

    #[test]
    fn first_loaded_service_wins_over_later_exact_name() {
        let resolver = PriceResolver::new();
        resolver
            .load(vec![
                ShippingService::builder("FedEx 2Day A.M.").rate(5, 2.0, cents(4150)).build().unwrap(),
                ShippingService::builder("FedEx 2Day").rate(5, 2.0, cents(3100)).build().unwrap(),
            ])
            .unwrap();
        let found = resolver.resolve("FedEx 2Day, zone 5, 2 lb").unwrap();
        assert_eq!(found.service, "FedEx 2Day A.M.");
        assert_eq!(found.match_kind, MatchKind::Partial);
        assert_eq!(found.price, cents(4150));
    }

    #[test]
    fn uncached_and_disabled_cache_skip_the_cache() {
        let resolver = loaded();
        resolver.resolve_uncached("FedEx 2Day, zone 5, 3 lb").unwrap();
        assert_eq!(resolver.cache_stats().entries, 0);

        let settings = Settings { cache_enabled: false, ..Settings::default() };
        let resolver = PriceResolver::from_settings(&settings);
        resolver.load(fedex()).unwrap();
        resolver.resolve("FedEx 2Day, zone 5, 3 lb").unwrap();
        resolver.resolve("FedEx 2Day, zone 5, 3 lb").unwrap();
        assert_eq!(resolver.cache_stats().entries, 0);
    }

    #[test]
    fn reload_clears_cache_and_swaps_services() {
        let resolver = loaded();
        resolver.resolve("FedEx 2Day, zone 5, 3 lb").unwrap();
        assert_eq!(resolver.cache_stats().entries, 1);

        let ups = ShippingService::builder("UPS Ground").rate(5, 3.0, cents(999)).build().unwrap();
        let summary = resolver.load(vec![ups]).unwrap();
        assert_eq!(summary.generation, 2);
        assert_eq!(summary.zone_range, ZoneRange::new(5, 5));
        assert_eq!(resolver.cache_stats().entries, 0);

        let failure = resolver.resolve("FedEx 2Day, zone 5, 3 lb").unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ServiceNotFound);
        assert_eq!(failure.available_services(), ["UPS Ground".to_string()]);
    }

    #[test]
    fn duplicate_names_are_rejected_and_keep_previous_set() {
        let resolver = loaded();
        let mut services = fedex();
        services.push(ShippingService::builder("fedex 2day").rate(1, 1.0, cents(1)).build().unwrap());
        assert_eq!(resolver.load(services), Err(LoadError::DuplicateService("fedex 2day".into())));
        assert_eq!(resolver.generation(), 1);
        assert_eq!(resolver.service_names(), vec!["FedEx 2Day", "FedEx Ground"]);
    }

    #[test]
    fn explain_returns_trace_and_outcome() {
        let (outcome, details) = loaded().explain("FedEx Ground zone 8 2 lb");
        assert_eq!(outcome.unwrap().price, cents(1490));
        assert!(details.candidates.iter().any(|c| c.name == "weight"));
    }

    #[test]
    fn services_are_listed_in_load_order() {
        let infos = loaded().services();
        assert_eq!(infos.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), vec!["FedEx 2Day", "FedEx Ground"]);
        assert_eq!(infos[1].zones, vec![5, 8]);
    }

    #[test]
    fn failure_serializes_kind_and_message() {
        let failure = loaded().resolve("Acme, zone 5, 2 lb").unwrap_err();
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "service_not_found");
        assert_eq!(json["available_services"][1], "FedEx Ground");
        assert!(json["elapsed_ms"].is_number());
    }
}
