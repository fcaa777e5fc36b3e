//! Shipping services and their rate tables.

use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map::Entry;

use serde::Serialize;

use crate::error::{BuildError, PriceNotFoundError};
use crate::values::{Price, Weight, Zone};

/// One carrier service with its extracted `(zone, weight) -> price` table.
///
/// Built once through [`ShippingService::builder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingService {
    name: String,
    aliases: Vec<String>,
    source: Option<String>,
    rates: BTreeMap<(Zone, Weight), Price>,
    zones: BTreeSet<Zone>,
    min_weight: Weight,
    max_weight: Weight,
}

impl ShippingService {
    pub fn builder(name: impl Into<String>) -> ShippingServiceBuilder {
        ShippingServiceBuilder { name: name.into(), aliases: Vec::new(), source: None, rows: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Other names the service is known by, e.g. `2Day` for `FedEx 2Day`.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Document the rates were extracted from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn zones(&self) -> impl Iterator<Item = Zone> + '_ {
        self.zones.iter().copied()
    }

    pub fn weight_range(&self) -> (Weight, Weight) {
        (self.min_weight, self.max_weight)
    }

    /// Number of `(zone, weight)` entries in the table.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rates(&self) -> impl Iterator<Item = (Zone, Weight, Price)> + '_ {
        self.rates.iter().map(|(&(zone, weight), &price)| (zone, weight, price))
    }

    /// Exact point lookup. Weights between two table rows do not match
    /// either row.
    pub fn lookup(&self, zone: Zone, weight: Weight) -> Result<Price, PriceNotFoundError> {
        self.rates.get(&(zone, weight)).copied().ok_or_else(|| PriceNotFoundError {
            service: self.name.clone(),
            zone,
            weight,
        })
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            zones: self.zones.iter().map(|z| z.value()).collect(),
            min_weight: self.min_weight,
            max_weight: self.max_weight,
            source: self.source.clone(),
            rates: self.rates.len(),
        }
    }
}

/// Collects rate rows for a [`ShippingService`]; validation happens in
/// [`ShippingServiceBuilder::build`].
#[derive(Debug, Clone)]
pub struct ShippingServiceBuilder {
    name: String,
    aliases: Vec<String>,
    source: Option<String>,
    rows: Vec<(u32, f64, Price)>,
}

impl ShippingServiceBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn rate(mut self, zone: u32, pounds: f64, price: Price) -> Self {
        self.rows.push((zone, pounds, price));
        self
    }

    pub fn build(self) -> Result<ShippingService, BuildError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(BuildError::EmptyName);
        }
        if self.rows.is_empty() {
            return Err(BuildError::NoRates(name));
        }

        let mut rates = BTreeMap::new();
        for (zone, pounds, price) in self.rows {
            let zone = Zone::new(zone).map_err(|source| BuildError::Zone { service: name.clone(), source })?;
            let weight = Weight::new(pounds).map_err(|source| BuildError::Weight { service: name.clone(), source })?;
            match rates.entry((zone, weight)) {
                Entry::Vacant(slot) => {
                    slot.insert(price);
                }
                Entry::Occupied(existing) if *existing.get() != price => {
                    return Err(BuildError::ConflictingRate { service: name, zone, weight });
                }
                Entry::Occupied(_) => {}
            }
        }

        let zones: BTreeSet<Zone> = rates.keys().map(|&(zone, _)| zone).collect();
        let weights: BTreeSet<Weight> = rates.keys().map(|&(_, weight)| weight).collect();
        let (Some(&min_weight), Some(&max_weight)) = (weights.first(), weights.last()) else {
            return Err(BuildError::NoRates(name));
        };

        let aliases = self
            .aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case(&name))
            .collect();

        Ok(ShippingService { name, aliases, source: self.source, rates, zones, min_weight, max_weight })
    }
}

/// Listing view of a loaded service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub zones: Vec<u32>,
    pub min_weight: Weight,
    pub max_weight: Weight,
    pub source: Option<String>,
    /// Number of rate entries.
    pub rates: usize,
}
