//! Service-name resolution.
//!
//! [`ServiceMatcher`] is the seam; [`SubstringMatcher`] is the strategy the
//! resolver uses by default.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::ServiceNotFoundError;
use crate::service::ShippingService;

/// How a fragment was tied to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The fragment equals the service name or one of its aliases.
    Exact,
    /// The fragment is contained in the service name or an alias.
    Partial,
    /// No usable fragment; the first loaded service was picked.
    Fallback,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Exact => "exact",
            MatchKind::Partial => "partial",
            MatchKind::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceMatch<'a> {
    pub service: &'a ShippingService,
    pub kind: MatchKind,
}

pub trait ServiceMatcher: Send + Sync + fmt::Debug {
    /// Pick the service `fragment` refers to. `services` is in load order.
    fn find<'a>(
        &self,
        fragment: &str,
        services: &'a [ShippingService],
    ) -> Result<ServiceMatch<'a>, ServiceNotFoundError>;
}

pub const DEFAULT_PLACEHOLDERS: &[&str] = &["standard", "default", "generic", "any"];

/// Case- and punctuation-insensitive containment match over names and
/// aliases. The first service in load order that matches is chosen.
///
/// ```
/// use ratecard::{MatchKind, Price, ServiceMatcher, ShippingService, SubstringMatcher};
///
/// let services = vec![
///     ShippingService::builder("FedEx 2Day").rate(5, 3.0, Price::from_cents(3331)).build().unwrap(),
///     ShippingService::builder("FedEx Ground").rate(5, 3.0, Price::from_cents(1210)).build().unwrap(),
/// ];
/// let found = SubstringMatcher::default().find("fedex 2-day", &services).unwrap();
/// assert_eq!(found.service.name(), "FedEx 2Day");
/// assert_eq!(found.kind, MatchKind::Exact);
/// ```
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    placeholders: Vec<String>,
}

impl Default for SubstringMatcher {
    fn default() -> Self {
        Self::with_placeholders(DEFAULT_PLACEHOLDERS.iter().copied())
    }
}

impl SubstringMatcher {
    /// Fragments equal to one of `placeholders` select the fallback service.
    pub fn with_placeholders<I, S>(placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let placeholders = placeholders.into_iter().map(|p| normalize_name(p.as_ref())).filter(|p| !p.is_empty()).collect();
        SubstringMatcher { placeholders }
    }

    fn is_placeholder(&self, normalized: &str) -> bool {
        normalized.is_empty() || self.placeholders.iter().any(|p| p == normalized)
    }
}

fn names(service: &ShippingService) -> impl Iterator<Item = String> + '_ {
    std::iter::once(service.name()).chain(service.aliases().iter().map(String::as_str)).map(normalize_name)
}

impl ServiceMatcher for SubstringMatcher {
    fn find<'a>(
        &self,
        fragment: &str,
        services: &'a [ShippingService],
    ) -> Result<ServiceMatch<'a>, ServiceNotFoundError> {
        let not_found = || ServiceNotFoundError {
            fragment: fragment.to_string(),
            available: services.iter().map(|s| s.name().to_string()).collect(),
        };

        let wanted = normalize_name(fragment);
        let found = if self.is_placeholder(&wanted) {
            services.first().map(|service| ServiceMatch { service, kind: MatchKind::Fallback })
        } else {
            // First service in load order that contains the fragment wins.
            services.iter().find_map(|service| {
                let mut kind = None;
                for name in names(service) {
                    if name == wanted {
                        kind = Some(MatchKind::Exact);
                        break;
                    }
                    if name.contains(&wanted) {
                        kind = Some(MatchKind::Partial);
                    }
                }
                kind.map(|kind| ServiceMatch { service, kind })
            })
        };

        match found {
            Some(m) => {
                debug!(fragment, service = m.service.name(), kind = %m.kind, "service matched");
                Ok(m)
            }
            None => {
                debug!(fragment, "no service matched");
                Err(not_found())
            }
        }
    }
}

/// Lower-case, drop `-`, `.` and `_`, and collapse whitespace, so that
/// `FedEx 2-Day` and `fedex  2day` compare equal.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !matches!(c, '-' | '.' | '_')).collect::<String>().to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
