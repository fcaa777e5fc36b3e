//! Validated scalar values: zones, weights and prices.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidPrice, InvalidWeight, InvalidZone};

/// A carrier shipping zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Zone(u32);

impl Zone {
    /// A positive zone number, not checked against any loaded range.
    pub fn new(value: u32) -> Result<Self, InvalidZone> {
        if value == 0 {
            return Err(InvalidZone::NotPositive(value));
        }
        Ok(Zone(value))
    }

    /// A zone number that must fall inside `range`.
    pub fn within(value: u32, range: ZoneRange) -> Result<Self, InvalidZone> {
        let zone = Zone::new(value)?;
        if !range.contains(zone) {
            return Err(InvalidZone::OutOfRange { value, range });
        }
        Ok(zone)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zone {}", self.0)
    }
}

impl FromStr for Zone {
    type Err = InvalidZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u32>().map_err(|_| InvalidZone::Unparseable(s.to_string()))?;
        Zone::new(value)
    }
}

/// Closed range of zones present in the loaded rate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneRange {
    min: u32,
    max: u32,
}

impl ZoneRange {
    /// `None` when `min > max` or `min` is zero.
    pub fn new(min: u32, max: u32) -> Option<Self> {
        (min > 0 && min <= max).then_some(ZoneRange { min, max })
    }

    /// Smallest range covering every zone yielded, or `None` for no zones.
    pub fn covering(zones: impl IntoIterator<Item = Zone>) -> Option<Self> {
        zones.into_iter().fold(None, |acc, zone| {
            let v = zone.value();
            Some(match acc {
                None => ZoneRange { min: v, max: v },
                Some(r) => ZoneRange { min: r.min.min(v), max: r.max.max(v) },
            })
        })
    }

    pub fn contains(self, zone: Zone) -> bool {
        (self.min..=self.max).contains(&zone.value())
    }

    pub fn min(self) -> u32 {
        self.min
    }

    pub fn max(self) -> u32 {
        self.max
    }
}

impl fmt::Display for ZoneRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Package weight in pounds. Always finite and greater than zero.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct Weight(f64);

impl Weight {
    pub fn new(pounds: f64) -> Result<Self, InvalidWeight> {
        if !pounds.is_finite() {
            return Err(InvalidWeight::Unparseable(pounds.to_string()));
        }
        if pounds <= 0.0 {
            return Err(InvalidWeight::NotPositive(pounds));
        }
        Ok(Weight(pounds))
    }

    pub fn pounds(self) -> f64 {
        self.0
    }
}

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Weight {}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Weight {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lb", self.0)
    }
}

impl FromStr for Weight {
    type Err = InvalidWeight;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pounds = s.trim().parse::<f64>().map_err(|_| InvalidWeight::Unparseable(s.to_string()))?;
        Weight::new(pounds)
    }
}

/// Exact non-negative amount in US cents.
///
/// Rate tables carry two decimal places, so cents avoid any float rounding
/// between the extracted text and the value handed back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPrice", into = "String")]
pub struct Price {
    cents: u64,
}

impl Price {
    pub const fn from_cents(cents: u64) -> Self {
        Price { cents }
    }

    pub fn cents(self) -> u64 {
        self.cents
    }

    /// Convert a JSON-style number such as `33.31`.
    pub fn from_f64(value: f64) -> Result<Self, InvalidPrice> {
        if !value.is_finite() {
            return Err(InvalidPrice::Unparseable(value.to_string()));
        }
        if value < 0.0 {
            return Err(InvalidPrice::Negative(value.to_string()));
        }
        let scaled = value * 100.0;
        let cents = scaled.round();
        if (scaled - cents).abs() > 1e-6 {
            return Err(InvalidPrice::TooPrecise(value.to_string()));
        }
        // `as` saturates; anything at or past 2^64 cents is not a table price.
        if cents >= u64::MAX as f64 {
            return Err(InvalidPrice::Unparseable(value.to_string()));
        }
        Ok(Price { cents: cents as u64 })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl FromStr for Price {
    type Err = InvalidPrice;

    /// Accepts table text like `33.31`, `$1,204.50` or `12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace()).collect();
        if cleaned.starts_with('-') {
            return Err(InvalidPrice::Negative(s.to_string()));
        }

        let (whole, frac) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(InvalidPrice::Unparseable(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(InvalidPrice::TooPrecise(s.to_string()));
        }

        let dollars: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| InvalidPrice::Unparseable(s.to_string()))?
        };
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| InvalidPrice::Unparseable(s.to_string()))? * 10,
            _ => frac.parse().map_err(|_| InvalidPrice::Unparseable(s.to_string()))?,
        };

        dollars
            .checked_mul(100)
            .and_then(|d| d.checked_add(cents))
            .map(Price::from_cents)
            .ok_or_else(|| InvalidPrice::Unparseable(s.to_string()))
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.to_string()
    }
}

/// Prices arrive either as strings (copied from the PDF text) or as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Text(String),
    Number(f64),
}

impl TryFrom<RawPrice> for Price {
    type Error = InvalidPrice;

    fn try_from(raw: RawPrice) -> Result<Self, Self::Error> {
        match raw {
            RawPrice::Text(s) => s.parse(),
            RawPrice::Number(n) => Price::from_f64(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_rejects_zero_and_out_of_range() {
        assert_eq!(Zone::new(0), Err(InvalidZone::NotPositive(0)));
        let range = ZoneRange::new(2, 8).unwrap();
        assert!(Zone::within(5, range).is_ok());
        assert!(matches!(Zone::within(9, range), Err(InvalidZone::OutOfRange { value: 9, .. })));
        assert!(matches!(Zone::within(1, range), Err(InvalidZone::OutOfRange { value: 1, .. })));
    }

    #[test]
    fn zone_range_covers_loaded_zones() {
        let zones = [6, 2, 8, 3].map(|z| Zone::new(z).unwrap());
        let range = ZoneRange::covering(zones).unwrap();
        assert_eq!((range.min(), range.max()), (2, 8));
        assert_eq!(ZoneRange::covering(std::iter::empty()), None);
        assert_eq!(ZoneRange::new(5, 2), None);
    }

    #[test]
    fn weight_must_be_positive() {
        assert!(Weight::new(0.0).is_err());
        assert!(Weight::new(-1.0).is_err());
        assert!(Weight::new(f64::NAN).is_err());
        assert_eq!(Weight::new(2.0).unwrap(), "2.0".parse::<Weight>().unwrap());
        assert!(Weight::new(1.5).unwrap() < Weight::new(2.0).unwrap());
    }

    #[test]
    fn weight_display() {
        assert_eq!(Weight::new(3.0).unwrap().to_string(), "3 lb");
        assert_eq!(Weight::new(1.5).unwrap().to_string(), "1.5 lb");
    }

    #[test]
    fn price_parses_table_text() {
        assert_eq!("33.31".parse::<Price>().unwrap(), Price::from_cents(3331));
        assert_eq!("$1,204.5".parse::<Price>().unwrap(), Price::from_cents(120450));
        assert_eq!("12".parse::<Price>().unwrap().to_string(), "12.00");
        assert_eq!(".99".parse::<Price>().unwrap(), Price::from_cents(99));
        assert!(matches!("-3.00".parse::<Price>(), Err(InvalidPrice::Negative(_))));
        assert!(matches!("3.001".parse::<Price>(), Err(InvalidPrice::TooPrecise(_))));
        assert!(matches!("n/a".parse::<Price>(), Err(InvalidPrice::Unparseable(_))));
        assert!(matches!("".parse::<Price>(), Err(InvalidPrice::Unparseable(_))));
    }

    #[test]
    fn price_from_json_number() {
        assert_eq!(Price::from_f64(33.31).unwrap(), Price::from_cents(3331));
        assert!(Price::from_f64(-0.5).is_err());
        assert!(Price::from_f64(1.234).is_err());
        assert!(matches!(Price::from_f64(1e30), Err(InvalidPrice::Unparseable(_))));
        assert!(serde_json::from_str::<Price>("1e30").is_err());
    }

    #[test]
    fn price_serde_accepts_strings_and_numbers() {
        let from_text: Price = serde_json::from_str("\"33.31\"").unwrap();
        let from_number: Price = serde_json::from_str("33.31").unwrap();
        assert_eq!(from_text, from_number);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"33.31\"");
    }
}
