//! Rate-table snapshots: the JSON that extraction writes.
//!
//! ```json
//! {
//!   "source": "fedex_service_guide_2025.pdf",
//!   "services": [
//!     { "name": "FedEx 2Day", "aliases": ["2Day"], "rates": { "5": { "3": "33.31", "4": 36.02 } } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::SnapshotError;
use crate::service::ShippingService;
use crate::values::{Price, Weight, Zone};

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    source: Option<String>,
    services: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    source: Option<String>,
    /// zone -> weight -> price, all keys as text.
    rates: BTreeMap<String, BTreeMap<String, Price>>,
}

/// Read and build every service in the snapshot at `path`, in file order.
///
/// Services without their own `source` inherit the snapshot's, falling back
/// to the file name.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Vec<ShippingService>, SnapshotError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io { path: path.to_path_buf(), source })?;
    let origin = path.display().to_string();
    let fallback = path.file_name().map(|n| n.to_string_lossy().into_owned());
    build(&text, &origin, fallback)
}

/// Build services from snapshot JSON. `origin` names the input in errors.
pub fn parse_snapshot(json: &str, origin: &str) -> Result<Vec<ShippingService>, SnapshotError> {
    build(json, origin, None)
}

fn build(json: &str, origin: &str, fallback_source: Option<String>) -> Result<Vec<ShippingService>, SnapshotError> {
    let raw: RawSnapshot =
        serde_json::from_str(json).map_err(|source| SnapshotError::Json { origin: origin.to_string(), source })?;
    let default_source = raw.source.or(fallback_source);

    let services = raw
        .services
        .into_iter()
        .map(|svc| build_service(svc, default_source.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(origin, services = services.len(), "snapshot parsed");
    Ok(services)
}

fn build_service(raw: RawService, default_source: Option<&str>) -> Result<ShippingService, SnapshotError> {
    let mut builder = ShippingService::builder(raw.name.as_str()).aliases(raw.aliases);
    if let Some(source) = raw.source.as_deref().or(default_source) {
        builder = builder.source(source);
    }

    for (zone_key, row) in &raw.rates {
        let zone: Zone =
            zone_key.parse().map_err(|source| SnapshotError::ZoneKey { service: raw.name.clone(), source })?;
        for (weight_key, &price) in row {
            let weight: Weight =
                weight_key.parse().map_err(|source| SnapshotError::WeightKey { service: raw.name.clone(), source })?;
            builder = builder.rate(zone.value(), weight.pounds(), price);
        }
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BuildError, InvalidWeight, InvalidZone};
    use std::io::Write;

    const FEDEX: &str = r#"{
        "source": "fedex_service_guide_2025.pdf",
        "services": [
            { "name": "FedEx 2Day", "aliases": ["2Day"], "rates": { "5": { "3": "33.31", "4": 36.02 } } },
            { "name": "FedEx Ground", "source": "ground.pdf", "rates": { "2": { "1.5": "$9.10" } } }
        ]
    }"#;

    #[test]
    fn parses_services_in_file_order() {
        let services = parse_snapshot(FEDEX, "inline").unwrap();
        assert_eq!(services.iter().map(|s| s.name()).collect::<Vec<_>>(), vec!["FedEx 2Day", "FedEx Ground"]);

        let two_day = &services[0];
        assert_eq!(two_day.aliases(), ["2Day".to_string()]);
        assert_eq!(two_day.source(), Some("fedex_service_guide_2025.pdf"));
        assert_eq!(
            two_day.lookup(Zone::new(5).unwrap(), Weight::new(4.0).unwrap()),
            Ok(Price::from_cents(3602))
        );

        let ground = &services[1];
        assert_eq!(ground.source(), Some("ground.pdf"));
        assert_eq!(
            ground.lookup(Zone::new(2).unwrap(), Weight::new(1.5).unwrap()),
            Ok(Price::from_cents(910))
        );
    }

    #[test]
    fn bad_keys_name_the_service() {
        let err = parse_snapshot(r#"{"services":[{"name":"X","rates":{"zero":{"1":"1.00"}}}]}"#, "t").unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::ZoneKey { ref service, source: InvalidZone::Unparseable(_) } if service == "X"
        ));

        let err = parse_snapshot(r#"{"services":[{"name":"X","rates":{"1":{"-1":"1.00"}}}]}"#, "t").unwrap_err();
        assert!(matches!(err, SnapshotError::WeightKey { source: InvalidWeight::NotPositive(_), .. }));
    }

    #[test]
    fn bad_price_is_a_json_error() {
        let err = parse_snapshot(r#"{"services":[{"name":"X","rates":{"1":{"1":"1.005"}}}]}"#, "t").unwrap_err();
        assert!(matches!(err, SnapshotError::Json { .. }));
        assert!(err.to_string().contains("more than two decimal places"), "{err}");
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = parse_snapshot(r#"{"services":[{"name":"X","rates":{}}]}"#, "t").unwrap_err();
        assert!(matches!(err, SnapshotError::Build(BuildError::NoRates(_))));
    }

    #[test]
    fn file_name_is_default_source() {
        let mut file = tempfile::Builder::new().prefix("ups_").suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"services":[{{"name":"UPS Ground","rates":{{"3":{{"2":"11.00"}}}}}}]}}"#).unwrap();

        let services = load_snapshot(file.path()).unwrap();
        let expected = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(services[0].source(), Some(expected.as_str()));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_snapshot("/definitely/not/here/rates.json").unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
