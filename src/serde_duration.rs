//! Serde helpers for `std::time::Duration` as fractional milliseconds.
//!
//! Lookups finish in microseconds, so whole milliseconds would round almost
//! every timing to zero.

use serde::Serializer;
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
}

#[cfg(test)]
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = <f64 as serde::Deserialize>::deserialize(deserializer)?;
    if !millis.is_finite() || millis < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid duration: {millis} ms")));
    }
    Ok(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
}
