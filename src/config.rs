//! Layered settings: built-in defaults, an optional `ratecard.{toml,json,yaml}`
//! file, then `RATECARD_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::matcher::DEFAULT_PLACEHOLDERS;
use crate::query::DEFAULT_MAX_QUERY_LEN;

pub const ENV_PREFIX: &str = "RATECARD";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Rate-table snapshot loaded by the CLI.
    #[serde(default = "default_rates_path")]
    pub rates_path: PathBuf,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Cache entry lifetime in seconds; 0 keeps entries until reload.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Longest accepted query, in characters.
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,

    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Fragments that mean "no particular service".
    #[serde(default = "default_placeholder_services")]
    pub placeholder_services: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rates_path: default_rates_path(),
            cache_enabled: default_true(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_query_len: default_max_query_len(),
            log_level: default_log_level(),
            placeholder_services: default_placeholder_services(),
        }
    }
}

impl Settings {
    /// Load from `./ratecard.*` if present, overridden by the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name("ratecard").required(false), environment())
    }

    /// Load from an explicit settings file (which must exist), overridden by
    /// the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).required(true), environment())
    }

    fn build<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder().add_source(file).add_source(env).build()?.try_deserialize()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

/// `RATECARD_CACHE_TTL_SECS=60`, `RATECARD_PLACEHOLDER_SERVICES=standard,any`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("placeholder_services")
}

fn default_rates_path() -> PathBuf {
    PathBuf::from("rates.json")
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_max_query_len() -> usize {
    DEFAULT_MAX_QUERY_LEN
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_placeholder_services() -> Vec<String> {
    DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_default_settings() {
        let cfg = Settings::default();
        assert_eq!(cfg.rates_path, PathBuf::from("rates.json"));
        assert!(cfg.cache_enabled);
        assert_eq!(cfg.cache_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.max_query_len, 500);
        assert_eq!(cfg.placeholder_services, vec!["standard", "default", "generic", "any"]);
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let cfg = Settings { cache_ttl_secs: 0, ..Settings::default() };
        assert_eq!(cfg.cache_ttl(), None);
    }

    #[test]
    fn file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "rates_path = \"tables/fedex.json\"\ncache_ttl_secs = 60\nlog_level = \"debug\"").unwrap();

        let cfg = Settings::build(
            File::from(file.path()),
            env(&[("RATECARD_CACHE_TTL_SECS", "5"), ("RATECARD_PLACEHOLDER_SERVICES", "cheapest,any")]),
        )
        .unwrap();

        assert_eq!(cfg.rates_path, PathBuf::from("tables/fedex.json"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.cache_ttl_secs, 5);
        assert_eq!(cfg.placeholder_services, vec!["cheapest", "any"]);
        assert!(cfg.cache_enabled);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load_from(Path::new("/definitely/not/here/ratecard.toml")).is_err());
    }
}
