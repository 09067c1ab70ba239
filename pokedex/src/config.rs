//! Configuration for the pokedex binary
//!
//! Read from environment variables, with defaults for everything:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `POKEDEX_API_URL` | `api_base_url` | `https://pokeapi.co/api/v2` |
//! | `POKEDEX_TIMEOUT_SECS` | `request_timeout_secs` | `30` |
//! | `POKEDEX_PAGE_SIZE` | `page_size` | `10` |
//! | `POKEDEX_PAGES` | `pages` | `1` |
//! | `POKEDEX_METRICS_ADDR` | `metrics_addr` | unset (no listener) |
//!
//! # Example
//!
//! ```no_run
//! use pokedex::PokedexConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PokedexConfig::from_env()?;
//! println!("Paging {} by {}", config.api_base_url, config.page_size);
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    Parse {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Pokedex configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokedexConfig {
    /// Base URL of the API (without trailing `/pokemon`)
    pub api_base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Page size, used as the store's initial limit and the paging step
    pub page_size: i64,
    /// Number of consecutive pages to load
    pub pages: u32,
    /// Address to serve Prometheus metrics on
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for PokedexConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://pokeapi.co/api/v2".to_string(),
            request_timeout_secs: 30,
            page_size: pagestore_core::DEFAULT_LIMIT,
            pages: 1,
            metrics_addr: None,
        }
    }
}

impl PokedexConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            api_base_url: lookup("POKEDEX_API_URL").unwrap_or(defaults.api_base_url),
            request_timeout_secs: parse(&lookup, "POKEDEX_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            page_size: parse(&lookup, "POKEDEX_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            pages: parse(&lookup, "POKEDEX_PAGES")?.unwrap_or(defaults.pages),
            metrics_addr: parse(&lookup, "POKEDEX_METRICS_ADDR")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "api_base_url must be an http(s) URL".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be > 0".to_string()));
        }
        if self.page_size <= 0 {
            return Err(ConfigError::Validation("page_size must be > 0".to_string()));
        }
        if self.pages == 0 {
            return Err(ConfigError::Validation("pages must be > 0".to_string()));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Parse { var, value })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PokedexConfig::from_lookup(lookup(&[]));
        assert_eq!(config, Ok(PokedexConfig::default()));
    }

    #[test]
    fn test_overrides() {
        let config = PokedexConfig::from_lookup(lookup(&[
            ("POKEDEX_API_URL", "http://localhost:8080/api/v2"),
            ("POKEDEX_TIMEOUT_SECS", "5"),
            ("POKEDEX_PAGE_SIZE", " 20 "),
            ("POKEDEX_PAGES", "3"),
            ("POKEDEX_METRICS_ADDR", "127.0.0.1:9090"),
        ]));

        let config = config.unwrap_or_else(|e| panic!("valid config rejected: {e}"));
        assert_eq!(config.api_base_url, "http://localhost:8080/api/v2");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pages, 3);
        assert_eq!(config.metrics_addr, "127.0.0.1:9090".parse().ok());
    }

    #[test]
    fn test_unparseable_value() {
        let config = PokedexConfig::from_lookup(lookup(&[("POKEDEX_PAGE_SIZE", "ten")]));
        assert_eq!(
            config,
            Err(ConfigError::Parse {
                var: "POKEDEX_PAGE_SIZE",
                value: "ten".to_string()
            })
        );
    }

    #[test]
    fn test_validation() {
        let cases = [
            ("POKEDEX_API_URL", "pokeapi.co"),
            ("POKEDEX_TIMEOUT_SECS", "0"),
            ("POKEDEX_PAGE_SIZE", "-1"),
            ("POKEDEX_PAGES", "0"),
        ];

        for (var, value) in cases {
            let config = PokedexConfig::from_lookup(lookup(&[(var, value)]));
            assert!(
                matches!(config, Err(ConfigError::Validation(_))),
                "{var}={value} should be rejected, got {config:?}"
            );
        }
    }
}
