//! Configuration loading and representation.

use std::str::FromStr;
use std::time::Duration;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DEFAULT_PAGE_SIZE: &str = "CATALOG_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE: &str = "CATALOG_MAX_PAGE_SIZE";
pub const COMMIT_TIMEOUT_MS: &str = "CATALOG_COMMIT_TIMEOUT_MS";

/// Runtime settings for the catalog use cases and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Page size used when a caller asks for 0.
    pub default_page_size: u32,
    /// Upper bound for any requested page size.
    pub max_page_size: u32,
    /// Deadline for a single commit.
    pub commit_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_page_size: 20,
            max_page_size: 100,
            commit_timeout: Duration::from_millis(5_000),
        }
    }
}

impl CatalogConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Missing or unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL).filter(|url| !url.trim().is_empty());
        let default_page_size =
            parse_or(&lookup, DEFAULT_PAGE_SIZE, defaults.default_page_size);
        let max_page_size = parse_or(&lookup, MAX_PAGE_SIZE, defaults.max_page_size).max(1);
        let commit_timeout_ms = parse_or(
            &lookup,
            COMMIT_TIMEOUT_MS,
            defaults.commit_timeout.as_millis() as u64,
        );

        Self {
            database_url,
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
            commit_timeout: Duration::from_millis(commit_timeout_ms),
        }
    }

    /// Resolve a caller-supplied page size: 0 means the default, anything above the max is clamped.
    pub fn page_size(&self, requested: u32) -> u32 {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "unparseable setting; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CatalogConfig::from_lookup(|_| None);
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.commit_timeout, Duration::from_secs(5));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = CatalogConfig::from_lookup(lookup_from(&[
            (DATABASE_URL, "postgres://localhost/catalog"),
            (DEFAULT_PAGE_SIZE, "10"),
            (MAX_PAGE_SIZE, "50"),
            (COMMIT_TIMEOUT_MS, "250"),
        ]));

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/catalog")
        );
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.commit_timeout, Duration::from_millis(250));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = CatalogConfig::from_lookup(lookup_from(&[
            (DATABASE_URL, "   "),
            (DEFAULT_PAGE_SIZE, "lots"),
            (COMMIT_TIMEOUT_MS, "-5"),
        ]));
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn default_page_size_never_exceeds_max() {
        let config = CatalogConfig::from_lookup(lookup_from(&[
            (DEFAULT_PAGE_SIZE, "500"),
            (MAX_PAGE_SIZE, "30"),
        ]));
        assert_eq!(config.default_page_size, 30);
    }

    #[test]
    fn page_size_resolution() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size(0), 20);
        assert_eq!(config.page_size(7), 7);
        assert_eq!(config.page_size(1_000), 100);
    }
}
