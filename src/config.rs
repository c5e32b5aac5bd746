use crate::analytics::{MemoryCache, NoCache, QueryCache};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Figment(#[from] figment::Error),
    #[error("cache_max_age_secs is out of range: {0}")]
    CacheMaxAge(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub cache_enabled: bool,
    /// Entries older than this are refetched. Unset keeps them for the session.
    pub cache_max_age_secs: Option<u64>,
    /// Oldest entries are evicted past this many tables. Unset means unbounded.
    pub cache_max_entries: Option<usize>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/db/mdb.db".to_string(),
            cache_enabled: true,
            cache_max_age_secs: None,
            cache_max_entries: Some(256),
            log_filter: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub const FILE: &'static str = "Dashboard.toml";

    /// Defaults, then the TOML file, then `DATABASE_URL` and `DASHBOARD_*`
    /// environment variables.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let path = config_path.unwrap_or_else(|| Path::new(Self::FILE));
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(&["DATABASE_URL"]))
            .merge(Env::prefixed("DASHBOARD_"))
    }

    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(config_path).extract()?)
    }

    pub fn query_cache(&self) -> Result<Box<dyn QueryCache>, ConfigError> {
        if !self.cache_enabled {
            return Ok(Box::new(NoCache));
        }

        let mut cache = match self.cache_max_age_secs {
            Some(secs) => MemoryCache::with_max_age(
                chrono::Duration::from_std(std::time::Duration::from_secs(secs))
                    .map_err(|_| ConfigError::CacheMaxAge(secs))?,
            ),
            None => MemoryCache::new(),
        };
        if let Some(max_entries) = self.cache_max_entries {
            cache = cache.with_max_entries(max_entries);
        }
        Ok(Box::new(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::cache::{QueryKey, QueryTable};
    use figment::Jail;

    #[test]
    fn defaults_apply_without_file_or_environment() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            let defaults = AppConfig::default();
            assert_eq!(config.cache_enabled, defaults.cache_enabled);
            assert_eq!(config.cache_max_age_secs, None);
            assert_eq!(config.log_filter, defaults.log_filter);
            Ok(())
        });
    }

    #[test]
    fn file_then_environment_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                AppConfig::FILE,
                r#"
                cache_enabled = false
                log_filter = "debug"
                "#,
            )?;
            jail.set_env("DASHBOARD_CACHE_MAX_AGE_SECS", "60");
            jail.set_env("DASHBOARD_LOG_FILTER", "info");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert!(!config.cache_enabled);
            assert_eq!(config.cache_max_age_secs, Some(60));
            assert_eq!(config.log_filter, "info");
            Ok(())
        });
    }

    #[test]
    fn database_url_environment_variable_is_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "sqlite:/srv/elections.db");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.database_url, "sqlite:/srv/elections.db");
            Ok(())
        });
    }

    #[test]
    fn out_of_range_max_age_is_rejected() {
        let config = AppConfig {
            cache_max_age_secs: Some(10_000_000_000_000_000),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.query_cache(),
            Err(ConfigError::CacheMaxAge(10_000_000_000_000_000))
        ));

        let config = AppConfig {
            cache_max_age_secs: Some(u64::MAX),
            ..AppConfig::default()
        };
        assert!(matches!(config.query_cache(), Err(ConfigError::CacheMaxAge(_))));
    }

    #[test]
    fn large_valid_max_age_keeps_entries() {
        let config = AppConfig {
            cache_max_age_secs: Some(86_400 * 365 * 100),
            ..AppConfig::default()
        };
        let cache = config.query_cache().map_err(|e| e.to_string()).unwrap();
        cache.put(QueryKey::Departments, QueryTable::Departments(Vec::new()));
        assert!(cache.get(&QueryKey::Departments).is_some());
    }

    #[test]
    fn max_entries_comes_from_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("DASHBOARD_CACHE_MAX_ENTRIES", "8");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.cache_max_entries, Some(8));
            Ok(())
        });
    }

    #[test]
    fn explicit_config_path_is_read() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "cache_max_age_secs = 5")?;

            let config =
                AppConfig::load(Some(Path::new("custom.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.cache_max_age_secs, Some(5));
            Ok(())
        });
    }
}
