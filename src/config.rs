use std::env;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub bind_address: String,
    pub frontend_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Mongo,
            mongo_uri: None,
            database_name: "db_projects".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None => defaults.store_backend,
            Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let mongo_uri = lookup("MONGO_URI");
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        Ok(Self {
            store_backend,
            mongo_uri,
            database_name: lookup("DATABASE_NAME").unwrap_or(defaults.database_name),
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            frontend_origin: lookup("FRONTEND_ORIGIN").unwrap_or(defaults.frontend_origin),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn mongo_is_the_default_backend_and_needs_a_uri() {
        assert_eq!(Config::default().store_backend, StoreBackend::Mongo);
        assert!(matches!(config_from(&[]), Err(ConfigError::Missing("MONGO_URI"))));

        let config = config_from(&[("MONGO_URI", "mongodb://localhost:27017")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Mongo);
        assert_eq!(config.database_name, "db_projects");
        assert_eq!(config.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn memory_backend_runs_without_mongo() {
        let config = config_from(&[("STORE_BACKEND", "memory"), ("DATABASE_NAME", "scratch")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.database_name, "scratch");
        assert!(config.mongo_uri.is_none());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(matches!(
            config_from(&[("STORE_BACKEND", "sqlite")]),
            Err(ConfigError::Invalid { key: "STORE_BACKEND", .. })
        ));
    }
}
