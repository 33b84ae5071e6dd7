use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_STATIC_DIR: &str = "frontend/dist";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SESSION_SECRET must be set")]
    MissingSessionSecret,
    #[error("BIND_ADDR `{0}` is not a socket address")]
    InvalidBindAddr(String),
    #[error("TASK_STORE `{0}` is not one of `redis`, `memory`")]
    UnknownStore(String),
}

/// Which backend holds the tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(ConfigError::UnknownStore(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub redis_url: String,
    pub store: StoreKind,
    pub session_secret: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_addr))?;

        let store = match lookup("TASK_STORE") {
            Some(kind) => kind.parse()?,
            None => StoreKind::Redis,
        };

        let session_secret = lookup("SESSION_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingSessionSecret)?;

        Ok(Self {
            bind_addr,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            store,
            session_secret,
            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = config(&[("SESSION_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.store, StoreKind::Redis);
        assert_eq!(config.static_dir, PathBuf::from("frontend/dist"));
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::MissingSessionSecret);
        assert_eq!(
            config(&[("SESSION_SECRET", "")]).unwrap_err(),
            ConfigError::MissingSessionSecret
        );
    }

    #[test]
    fn store_and_address_are_parsed() {
        let config = config(&[
            ("SESSION_SECRET", "s3cret"),
            ("TASK_STORE", "Memory"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.bind_addr.port(), 8080);

        assert!(matches!(
            self::config(&[("SESSION_SECRET", "x"), ("TASK_STORE", "postgres")]),
            Err(ConfigError::UnknownStore(_))
        ));
        assert!(matches!(
            self::config(&[("SESSION_SECRET", "x"), ("BIND_ADDR", "localhost")]),
            Err(ConfigError::InvalidBindAddr(_))
        ));
    }
}
