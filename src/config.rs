use std::{net::SocketAddr, path::PathBuf};

use homedir::my_home;
use serde::{Serialize, Serializer};

use crate::semantic::{DEFAULT_BATCH_SIZE, DEFAULT_CANDIDATE_POOL, DEFAULT_MODEL};

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_DB_NAME: &str = "equipment_aggregator";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug, Serialize)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    #[serde(serialize_with = "redact")]
    pub db_pass: String,
    pub db_name: String,

    /// Embedding model identifier (e.g. "paraphrase-multilingual-MiniLM-L12-v2")
    pub model_name: String,
    /// Where downloaded model files are cached
    pub model_cache_dir: PathBuf,
    /// Batch size for bulk catalog encoding
    pub embed_batch_size: usize,

    pub bind: SocketAddr,
    /// Number of semantic candidates the lexical filter scans
    pub candidate_pool: usize,
}

fn redact<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("***")
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

        let model_cache_dir = match lookup("MODEL_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir(),
        };

        let config = Self {
            db_host: string("DB_HOST", DEFAULT_DB_HOST),
            db_port: parse(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
            db_user: string("DB_USER", DEFAULT_DB_USER),
            db_pass: string("DB_PASS", ""),
            db_name: string("DB_NAME", DEFAULT_DB_NAME),
            model_name: string("MODEL_NAME", DEFAULT_MODEL),
            model_cache_dir,
            embed_batch_size: parse(&lookup, "EMBED_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            bind: parse(&lookup, "SEARCH_BIND", default_bind())?,
            candidate_pool: parse(&lookup, "SEARCH_CANDIDATE_POOL", DEFAULT_CANDIDATE_POOL)?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.candidate_pool == 0 {
            return Err(ConfigError::Invalid {
                var: "SEARCH_CANDIDATE_POOL",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.embed_batch_size == 0 {
            return Err(ConfigError::Invalid {
                var: "EMBED_BATCH_SIZE",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "MODEL_NAME",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {err}"),
        }),
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_cache_dir() -> PathBuf {
    match my_home() {
        Ok(Some(home)) => home.join(".cache").join("product-search"),
        _ => std::env::temp_dir().join("product-search"),
    }
}
