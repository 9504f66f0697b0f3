use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::roster::MonthLocale;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage seeded with blank rosters; for demos and tests.
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown STORAGE_BACKEND: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub debug_key: String,
    pub bind_addr: String,
    pub roster_locale: MonthLocale,
    pub roster_write_attempts: u32,
    pub permission_type_cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let database_url = var("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set".to_string());
        }

        let jwt_secret = var("AUTH_JWT_SECRET").ok_or("AUTH_JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            return Err("AUTH_JWT_SECRET must be at least 32 bytes".to_string());
        }

        let debug_key = var("DEBUG_KEY").ok_or("DEBUG_KEY must be set")?;

        let roster_locale = match var("ROSTER_LOCALE") {
            Some(value) => value.parse()?,
            None => MonthLocale::Spanish,
        };

        let roster_write_attempts = parse_or(&var, "ROSTER_WRITE_ATTEMPTS", 3u32)?;
        if roster_write_attempts == 0 {
            return Err("ROSTER_WRITE_ATTEMPTS must be at least 1".to_string());
        }

        let cache_ttl_secs = parse_or(&var, "PERMISSION_TYPE_CACHE_TTL_SECS", 300u64)?;

        Ok(Self {
            storage_backend,
            database_url,
            jwt_secret,
            jwt_issuer: var("AUTH_JWT_ISSUER").unwrap_or_else(|| "duty-roster".to_string()),
            debug_key,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            roster_locale,
            roster_write_attempts,
            permission_type_cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, String> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{} must be a number, got '{}'", key, value)),
        None => Ok(default),
    }
}
