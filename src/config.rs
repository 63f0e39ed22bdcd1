//! Process-wide settings: failure catalog, debug flag, deadlines. Built once at startup.

use crate::error::{ConfigError, ErrorCatalog};
use std::time::Duration;

pub const DEBUG_ENV: &str = "SWITCHBOARD_DEBUG";
pub const METHOD_TIMEOUT_ENV: &str = "SWITCHBOARD_METHOD_TIMEOUT_MS";
pub const ACQUIRE_TIMEOUT_ENV: &str = "SWITCHBOARD_ACQUIRE_TIMEOUT_MS";
pub const BODY_LIMIT_ENV: &str = "SWITCHBOARD_BODY_LIMIT";

const DEFAULT_METHOD_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog: ErrorCatalog,
    /// Include failure detail and trace in error responses. Off unless enabled.
    pub debug: bool,
    pub method_timeout: Duration,
    pub acquire_timeout: Duration,
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: ErrorCatalog::standard(),
            debug: false,
            method_timeout: Duration::from_millis(DEFAULT_METHOD_TIMEOUT_MS),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(v) = lookup(DEBUG_ENV) {
            settings.debug = parse_flag(DEBUG_ENV, &v)?;
        }
        if let Some(v) = lookup(METHOD_TIMEOUT_ENV) {
            settings.method_timeout = Duration::from_millis(parse_number(METHOD_TIMEOUT_ENV, &v)?);
        }
        if let Some(v) = lookup(ACQUIRE_TIMEOUT_ENV) {
            settings.acquire_timeout = Duration::from_millis(parse_number(ACQUIRE_TIMEOUT_ENV, &v)?);
        }
        if let Some(v) = lookup(BODY_LIMIT_ENV) {
            settings.body_limit = parse_number(BODY_LIMIT_ENV, &v)? as usize;
        }
        Ok(settings)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_method_timeout(mut self, timeout: Duration) -> Self {
        self.method_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
