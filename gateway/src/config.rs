//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Tests build a [`Config`] from a fake
//! environment through [`Config::from_lookup`].

use std::{env, str::FromStr, time::Duration};

use tracing::warn;

use crate::routing::RouteTable;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;

/// Outbound forwarding timeout used when `FORWARD_TIMEOUT_MS` is unset.
pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 10_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Timeout for the single outbound forwarding attempt
    pub forward_timeout_ms: u64,

    /// Order-prefix routes with their destination URLs
    pub routes: RouteTable,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),

            forward_timeout_ms: match parse_or(&lookup, "FORWARD_TIMEOUT_MS", DEFAULT_FORWARD_TIMEOUT_MS) {
                0 => {
                    warn!(env_var = "FORWARD_TIMEOUT_MS", value = 0, "Zero timeout, using default");
                    DEFAULT_FORWARD_TIMEOUT_MS
                }
                ms => ms,
            },

            routes: RouteTable::from_lookup(&lookup),
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = match lookup(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
