//! Server configuration loaded from the environment.
//!
//! Every setting has a default so the server starts with no environment at
//! all. `main` loads `.env` (if present) before reading these.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_HISTORY_CAPACITY: usize = 100;
const DEFAULT_HISTORY_REPLAY: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// Directory served at `/` (the browser page and its assets).
    pub static_dir: PathBuf,
    /// Messages retained in memory; oldest are dropped first.
    pub history_capacity: usize,
    /// Messages replayed to a client when it joins.
    pub history_replay: usize,
}

impl Config {
    /// Read `BIND_ADDR`, `PORT`, `STATIC_DIR`, `HISTORY_CAPACITY`, `HISTORY_REPLAY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into()),
            port: env_parse("PORT", DEFAULT_PORT),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR)),
            history_capacity: env_parse("HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY),
            history_replay: env_parse("HISTORY_REPLAY", DEFAULT_HISTORY_REPLAY),
        }
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_replay: DEFAULT_HISTORY_REPLAY,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
