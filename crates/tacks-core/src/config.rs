//! Environment-driven service configuration.
//!
//! Every option has a typed default; malformed integers and durations fall
//! back to the default silently. The only fatal condition is a missing
//! `API_KEY`. Loading is seamed on a lookup function so tests can feed a
//! plain map instead of mutating process environment.

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = [
    "http://localhost:3000",
    "https://tacks-board.netlify.app",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub enable_keep_alive: bool,
    pub keep_alive_url: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub migration_dir: PathBuf,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when `API_KEY` is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset, matching common PaaS dashboards
    /// that persist blank entries.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let api_key = match get("API_KEY") {
            Some(key) => key,
            None => bail!("API_KEY environment variable is required"),
        };

        let enable_keep_alive =
            get("ENABLE_KEEP_ALIVE").as_deref() == Some("true") || get("RENDER").is_some();
        let keep_alive_url = get("RENDER_EXTERNAL_URL").or_else(|| get("APP_URL"));

        Ok(Self {
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
                port: parse_or(get("PORT"), 8080),
                read_timeout: duration_or(get("SERVER_READ_TIMEOUT"), Duration::from_secs(15)),
                write_timeout: duration_or(get("SERVER_WRITE_TIMEOUT"), Duration::from_secs(15)),
                shutdown_timeout: duration_or(
                    get("SERVER_SHUTDOWN_TIMEOUT"),
                    Duration::from_secs(30),
                ),
                enable_keep_alive,
                keep_alive_url,
                allowed_origins: allowed_origins(get("ALLOWED_ORIGINS")),
            },
            database: DatabaseConfig {
                path: PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "./issues.db".to_owned())),
                migration_dir: PathBuf::from(
                    get("MIGRATION_DIR").unwrap_or_else(|| "./migrations".to_owned()),
                ),
                max_open_conns: parse_or(get("DB_MAX_OPEN_CONNS"), 25),
                max_idle_conns: parse_or(get("DB_MAX_IDLE_CONNS"), 5),
                conn_max_lifetime: duration_or(
                    get("DB_CONN_MAX_LIFETIME"),
                    Duration::from_secs(5 * 60),
                ),
            },
            auth: AuthConfig { api_key },
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn duration_or(value: Option<String>, default: Duration) -> Duration {
    value.and_then(|v| parse_duration(&v)).unwrap_or(default)
}

fn allowed_origins(value: Option<String>) -> Vec<String> {
    match value {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        None => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| (*s).to_owned()).collect(),
    }
}

/// Parse a Go-style duration literal: an unsigned integer followed by one of
/// `ms`, `s`, `m`, or `h`. Returns `None` on any other shape.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) if idx > 0 => s.split_at(idx),
        _ => return None,
    };
    let value: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}
