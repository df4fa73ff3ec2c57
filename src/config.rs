use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_DISPATCH_GRACE_SECS: u64 = 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 1440;
pub const DEFAULT_PERSIST_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend_url: String,
    pub port: u16,
    /// Cadence of both the vehicle poll and the route re-validation loop.
    pub poll_interval: Duration,
    /// How long a dispatched marker may wait for its vehicle to show up in a
    /// snapshot before it is pruned.
    pub dispatch_grace: Duration,
    pub history_limit: usize,
    pub persist_interval: Duration,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            port: DEFAULT_PORT,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            dispatch_grace: Duration::from_secs(DEFAULT_DISPATCH_GRACE_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            persist_interval: Duration::from_secs(DEFAULT_PERSIST_INTERVAL_SECS),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Build the config from environment variables, falling back to the
    /// defaults above for anything unset or unparseable.
    ///
    /// - `BACKEND_URL`, `PORT`, `DATA_DIR`
    /// - `POLL_INTERVAL_SECS`, `DISPATCH_GRACE_SECS`, `PERSIST_INTERVAL_SECS`,
    ///   `REQUEST_TIMEOUT_SECS`
    /// - `HISTORY_LIMIT`
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok();

        Self {
            backend_url: var("BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            port: parse_or("PORT", var("PORT").as_deref(), DEFAULT_PORT),
            poll_interval: secs_or(
                "POLL_INTERVAL_SECS",
                var("POLL_INTERVAL_SECS").as_deref(),
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            dispatch_grace: Duration::from_secs(parse_or(
                "DISPATCH_GRACE_SECS",
                var("DISPATCH_GRACE_SECS").as_deref(),
                DEFAULT_DISPATCH_GRACE_SECS,
            )),
            history_limit: parse_or(
                "HISTORY_LIMIT",
                var("HISTORY_LIMIT").as_deref(),
                DEFAULT_HISTORY_LIMIT,
            ),
            persist_interval: secs_or(
                "PERSIST_INTERVAL_SECS",
                var("PERSIST_INTERVAL_SECS").as_deref(),
                DEFAULT_PERSIST_INTERVAL_SECS,
            ),
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            request_timeout: secs_or(
                "REQUEST_TIMEOUT_SECS",
                var("REQUEST_TIMEOUT_SECS").as_deref(),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<&str>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value, "ignoring unparseable config value");
            default
        }),
    }
}

// Timers cannot run on a zero period.
fn secs_or(key: &str, raw: Option<&str>, default: u64) -> Duration {
    match parse_or(key, raw, default) {
        0 => Duration::from_secs(default),
        secs => Duration::from_secs(secs),
    }
}
