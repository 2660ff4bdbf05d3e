use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RECORDS: &str = "winning_parameters.jsonl";
const DEFAULT_TICK_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// JSON-lines file holding one winning record per concluded epoch
    pub records_path: PathBuf,
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            records_path: PathBuf::from(DEFAULT_RECORDS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

impl ServerConfig {
    /// Read `SYNTHLIFE_ADDR`, `SYNTHLIFE_RECORDS` and `SYNTHLIFE_TICK_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let addr = parse_or("SYNTHLIFE_ADDR", lookup("SYNTHLIFE_ADDR"), defaults.addr);
        let records_path = lookup("SYNTHLIFE_RECORDS")
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.records_path);
        let tick_ms = parse_or("SYNTHLIFE_TICK_MS", lookup("SYNTHLIFE_TICK_MS"), DEFAULT_TICK_MS);

        Self {
            addr,
            records_path,
            tick_interval: Duration::from_millis(tick_ms.max(1)),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}, using {}", key, raw, default);
            default
        }
    }
}
