use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceVaultError};

pub const DEFAULT_MAX_BODY_BYTES: usize = 4 << 20;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub http_addr: String,
    pub db_path: PathBuf,
    pub queue_capacity: usize,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:4318".to_string(),
            db_path: PathBuf::from("./tracevault.duckdb"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(v) = env::var("TRACEVAULT_HTTP_ADDR") {
            cfg.http_addr = v;
        }
        if let Ok(v) = env::var("TRACEVAULT_DB_PATH") {
            cfg.db_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TRACEVAULT_QUEUE_CAPACITY") {
            cfg.queue_capacity = v
                .parse::<usize>()
                .map_err(|e| TraceVaultError::Config(format!("bad TRACEVAULT_QUEUE_CAPACITY: {e}")))?;
        }
        if let Ok(v) = env::var("TRACEVAULT_MAX_BODY_BYTES") {
            cfg.max_body_bytes = v
                .parse::<usize>()
                .map_err(|e| TraceVaultError::Config(format!("bad TRACEVAULT_MAX_BODY_BYTES: {e}")))?;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_expected_knobs() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr, "127.0.0.1:4318");
        assert_eq!(cfg.queue_capacity, 10_000);
        assert_eq!(cfg.max_body_bytes, 4 * 1024 * 1024);
    }
}
