use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use inventa_db::StorageBackend;

/// Runtime configuration, built once at startup and carried in the app state.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub session_ttl: Duration,
    /// Shared secret for `/api/admin/*`. `None` disables the admin API.
    pub admin_token: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            storage: StorageBackend::Sqlite {
                path: PathBuf::from("inventa.db"),
            },
            session_ttl: Duration::hours(24),
            admin_token: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Read `INVENTA_*` variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("INVENTA_HOST").unwrap_or(defaults.host);
        let port: u16 = std::env::var("INVENTA_PORT")
            .unwrap_or_else(|_| defaults.port.to_string())
            .parse()
            .context("Invalid INVENTA_PORT")?;

        let storage = match std::env::var("INVENTA_STORAGE")
            .unwrap_or_else(|_| "sqlite".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "sqlite" => StorageBackend::Sqlite {
                path: std::env::var("INVENTA_DB_PATH")
                    .unwrap_or_else(|_| "inventa.db".into())
                    .into(),
            },
            "memory" => StorageBackend::Memory,
            other => bail!("Invalid INVENTA_STORAGE '{}': expected 'sqlite' or 'memory'", other),
        };

        let ttl_hours: i64 = std::env::var("INVENTA_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .context("Invalid INVENTA_SESSION_TTL_HOURS")?;
        if ttl_hours <= 0 {
            bail!("INVENTA_SESSION_TTL_HOURS must be positive");
        }

        let admin_token = std::env::var("INVENTA_ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let max_upload_mb: usize = std::env::var("INVENTA_MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .context("Invalid INVENTA_MAX_UPLOAD_MB")?;

        Ok(Self {
            host,
            port,
            storage,
            session_ttl: Duration::hours(ttl_hours),
            admin_token,
            max_upload_bytes: upload_limit_bytes(max_upload_mb)?,
        })
    }

    /// Defaults with the in-memory backend. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageBackend::Memory,
            ..Self::default()
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn upload_limit_bytes(megabytes: usize) -> Result<usize> {
    match megabytes.checked_mul(1024 * 1024) {
        Some(0) => bail!("INVENTA_MAX_UPLOAD_MB must be positive"),
        Some(bytes) => Ok(bytes),
        None => bail!("INVENTA_MAX_UPLOAD_MB is too large: {}", megabytes),
    }
}
