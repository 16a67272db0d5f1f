use std::path::PathBuf;
use std::time::Duration;

use yolo_core::error::CoreError;

/// Name of the worker binary, looked up next to the current executable.
pub const WORKER_BIN_NAME: &str = "yolo-worker";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection string.
    pub database_url: String,
    /// Worker executable started by the supervisor.
    pub worker_bin: PathBuf,
    /// How long `stop` waits for the worker after SIGTERM.
    pub worker_stop_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default                          |
    /// |----------------------------|----------------------------------|
    /// | `HOST`                     | `0.0.0.0`                        |
    /// | `PORT`                     | `8080`                           |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                             |
    /// | `DATABASE_URL`             | required                         |
    /// | `WORKER_BIN`               | `yolo-worker` next to this binary |
    /// | `WORKER_STOP_TIMEOUT_SECS` | `5`                              |
    pub fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", "8080")?;
        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "30")?;
        let stop_secs: u64 = parse_var("WORKER_STOP_TIMEOUT_SECS", "5")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| CoreError::Config("DATABASE_URL must be set".into()))?;

        let worker_bin = match std::env::var("WORKER_BIN") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_worker_bin()?,
        };

        Ok(Self {
            host,
            port,
            request_timeout_secs,
            database_url,
            worker_bin,
            worker_stop_timeout: Duration::from_secs(stop_secs),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, CoreError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.into());
    raw.trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{name} must be a number, got '{raw}'")))
}

/// `yolo-worker` in the directory of the running executable.
fn default_worker_bin() -> Result<PathBuf, CoreError> {
    let exe = std::env::current_exe()
        .map_err(|e| CoreError::Config(format!("Cannot locate current executable: {e}")))?;
    Ok(exe.with_file_name(format!(
        "{WORKER_BIN_NAME}{}",
        std::env::consts::EXE_SUFFIX
    )))
}
