use huddle_core::audit::DEFAULT_AUDIT_BUFFER_SIZE;
use huddle_core::collaboration::{
    LeaseTtl, HEARTBEAT_INTERVAL_SECS, LOCK_CLEANUP_INTERVAL_SECS,
};
use huddle_core::presence::PRESENCE_STALE_TIMEOUT_SECS;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Access-token verification settings.
    pub jwt: JwtConfig,
    /// Lease, heartbeat and sweep settings.
    pub collab: CollabConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    ///
    /// See [`JwtConfig::from_env`] and [`CollabConfig::from_env`] for the
    /// nested sections.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            collab: CollabConfig::from_env(),
        }
    }
}

/// Collaboration tuning.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    pub lock_ttl: LeaseTtl,
    /// Advertised to clients; they send `heartbeat` this often.
    pub heartbeat_interval_secs: u64,
    /// Cadence of the expired-lock sweep and of idle channel pruning.
    pub lock_cleanup_interval_secs: u64,
    /// `0` disables the presence staleness sweep.
    pub presence_stale_timeout_secs: i64,
    pub audit_buffer_size: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            lock_ttl: LeaseTtl::default(),
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
            lock_cleanup_interval_secs: LOCK_CLEANUP_INTERVAL_SECS,
            presence_stale_timeout_secs: PRESENCE_STALE_TIMEOUT_SECS,
            audit_buffer_size: DEFAULT_AUDIT_BUFFER_SIZE,
        }
    }
}

impl CollabConfig {
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `LOCK_TTL_MINS`               | `30`    |
    /// | `HEARTBEAT_INTERVAL_SECS`     | `25`    |
    /// | `LOCK_CLEANUP_INTERVAL_SECS`  | `60`    |
    /// | `PRESENCE_STALE_TIMEOUT_SECS` | `60`    |
    /// | `AUDIT_BUFFER_SIZE`           | `1024`  |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values and on a lock TTL outside 1..=240.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let lock_ttl = LeaseTtl::from_mins(env_or("LOCK_TTL_MINS", defaults.lock_ttl.mins()))
            .unwrap_or_else(|e| panic!("LOCK_TTL_MINS is invalid: {e}"));

        let heartbeat_interval_secs: u64 =
            env_or("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval_secs);
        assert!(
            heartbeat_interval_secs > 0,
            "HEARTBEAT_INTERVAL_SECS must be positive"
        );

        let lock_cleanup_interval_secs: u64 = env_or(
            "LOCK_CLEANUP_INTERVAL_SECS",
            defaults.lock_cleanup_interval_secs,
        );
        assert!(
            lock_cleanup_interval_secs > 0,
            "LOCK_CLEANUP_INTERVAL_SECS must be positive"
        );

        Self {
            lock_ttl,
            heartbeat_interval_secs,
            lock_cleanup_interval_secs,
            presence_stale_timeout_secs: env_or(
                "PRESENCE_STALE_TIMEOUT_SECS",
                defaults.presence_stale_timeout_secs,
            ),
            audit_buffer_size: env_or("AUDIT_BUFFER_SIZE", defaults.audit_buffer_size),
        }
    }

    pub fn presence_sweep_enabled(&self) -> bool {
        self.presence_stale_timeout_secs > 0
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}
