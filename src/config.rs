//! Configuration management for Road Tiles.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables matching the deployment's `.env` names
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use road_tiles::config::{Cli, Command};
//!
//! // Parse from command line and environment
//! let cli = Cli::parse();
//!
//! if let Command::Serve(config) = cli.into_command() {
//!     println!("Listening on {}", config.bind_address());
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3000)
//! - `CORS_ORIGIN` - Allowed origins, comma-separated (default: any)
//! - `CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `TILE_TIMEOUT_MS` - Upper bound on one database tile render (default: 15000)
//! - `PUBLIC_URL` - Base URL advertised in the TileJSON document
//! - `LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! - `DATABASE_URL` - Full connection string, overrides the `DB_*` parts
//! - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD` - Connection parts
//! - `DB_POOL_SIZE` - Maximum open connections (default: 20)
//! - `DB_CONNECT_TIMEOUT_MS` - Connect and pool-wait timeout (default: 2000)
//! - `DB_STATEMENT_TIMEOUT_MS` - Server-side statement timeout (default: 10000)
//! - `REDIS_URL` - Shared cache; without it an in-process cache is used
//! - `CACHE_TIMEOUT_MS` - Per-operation cache timeout (default: 500)
//! - `CACHE_MEMORY_ENTRIES` - In-process cache capacity (default: 10000)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cache::{
    CacheBackend, MemoryBackend, RedisBackend, TileCache, DEFAULT_MEMORY_CACHE_ENTRIES,
};
use crate::error::{CacheError, SourceError};
use crate::source::PoolSettings;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default HTTP cache max-age in seconds (24 hours).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86_400;

/// Default upper bound on one database tile render, in milliseconds.
pub const DEFAULT_TILE_TIMEOUT_MS: u64 = 15_000;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default database pool size.
pub const DEFAULT_DB_POOL_SIZE: usize = 20;

/// Default database connect timeout in milliseconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Default server-side statement timeout in milliseconds.
pub const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 10_000;

/// Default per-operation cache timeout in milliseconds.
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 500;

/// Connections kept by the Redis pool.
pub const DEFAULT_REDIS_POOL_SIZE: usize = 16;

/// Placeholder printed in place of secrets.
const REDACTED: &str = "<redacted>";

// =============================================================================
// CLI Structure
// =============================================================================

/// Road Tiles - Mapbox Vector Tiles for a road network.
///
/// Serves tiles rendered by PostGIS through a shared cache.
#[derive(Parser, Debug)]
#[command(name = "road-tiles")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the default `serve` command
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run; `serve` when none is given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server (default)
    Serve(ServeConfig),

    /// Check database and cache connectivity
    Check(CheckConfig),

    /// Delete every cached tile from the shared cache
    ClearCache(ClearCacheConfig),
}

// =============================================================================
// Serve Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGIN", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// HTTP Cache-Control max-age in seconds for tiles.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Upper bound on a single database tile render, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TILE_TIMEOUT_MS, env = "TILE_TIMEOUT_MS")]
    pub tile_timeout_ms: u64,

    /// Public base URL used in the TileJSON document.
    ///
    /// Defaults to `http://<host>:<port>`.
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    // =========================================================================
    // Backends
    // =========================================================================
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub cache: CacheArgs,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_timeout_ms == 0 {
            return Err("tile_timeout_ms must be greater than 0".to_string());
        }
        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!(
                    "PUBLIC_URL must start with http:// or https://, got {url:?}"
                ));
            }
        }
        self.database.validate()?;
        self.cache.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL clients should use to reach this server.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" | "[::]" => "localhost",
                    host => host,
                };
                format!("http://{host}:{}", self.port)
            }
        }
    }

    pub fn tile_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_timeout_ms)
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

#[derive(Args, Clone)]
pub struct DatabaseArgs {
    /// Full PostgreSQL connection string. Overrides the individual `--db-*` options.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Database host.
    #[arg(long, default_value = "localhost", env = "DB_HOST")]
    pub db_host: String,

    /// Database port.
    #[arg(long, default_value_t = 5432, env = "DB_PORT")]
    pub db_port: u16,

    /// Database name.
    #[arg(long, default_value = "roads", env = "DB_NAME")]
    pub db_name: String,

    /// Database user.
    #[arg(long, default_value = "postgres", env = "DB_USER")]
    pub db_user: String,

    /// Database password.
    #[arg(long, default_value = "postgres", env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// Maximum number of pooled connections.
    #[arg(long, default_value_t = DEFAULT_DB_POOL_SIZE, env = "DB_POOL_SIZE")]
    pub db_pool_size: usize,

    /// Connect and pool-wait timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DB_CONNECT_TIMEOUT_MS, env = "DB_CONNECT_TIMEOUT_MS")]
    pub db_connect_timeout_ms: u64,

    /// Server-side statement timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DB_STATEMENT_TIMEOUT_MS, env = "DB_STATEMENT_TIMEOUT_MS")]
    pub db_statement_timeout_ms: u64,
}

impl DatabaseArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.db_pool_size == 0 {
            return Err("db_pool_size must be greater than 0".to_string());
        }
        if self.db_connect_timeout_ms == 0 {
            return Err("db_connect_timeout_ms must be greater than 0".to_string());
        }
        if self.db_statement_timeout_ms == 0 {
            return Err("db_statement_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Connection settings, from `DATABASE_URL` when set, else from the parts.
    pub fn pg_config(&self) -> Result<tokio_postgres::Config, SourceError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url
                .parse()
                .map_err(|e| SourceError::Config(format!("DATABASE_URL: {e}")));
        }

        let mut cfg = tokio_postgres::Config::new();
        cfg.host(&self.db_host)
            .port(self.db_port)
            .dbname(&self.db_name)
            .user(&self.db_user)
            .password(&self.db_password);
        Ok(cfg)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.db_pool_size,
            connect_timeout: Duration::from_millis(self.db_connect_timeout_ms),
            statement_timeout: Duration::from_millis(self.db_statement_timeout_ms),
        }
    }

    /// `user@host:port/db` for logs; never includes the password.
    pub fn describe(&self) -> String {
        if self.database_url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
            return "DATABASE_URL".to_string();
        }
        format!(
            "{}@{}:{}/{}",
            self.db_user, self.db_host, self.db_port, self.db_name
        )
    }
}

// Connection strings and passwords never reach logs through `{:?}`.
impl fmt::Debug for DatabaseArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseArgs")
            .field("database_url", &self.database_url.as_ref().map(|_| REDACTED))
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &REDACTED)
            .field("db_pool_size", &self.db_pool_size)
            .field("db_connect_timeout_ms", &self.db_connect_timeout_ms)
            .field("db_statement_timeout_ms", &self.db_statement_timeout_ms)
            .finish()
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Args, Clone)]
pub struct CacheArgs {
    /// Redis connection URL. Without it tiles are cached in process memory.
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    pub redis_url: Option<String>,

    /// Per-operation cache timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_TIMEOUT_MS, env = "CACHE_TIMEOUT_MS")]
    pub cache_timeout_ms: u64,

    /// Maximum number of tiles in the in-process cache.
    #[arg(long, default_value_t = DEFAULT_MEMORY_CACHE_ENTRIES, env = "CACHE_MEMORY_ENTRIES")]
    pub cache_memory_entries: usize,
}

impl CacheArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_timeout_ms == 0 {
            return Err("cache_timeout_ms must be greater than 0".to_string());
        }
        if self.cache_memory_entries == 0 {
            return Err("cache_memory_entries must be greater than 0".to_string());
        }
        Ok(())
    }

    /// The configured Redis URL, ignoring an empty value.
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Build the tile cache: Redis when configured, else in-process.
    ///
    /// Building never connects; use [`TileCache::ping`] to check reachability.
    pub fn build_cache(&self) -> Result<TileCache, CacheError> {
        let backend: Arc<dyn CacheBackend> = match self.redis_url() {
            Some(url) => Arc::new(RedisBackend::new(
                url,
                DEFAULT_REDIS_POOL_SIZE,
                self.cache_timeout(),
            )?),
            None => Arc::new(MemoryBackend::with_capacity(self.cache_memory_entries)),
        };
        Ok(TileCache::with_timeout(backend, self.cache_timeout()))
    }
}

impl fmt::Debug for CacheArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheArgs")
            .field("redis_url", &self.redis_url.as_ref().map(|_| REDACTED))
            .field("cache_timeout_ms", &self.cache_timeout_ms)
            .field("cache_memory_entries", &self.cache_memory_entries)
            .finish()
    }
}

// =============================================================================
// Check / Clear Cache Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub cache: CacheArgs,

    /// Show detailed output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClearCacheConfig {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Show detailed output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
