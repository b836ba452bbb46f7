//! `PostgreSQL` connection pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config, NoTls, Row};
use tracing::{debug, error, info, warn};

use crate::error::SourceError;

/// Queries slower than this are logged at WARN.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(1000);

/// Sizing and timeout settings for [`PgPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of open connections
    pub max_size: usize,
    /// Bound on opening a connection and on waiting for a free one
    pub connect_timeout: Duration,
    /// Server-side `statement_timeout` applied to every session
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 20,
            connect_timeout: Duration::from_millis(2000),
            statement_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Running totals over every query issued through a [`PgPool`].
#[derive(Debug, Default)]
struct QueryCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    slow: AtomicU64,
    acquire_failures: AtomicU64,
    total_duration_ms: AtomicU64,
    longest_ms: AtomicU64,
}

impl QueryCounters {
    fn record(&self, outcome: Result<(), &SourceError>, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.total.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(ms, Ordering::Relaxed);
        self.longest_ms.fetch_max(ms, Ordering::Relaxed);
        if elapsed > SLOW_QUERY_THRESHOLD {
            self.slow.fetch_add(1, Ordering::Relaxed);
        }

        match outcome {
            Ok(()) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                match e {
                    SourceError::Timeout(_) => {
                        self.timed_out.fetch_add(1, Ordering::Relaxed);
                    }
                    SourceError::Connection(_) => {
                        self.acquire_failures.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        }
    }

    fn snapshot(&self) -> QueryStats {
        let total = self.total.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);
        QueryStats {
            total,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            slow: self.slow.load(Ordering::Relaxed),
            acquire_failures: self.acquire_failures.load(Ordering::Relaxed),
            average: Duration::from_millis(total_duration_ms.checked_div(total).unwrap_or(0)),
            longest: Duration::from_millis(self.longest_ms.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of a pool's query counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Failed queries cancelled by `statement_timeout`
    pub timed_out: u64,
    /// Queries slower than [`SLOW_QUERY_THRESHOLD`], whatever their outcome
    pub slow: u64,
    /// Failed queries that never got a connection
    pub acquire_failures: u64,
    pub average: Duration,
    pub longest: Duration,
}

/// Shared `PostgreSQL` pool.
///
/// Connections are opened lazily. Acquisition never waits longer than
/// [`PoolSettings::connect_timeout`], so an exhausted pool turns into an error
/// instead of a hung request.
#[derive(Clone, Debug)]
pub struct PgPool {
    id: String,
    pool: Pool,
    settings: PoolSettings,
    counters: Arc<QueryCounters>,
}

impl PgPool {
    /// Build a pool from connection settings.
    pub fn new(pg_cfg: Config, settings: PoolSettings) -> Result<Self, SourceError> {
        let pg_cfg = apply_session_settings(pg_cfg, &settings);
        let id = pg_cfg.get_dbname().unwrap_or("postgres").to_string();
        info!(
            database = %id,
            max_size = settings.max_size,
            connect_timeout_ms = settings.connect_timeout.as_millis() as u64,
            statement_timeout_ms = settings.statement_timeout.as_millis() as u64,
            "Creating database pool"
        );

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_cfg, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(settings.max_size)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(settings.connect_timeout))
            .create_timeout(Some(settings.connect_timeout))
            .recycle_timeout(Some(settings.connect_timeout))
            .build()
            .map_err(|e| SourceError::PoolBuild(format!("{id}: {e}")))?;

        Ok(Self {
            id,
            pool,
            settings,
            counters: Arc::default(),
        })
    }

    /// Get a connection, waiting at most the configured connect timeout.
    pub async fn get(&self) -> Result<Object, SourceError> {
        self.pool.get().await.map_err(|e| {
            let status = self.pool.status();
            warn!(
                database = %self.id,
                size = status.size,
                available = status.available,
                waiting = status.waiting,
                "Unable to get a database connection: {e}"
            );
            SourceError::Connection(format!("{}: {e}", self.id))
        })
    }

    /// Run a statement expected to return at most one row.
    ///
    /// Logs the duration at DEBUG, or at WARN when slower than
    /// [`SLOW_QUERY_THRESHOLD`], and adds the outcome to [`PgPool::query_stats`].
    /// Statement timeouts become [`SourceError::Timeout`].
    pub async fn query_opt(
        &self,
        context: &'static str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, SourceError> {
        let start = Instant::now();
        let result = self.execute(context, sql, params, start).await;
        let elapsed = start.elapsed();
        self.counters.record(result.as_ref().map(|_| ()), elapsed);

        if result.is_ok() {
            if elapsed > SLOW_QUERY_THRESHOLD {
                warn!(
                    context,
                    duration_ms = elapsed.as_millis() as u64,
                    query = %truncate(sql),
                    "Slow database query"
                );
            } else {
                debug!(
                    context,
                    duration_ms = elapsed.as_millis() as u64,
                    params = params.len(),
                    "Database query"
                );
            }
        }
        result
    }

    async fn execute(
        &self,
        context: &'static str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        start: Instant,
    ) -> Result<Option<Row>, SourceError> {
        let conn = self.get().await?;
        let statement = conn
            .prepare_cached(sql)
            .await
            .map_err(|e| self.query_error(e, context, start.elapsed()))?;
        conn.query_opt(&statement, params)
            .await
            .map_err(|e| self.query_error(e, context, start.elapsed()))
    }

    /// Totals over every query issued so far, shared by all clones of the pool.
    pub fn query_stats(&self) -> QueryStats {
        self.counters.snapshot()
    }

    /// Current connection counts: open, idle and tasks waiting for one.
    pub fn status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }

    /// Identifier used in logs (the database name).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    fn query_error(
        &self,
        e: tokio_postgres::Error,
        context: &'static str,
        elapsed: Duration,
    ) -> SourceError {
        if e.code() == Some(&SqlState::QUERY_CANCELED) {
            warn!(
                context,
                duration_ms = elapsed.as_millis() as u64,
                "Database query timeout"
            );
            SourceError::Timeout(self.settings.statement_timeout)
        } else {
            error!(
                context,
                duration_ms = elapsed.as_millis() as u64,
                "Database error: {e}"
            );
            SourceError::Query {
                context,
                message: e.to_string(),
            }
        }
    }
}

/// Apply per-session settings: connect timeout, TCP keepalives and the
/// server-side statement timeout. Existing `options` are preserved.
fn apply_session_settings(mut pg_cfg: Config, settings: &PoolSettings) -> Config {
    let timeout_option = format!(
        "-c statement_timeout={}",
        settings.statement_timeout.as_millis()
    );
    let options = match pg_cfg.get_options() {
        Some(existing) if !existing.is_empty() => format!("{existing} {timeout_option}"),
        _ => timeout_option,
    };
    pg_cfg
        .options(&options)
        .connect_timeout(settings.connect_timeout)
        .keepalives(true)
        .keepalives_idle(Duration::from_secs(10));
    pg_cfg
}

fn truncate(sql: &str) -> &str {
    match sql.char_indices().nth(200) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}
