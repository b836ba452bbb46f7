//! Road Tiles - A vector tile server for a road network.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use road_tiles::{
    config::{CheckConfig, ClearCacheConfig, Cli, Command, DatabaseArgs, ServeConfig},
    server::{create_router, RouterConfig},
    source::{ConnectionInfo, PgPool, PgRoadSource, RoadSource},
    tile::TileService,
    SourceError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
        Command::ClearCache(config) => run_clear_cache(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose, &config.log_level);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Database: {}", config.database.describe());
    info!(
        "  Pool: {} connections, {}ms connect timeout, {}ms statement timeout",
        config.database.db_pool_size,
        config.database.db_connect_timeout_ms,
        config.database.db_statement_timeout_ms
    );
    info!("  Tile timeout: {}ms", config.tile_timeout_ms);
    info!("  HTTP cache max-age: {}s", config.cache_max_age);

    // Database
    info!("");
    info!("Connecting to PostgreSQL...");
    let source = match connect_database(&config.database).await {
        Ok((source, info)) => {
            info!("  Connected successfully");
            info!("  Database: {} (user {})", info.database, info.user);
            info!("  Server time: {}", info.time);
            info!("  {}", info.version);
            source
        }
        Err(e) => {
            error!("  Failed to connect to PostgreSQL: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - The database server is running and reachable");
            error!("    - DATABASE_URL or DB_HOST/DB_PORT/DB_NAME are correct");
            error!("    - DB_USER/DB_PASSWORD are valid");
            return ExitCode::FAILURE;
        }
    };

    // Cache
    let cache = match config.cache.build_cache() {
        Ok(cache) => cache,
        Err(e) => {
            error!("Invalid cache configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match config.cache.redis_url() {
        Some(_) => info!("  Cache: redis ({}ms timeout)", config.cache.cache_timeout_ms),
        None => {
            warn!(
                "  Cache: in-process ({} tiles) - not shared between instances",
                config.cache.cache_memory_entries
            );
            warn!("         Set REDIS_URL to use a shared cache");
        }
    }
    if let Err(e) = cache.ping().await {
        warn!("  Cache unreachable: {} - serving without a cache until it recovers", e);
    }

    let pool = source.pool().clone();
    let tile_service =
        TileService::new(source, cache).with_source_timeout(config.tile_timeout());

    let router = create_router(tile_service, build_router_config(&config));

    let addr = config.bind_address();
    let public_url = config.public_base_url();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl {}/api/health", public_url);
    info!("    curl {}/api/stats", public_url);
    info!("");
    info!("  Tiles:");
    info!("    {}/api/tiles/{{z}}/{{x}}/{{y}}.mvt", public_url);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    log_query_stats(&pool);
    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██████╗  ██████╗  █████╗ ██████╗     ████████╗██╗██╗     ███████╗███████╗");
    info!("██╔══██╗██╔═══██╗██╔══██╗██╔══██╗    ╚══██╔══╝██║██║     ██╔════╝██╔════╝");
    info!("██████╔╝██║   ██║███████║██║  ██║       ██║   ██║██║     █████╗  ███████╗");
    info!("██╔══██╗██║   ██║██╔══██║██║  ██║       ██║   ██║██║     ██╔══╝  ╚════██║");
    info!("██║  ██║╚██████╔╝██║  ██║██████╔╝       ██║   ██║███████╗███████╗███████║");
    info!("╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═════╝        ╚═╝   ╚═╝╚══════╝╚══════╝╚══════╝");
    info!("");
    info!("                                v{}", version);
}

/// Build the pool and run the connection check.
async fn connect_database(
    args: &DatabaseArgs,
) -> Result<(PgRoadSource, ConnectionInfo), SourceError> {
    let pool = PgPool::new(args.pg_config()?, args.pool_settings())?;
    let source = PgRoadSource::new(pool);
    let info = source.check_connection().await?;
    Ok((source, info))
}

/// Log the query totals gathered since startup.
fn log_query_stats(pool: &PgPool) {
    let stats = pool.query_stats();
    let status = pool.status();
    info!(
        total = stats.total,
        succeeded = stats.succeeded,
        failed = stats.failed,
        timed_out = stats.timed_out,
        slow = stats.slow,
        acquire_failures = stats.acquire_failures,
        average_ms = stats.average.as_millis() as u64,
        longest_ms = stats.longest.as_millis() as u64,
        "Database query totals"
    );
    info!(
        size = status.size,
        available = status.available,
        waiting = status.waiting,
        "Database pool status"
    );
}

/// Initialize the tracing/logging subsystem.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug and
/// `level` applies to this crate and the HTTP layer.
fn init_logging(verbose: bool, level: &str) {
    let env_filter = if verbose {
        "road_tiles=debug,tower_http=debug".to_string()
    } else {
        format!("road_tiles={level},tower_http={level}")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_public_url(config.public_base_url())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve on Ctrl-C so in-flight requests can finish.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => {
            error!("Unable to listen for the shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true, "debug");
    }

    println!("Road Tiles Configuration Check");
    println!("══════════════════════════════");
    println!();

    if let Err(e) = config.database.validate() {
        println!("✗ Database configuration: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = config.cache.validate() {
        println!("✗ Cache configuration: {}", e);
        return ExitCode::FAILURE;
    }
    println!("✓ Database: {}", config.database.describe());

    print!("Testing database connection... ");
    let database_ok = match connect_database(&config.database).await {
        Ok((source, info)) => {
            println!("✓ success");
            println!("  Database: {}", info.database);
            println!("  User: {}", info.user);
            println!("  Server time: {}", info.time);
            println!("  Version: {}", info.version);
            let stats = source.pool().query_stats();
            println!(
                "  Queries: {} ok, {} failed, longest {}ms",
                stats.succeeded,
                stats.failed,
                stats.longest.as_millis()
            );
            true
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The database server is running and reachable");
            println!("  - DATABASE_URL or DB_HOST/DB_PORT/DB_NAME are correct");
            println!("  - DB_USER/DB_PASSWORD are valid");
            false
        }
    };
    println!();

    match config.cache.build_cache() {
        Ok(cache) => {
            print!("Testing {} cache... ", cache.backend_name());
            match cache.ping().await {
                Ok(()) => println!("✓ success"),
                // The server runs without a cache, so this is not fatal
                Err(e) => println!("⚠ unavailable ({})", e),
            }
        }
        Err(e) => println!("⚠ Cache configuration: {}", e),
    }

    println!();
    println!("══════════════════════════════");
    if database_ok {
        println!("✓ All required checks passed!");
        ExitCode::SUCCESS
    } else {
        println!("✗ Database check failed");
        ExitCode::FAILURE
    }
}

// =============================================================================
// Clear Cache Command
// =============================================================================

async fn run_clear_cache(config: ClearCacheConfig) -> ExitCode {
    if config.verbose {
        init_logging(true, "debug");
    }

    if let Err(e) = config.cache.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    if config.cache.redis_url().is_none() {
        eprintln!("Error: REDIS_URL is not set.");
        eprintln!();
        eprintln!("Without a shared cache, tiles live in the server's own memory and");
        eprintln!("are dropped when it restarts.");
        return ExitCode::FAILURE;
    }

    let cache = match config.cache.build_cache() {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cache.clear().await {
        Ok(count) => {
            println!("✓ Cleared {} cached tile(s)", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to clear the tile cache: {}", e);
            ExitCode::FAILURE
        }
    }
}
