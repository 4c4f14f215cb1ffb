//! Hotboard gateway binary
//!
//! Composition root: configuration, logging, cache tiers, orchestrator,
//! route registry, warmup and the HTTP server are all constructed here and
//! injected downward. No component reaches for global state.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hotboard::cache::{CacheManager, L1Config, RedisConfig};
use hotboard::client::HttpClient;
use hotboard::config::Config;
use hotboard::error::Result;
use hotboard::fetcher::Fetcher;
use hotboard::pool::ObjectPools;
use hotboard::retry::RetryPolicy;
use hotboard::routes::{HackerNewsHandler, Registry, V2exHandler, WeiboHandler};
use hotboard::server::{self, ServerConfig};
use hotboard::warmup::{WarmupConfig, WarmupScheduler};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Hotboard - tiered-cache aggregation gateway for trending-content feeds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen host
    #[arg(long, env = "HOTBOARD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(long, env = "HOTBOARD_PORT", default_value = "6688")]
    port: u16,

    /// Per-request handling deadline in seconds
    #[arg(long, env = "HOTBOARD_REQUEST_TIMEOUT_SECONDS", default_value = "30")]
    request_timeout_seconds: u64,

    /// L1 cache shard count
    #[arg(long, env = "HOTBOARD_L1_SHARDS", default_value = "1024")]
    l1_shards: usize,

    /// L1 default TTL in seconds
    #[arg(long, env = "HOTBOARD_L1_DEFAULT_TTL_SECONDS", default_value = "300")]
    l1_default_ttl_seconds: u64,

    /// L1 expired-entry cleanup interval in seconds
    #[arg(long, env = "HOTBOARD_L1_CLEANUP_SECONDS", default_value = "600")]
    l1_cleanup_seconds: u64,

    /// L1 maximum entry count
    #[arg(long, env = "HOTBOARD_L1_MAX_ENTRIES", default_value = "10000")]
    l1_max_entries: usize,

    /// L1 maximum single-entry size in bytes
    #[arg(long, env = "HOTBOARD_L1_MAX_ENTRY_BYTES", default_value = "524288")]
    l1_max_entry_bytes: usize,

    /// L1 maximum total size in megabytes
    #[arg(long, env = "HOTBOARD_L1_MAX_TOTAL_MB", default_value = "256")]
    l1_max_total_mb: u64,

    /// Enable the redis L2 tier
    #[arg(long, env = "HOTBOARD_REDIS_ENABLED")]
    redis_enabled: bool,

    /// Redis host
    #[arg(long, env = "HOTBOARD_REDIS_HOST", default_value = "localhost")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "HOTBOARD_REDIS_PORT", default_value = "6379")]
    redis_port: u16,

    /// Redis password
    #[arg(long, env = "HOTBOARD_REDIS_PASSWORD", default_value = "")]
    redis_password: String,

    /// Redis database index
    #[arg(long, env = "HOTBOARD_REDIS_DB", default_value = "0")]
    redis_db: i64,

    /// Redis per-operation timeout in seconds
    #[arg(long, env = "HOTBOARD_REDIS_TIMEOUT_SECONDS", default_value = "5")]
    redis_timeout_seconds: u64,

    /// Upstream retry attempts
    #[arg(long, env = "HOTBOARD_RETRY_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,

    /// Initial retry backoff in milliseconds
    #[arg(long, env = "HOTBOARD_RETRY_INITIAL_MS", default_value = "1000")]
    retry_initial_ms: u64,

    /// Maximum retry backoff in milliseconds
    #[arg(long, env = "HOTBOARD_RETRY_MAX_MS", default_value = "5000")]
    retry_max_ms: u64,

    /// Disable the startup cache warmup
    #[arg(long, env = "HOTBOARD_NO_WARMUP")]
    no_warmup: bool,

    /// Warmup concurrency cap
    #[arg(long, env = "HOTBOARD_WARMUP_CONCURRENCY", default_value = "3")]
    warmup_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            server: ServerConfig {
                host: self.host,
                port: self.port,
                request_timeout: Duration::from_secs(self.request_timeout_seconds),
            },
            l1: L1Config {
                shards: self.l1_shards,
                default_ttl: Duration::from_secs(self.l1_default_ttl_seconds),
                cleanup_interval: Duration::from_secs(self.l1_cleanup_seconds),
                max_entries: self.l1_max_entries,
                max_entry_size: self.l1_max_entry_bytes,
                max_total_bytes: self.l1_max_total_mb * 1024 * 1024,
            },
            redis: RedisConfig {
                enabled: self.redis_enabled,
                host: self.redis_host,
                port: self.redis_port,
                password: self.redis_password,
                db: self.redis_db,
                timeout: Duration::from_secs(self.redis_timeout_seconds),
            },
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                initial_delay: Duration::from_millis(self.retry_initial_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
            },
            warmup: WarmupConfig {
                enabled: !self.no_warmup,
                concurrency: self.warmup_concurrency,
                ..WarmupConfig::default()
            },
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);
    let config = args.into_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        redis_enabled = config.redis.enabled,
        "starting hotboard gateway"
    );

    // Cache tiers. An invalid L1 configuration aborts startup here; an
    // unreachable L2 has already degraded to L1-only inside init.
    let cache = Arc::new(CacheManager::init(config.l1.clone(), &config.redis).await?);
    let janitor = Arc::clone(&cache).spawn_janitor();

    // Shared plumbing, injected everywhere.
    let pools = Arc::new(ObjectPools::new());
    let http = Arc::new(HttpClient::new(pools.clone())?);
    let fetcher = Arc::new(Fetcher::new(cache, http, pools, config.retry));

    // Route registry.
    let mut registry = Registry::new(fetcher);
    registry.register(Arc::new(HackerNewsHandler::new()));
    registry.register(Arc::new(WeiboHandler::new()));
    registry.register(Arc::new(V2exHandler::new()));
    let registry = Arc::new(registry);
    info!(routes = registry.len(), "route registry ready");

    let shutdown = CancellationToken::new();

    // Warmup runs in the background; startup never blocks on it.
    let warmup = WarmupScheduler::new(Arc::clone(&registry), config.warmup.clone());
    let warmup_shutdown = shutdown.clone();
    tokio::spawn(async move {
        warmup.run(warmup_shutdown).await;
    });

    // Serve until ctrl-c.
    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(server::run(
        config.server.clone(),
        Arc::clone(&registry),
        server_shutdown,
    ));

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => info!("server stopped"),
                Ok(Err(err)) => {
                    error!(error = %err, "server failed");
                    return Err(err);
                }
                Err(err) => error!(error = %err, "server task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    }

    janitor.abort();
    info!("gateway shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(level: &str, json: bool) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=info".parse().expect("static directive"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
