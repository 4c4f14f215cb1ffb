//! Startup cache warmup
//!
//! Proactively populates the cache for a fixed list of high-traffic feeds so
//! the first real requests after a cold start are served hot. Runs once,
//! asynchronously, after a short delay that lets the listener and
//! configuration settle.
//!
//! In-flight warmups are capped by a counting semaphore so the gateway never
//! floods itself or the upstream platforms at boot; one feed failing to warm
//! is logged and does not abort the rest.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::routes::Registry;

/// Warmup configuration
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    /// Whether warmup runs at startup
    pub enabled: bool,
    /// Route paths to warm, highest traffic first
    pub paths: Vec<String>,
    /// Maximum simultaneous in-flight warmup fetches
    pub concurrency: usize,
    /// Delay before warmup starts
    pub startup_delay: Duration,
    /// Deadline for each individual warmup fetch
    pub fetch_timeout: Duration,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: vec![
                "/weibo".to_string(),
                "/hackernews".to_string(),
                "/v2ex".to_string(),
            ],
            concurrency: 3,
            startup_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Terminal warmup outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// One-shot warmup scheduler
pub struct WarmupScheduler {
    registry: Arc<Registry>,
    config: WarmupConfig,
}

impl WarmupScheduler {
    pub fn new(registry: Arc<Registry>, config: WarmupConfig) -> Self {
        Self { registry, config }
    }

    /// Run the warmup to completion and return the summary.
    ///
    /// Every configured path is attempted exactly once; at no point do more
    /// than `concurrency` fetches run simultaneously.
    pub async fn run(self, shutdown: CancellationToken) -> WarmupSummary {
        let WarmupConfig {
            enabled,
            paths,
            concurrency,
            startup_delay,
            fetch_timeout,
        } = self.config;

        if !enabled || paths.is_empty() {
            return WarmupSummary {
                attempted: 0,
                succeeded: 0,
                failed: 0,
                elapsed: Duration::ZERO,
            };
        }

        tokio::select! {
            _ = tokio::time::sleep(startup_delay) => {}
            _ = shutdown.cancelled() => {
                info!("shutdown before warmup started");
                return WarmupSummary {
                    attempted: 0,
                    succeeded: 0,
                    failed: 0,
                    elapsed: Duration::ZERO,
                };
            }
        }

        info!(feeds = paths.len(), concurrency, "starting cache warmup");
        let started = Instant::now();

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for path in paths.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let shutdown = shutdown.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };

                let outcome = tokio::time::timeout(
                    fetch_timeout,
                    registry.serve(&path, false, shutdown.child_token()),
                )
                .await;

                match outcome {
                    Ok(Ok(envelope)) => {
                        info!(path = %path, total = envelope.total, "warmup fetch succeeded");
                        true
                    }
                    Ok(Err(err)) => {
                        warn!(path = %path, error = %err, "warmup fetch failed");
                        false
                    }
                    Err(_) => {
                        warn!(path = %path, timeout = ?fetch_timeout, "warmup fetch timed out");
                        false
                    }
                }
            });
        }

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => succeeded += 1,
                _ => failed += 1,
            }
        }

        let summary = WarmupSummary {
            attempted: paths.len(),
            succeeded,
            failed,
            elapsed: started.elapsed(),
        };
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed = ?summary.elapsed,
            "cache warmup complete"
        );
        summary
    }
}

// =============================================================================
// Tests
// =============================================================================
