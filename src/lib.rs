//! Hotboard - Tiered-Cache Aggregation Gateway
//!
//! An API gateway that answers "the current hot items from platform X" with
//! a normalized list, served from cache or freshly fetched and transformed
//! from the upstream source.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HTTP Server                            │
//! │        (route dispatch, operational endpoints)                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Platform Handlers  ──▶  Fetch Orchestrator  ──▶  Tiered Cache│
//! │  (translate one          (cache-aside,           (L1 sharded  │
//! │   upstream feed)          single fetch per miss)  + L2 redis) │
//! │        │                                                      │
//! │        └──▶ Retry Executor + HTTP Client + Object Pools       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! At startup the warmup scheduler issues a bounded-concurrency batch of
//! synthetic requests for the highest-traffic feeds so real traffic lands on
//! a warm cache.
//!
//! # Modules
//!
//! - [`cache`] - Two-tier cache (in-process L1, redis L2)
//! - [`client`] - HTTP client for upstream platform APIs
//! - [`config`] - Aggregate configuration
//! - [`error`] - Error types
//! - [`fetcher`] - Cache-aside fetch orchestrator
//! - [`models`] - Normalized records and response envelopes
//! - [`pool`] - Reusable buffer and record-list pools
//! - [`retry`] - Bounded-retry executor with cancellable backoff
//! - [`routes`] - Platform handler trait, registry, and adapters
//! - [`server`] - HTTP serving layer
//! - [`warmup`] - Startup cache warmup

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pool;
pub mod retry;
pub mod routes;
pub mod server;
pub mod warmup;

// Re-export commonly used types
pub use cache::{CacheKey, CacheManager, L1Config, RedisConfig};
pub use client::HttpClient;
pub use config::Config;
pub use error::{Error, Result};
pub use fetcher::Fetcher;
pub use models::{PlatformMeta, Record, ResponseEnvelope};
pub use pool::ObjectPools;
pub use retry::RetryPolicy;
pub use routes::{PlatformHandler, Registry};
pub use warmup::{WarmupConfig, WarmupScheduler};
