//! Gateway configuration
//!
//! One aggregate [`Config`] composed of the per-component config structs
//! defined next to the components they configure. Defaults run a working
//! L1-only gateway; the binary's CLI/env flags override individual knobs.

use crate::cache::{L1Config, RedisConfig};
use crate::retry::RetryPolicy;
use crate::server::ServerConfig;
use crate::warmup::WarmupConfig;

/// Aggregate gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// L1 cache bounds
    pub l1: L1Config,
    /// L2 (redis) connection
    pub redis: RedisConfig,
    /// Default retry policy handed to adapters
    pub retry: RetryPolicy,
    /// Startup warmup
    pub warmup: WarmupConfig,
}

// =============================================================================
// Tests
// =============================================================================
