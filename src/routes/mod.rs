//! Platform route handlers
//!
//! Every platform implements [`PlatformHandler`]: a route path, static feed
//! metadata, and a fetch that translates one upstream response into
//! normalized records. Handlers never talk to the cache tiers directly; the
//! [`Registry`] drives every request through the fetch orchestrator.

mod hackernews;
mod v2ex;
mod weibo;

pub use hackernews::HackerNewsHandler;
pub use v2ex::V2exHandler;
pub use weibo::WeiboHandler;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::models::{PlatformMeta, Record, ResponseEnvelope};
use crate::pool::ObjectPools;
use crate::retry::RetryPolicy;

/// Default cache lifetime for a feed
pub const DEFAULT_FEED_TTL: Duration = Duration::from_secs(300);

/// Per-request capabilities handed to an adapter's fetch
pub struct FetchContext {
    /// Shared HTTP client
    pub http: Arc<HttpClient>,
    /// Shared object pools
    pub pools: Arc<ObjectPools>,
    /// Retry policy for upstream calls
    pub retry: RetryPolicy,
    /// Fires when the owning request is canceled or times out
    pub cancel: CancellationToken,
}

/// One platform's route handler
#[async_trait]
pub trait PlatformHandler: Send + Sync {
    /// Route path, e.g. "/hackernews"
    fn path(&self) -> &'static str;

    /// Static feed metadata
    fn meta(&self) -> PlatformMeta;

    /// Cache key for this feed
    fn cache_key(&self) -> String {
        format!("{}_hot", self.meta().name)
    }

    /// Cache lifetime for this feed
    fn cache_ttl(&self) -> Duration {
        DEFAULT_FEED_TTL
    }

    /// Fetch and translate the upstream feed into normalized records
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<Record>>;
}

/// Route registry mapping paths to platform handlers
pub struct Registry {
    fetcher: Arc<Fetcher>,
    handlers: HashMap<&'static str, Arc<dyn PlatformHandler>>,
}

impl Registry {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            handlers: HashMap::new(),
        }
    }

    /// Register a platform handler under its route path.
    pub fn register(&mut self, handler: Arc<dyn PlatformHandler>) {
        self.handlers.insert(handler.path(), handler);
    }

    /// Look up a handler by route path.
    pub fn get(&self, path: &str) -> Option<Arc<dyn PlatformHandler>> {
        self.handlers.get(path).cloned()
    }

    /// All registered route paths, sorted.
    pub fn paths(&self) -> Vec<&'static str> {
        let mut paths: Vec<_> = self.handlers.keys().copied().collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Serve one feed request through the orchestrator.
    ///
    /// `refresh` invalidates the key first, so the response is fresh and
    /// truthfully labeled `fromCache: false`.
    pub async fn serve(
        &self,
        path: &str,
        refresh: bool,
        cancel: CancellationToken,
    ) -> Result<ResponseEnvelope> {
        let handler = self
            .get(path)
            .ok_or_else(|| Error::UnknownRoute(path.to_string()))?;

        let meta = handler.meta();
        let key = handler.cache_key();

        if refresh {
            self.fetcher.invalidate(&key).await?;
        }

        let ctx = FetchContext {
            http: self.fetcher.http().clone(),
            pools: self.fetcher.pools().clone(),
            retry: self.fetcher.retry_policy(),
            cancel,
        };

        self.fetcher
            .get_data(&key, &meta, handler.cache_ttl(), || async move {
                handler.fetch(&ctx).await
            })
            .await
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }
}

// =============================================================================
// Tests
// =============================================================================
