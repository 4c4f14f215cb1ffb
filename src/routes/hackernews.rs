//! Hacker News front-page feed

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchContext, PlatformHandler};
use crate::error::Result;
use crate::models::{PlatformMeta, Record};
use crate::retry::fetch_with_retry;

const API_URL: &str = "https://hn.algolia.com/api/v1/search?tags=front_page";

const HEADERS: &[(&str, &str)] = &[("Accept", "application/json")];

pub struct HackerNewsHandler;

impl HackerNewsHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HackerNewsHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformHandler for HackerNewsHandler {
    fn path(&self) -> &'static str {
        "/hackernews"
    }

    fn meta(&self) -> PlatformMeta {
        PlatformMeta::new("hackernews", "Hacker News", "Popular")
            .with_description("Top stories from the Hacker News front page")
            .with_link("https://news.ycombinator.com/")
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<Record>> {
        let body = fetch_with_retry(&ctx.retry, &ctx.cancel, || ctx.http.get(API_URL, HEADERS))
            .await?;

        let response: AlgoliaResponse = serde_json::from_slice(&body)?;

        let mut scratch = ctx.pools.acquire_record_list();
        for hit in response.hits {
            let title = if hit.title.is_empty() {
                hit.story_title
            } else {
                hit.title
            };
            if title.is_empty() {
                continue;
            }

            let url = if !hit.url.is_empty() {
                hit.url
            } else if !hit.story_url.is_empty() {
                hit.story_url
            } else {
                format!("https://news.ycombinator.com/item?id={}", hit.object_id)
            };

            scratch.push(Record {
                id: hit.object_id,
                title: title.trim().to_string(),
                desc: None,
                cover: None,
                author: Some(hit.author),
                hot: Some(hit.points as f64),
                timestamp: None,
                url: url.clone(),
                mobile_url: Some(url),
            });
        }

        let records = scratch.clone();
        ctx.pools.release_record_list(scratch);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct AlgoliaResponse {
    hits: Vec<AlgoliaHit>,
}

#[derive(Debug, Deserialize)]
struct AlgoliaHit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    story_title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    story_url: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    points: i64,
}

// =============================================================================
// Tests
// =============================================================================
