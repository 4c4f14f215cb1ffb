//! V2EX hot-topics feed

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchContext, PlatformHandler};
use crate::error::Result;
use crate::models::{PlatformMeta, Record, Timestamp};
use crate::retry::fetch_with_retry;

const API_URL: &str = "https://www.v2ex.com/api/topics/hot.json";

const HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
];

pub struct V2exHandler;

impl V2exHandler {
    pub fn new() -> Self {
        Self
    }

    fn transform(&self, topics: Vec<V2exTopic>, out: &mut Vec<Record>) {
        for topic in topics {
            out.push(Record {
                id: topic.id.to_string(),
                title: topic.title,
                desc: (!topic.content.is_empty()).then_some(topic.content),
                cover: None,
                author: (!topic.member.username.is_empty()).then_some(topic.member.username),
                hot: Some(topic.replies as f64),
                timestamp: (topic.created > 0).then(|| Timestamp::Millis(topic.created * 1000)),
                url: topic.url.clone(),
                mobile_url: Some(topic.url),
            });
        }
    }
}

impl Default for V2exHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformHandler for V2exHandler {
    fn path(&self) -> &'static str {
        "/v2ex"
    }

    fn meta(&self) -> PlatformMeta {
        PlatformMeta::new("v2ex", "V2EX", "Hot Topics")
            .with_description("The most discussed topics on V2EX")
            .with_link("https://www.v2ex.com/")
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<Record>> {
        let body = fetch_with_retry(&ctx.retry, &ctx.cancel, || ctx.http.get(API_URL, HEADERS))
            .await?;

        let topics: Vec<V2exTopic> = serde_json::from_slice(&body)?;

        let mut scratch = ctx.pools.acquire_record_list();
        self.transform(topics, &mut scratch);
        let records = scratch.clone();
        ctx.pools.release_record_list(scratch);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct V2exTopic {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    replies: i64,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    member: V2exMember,
}

#[derive(Debug, Default, Deserialize)]
struct V2exMember {
    #[serde(default)]
    username: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta() {
        let handler = V2exHandler::new();
        assert_eq!(handler.path(), "/v2ex");
        assert_eq!(handler.cache_key(), "v2ex_hot");
    }

    #[test]
    fn test_transform() {
        let handler = V2exHandler::new();
        let topics = vec![V2exTopic {
            id: 42,
            title: "Topic".to_string(),
            content: "Body".to_string(),
            url: "https://www.v2ex.com/t/42".to_string(),
            replies: 7,
            created: 1_700_000_000,
            member: V2exMember {
                username: "alice".to_string(),
            },
        }];

        let mut out = Vec::new();
        handler.transform(topics, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "42");
        assert_eq!(out[0].author.as_deref(), Some("alice"));
        assert_eq!(out[0].hot, Some(7.0));
        assert_eq!(out[0].timestamp, Some(Timestamp::Millis(1_700_000_000_000)));
        assert_eq!(out[0].mobile_url.as_deref(), Some("https://www.v2ex.com/t/42"));
    }

    #[test]
    fn test_decoding_tolerates_missing_fields() {
        let body = r#"[{"id": 1}]"#;
        let topics: Vec<V2exTopic> = serde_json::from_slice(body.as_bytes()).unwrap();
        assert_eq!(topics[0].id, 1);
        assert!(topics[0].title.is_empty());
        assert!(topics[0].member.username.is_empty());
    }
}
