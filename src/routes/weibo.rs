//! Weibo trending-search feed

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchContext, PlatformHandler};
use crate::error::{Error, Result};
use crate::models::{PlatformMeta, Record, Timestamp};
use crate::retry::fetch_with_retry;

const API_URL: &str = "https://m.weibo.cn/api/container/getIndex?containerid=106003type%3D25%26t%3D3%26disable_hot%3D1%26filter_type%3Drealtimehot";

// The mobile endpoint requires a mobile UA and referer.
const HEADERS: &[(&str, &str)] = &[
    ("Referer", "https://s.weibo.com/top/summary?cate=realtimehot"),
    ("MWeibo-Pwa", "1"),
    ("X-Requested-With", "XMLHttpRequest"),
    (
        "User-Agent",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 11_0 like Mac OS X) AppleWebKit/604.1.38 \
         (KHTML, like Gecko) Version/11.0 Mobile/15A372 Safari/604.1",
    ),
];

pub struct WeiboHandler;

impl WeiboHandler {
    pub fn new() -> Self {
        Self
    }

    fn transform(&self, items: Vec<WeiboItem>, out: &mut Vec<Record>) {
        for item in items {
            // The first group entry is usually a pinned promotion with no
            // description.
            if item.desc.is_empty() {
                continue;
            }

            let topic = if item.word_scheme.is_empty() {
                format!("#{}", item.desc)
            } else {
                item.word_scheme
            };

            out.push(Record {
                id: item.item_id,
                title: item.desc,
                desc: Some(topic.clone()),
                cover: None,
                author: None,
                hot: Some(item.num as f64),
                timestamp: (item.onboard_time > 0)
                    .then(|| Timestamp::Millis(item.onboard_time * 1000)),
                url: format!(
                    "https://s.weibo.com/weibo?q={}&t=31&band_rank=1&Refer=top",
                    urlencoding::encode(&topic)
                ),
                mobile_url: (!item.scheme.is_empty()).then_some(item.scheme),
            });
        }
    }
}

impl Default for WeiboHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformHandler for WeiboHandler {
    fn path(&self) -> &'static str {
        "/weibo"
    }

    fn meta(&self) -> PlatformMeta {
        PlatformMeta::new("weibo", "Weibo", "Trending")
            .with_description("Real-time trending topics on Weibo")
            .with_link("https://s.weibo.com/top/summary")
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<Record>> {
        let body = fetch_with_retry(&ctx.retry, &ctx.cancel, || ctx.http.get(API_URL, HEADERS))
            .await?;

        let response: WeiboResponse = serde_json::from_slice(&body)?;
        if response.ok != 1 {
            return Err(Error::MalformedPayload("weibo API reported failure".into()));
        }

        let group = response
            .data
            .cards
            .into_iter()
            .next()
            .map(|card| card.card_group)
            .filter(|group| !group.is_empty())
            .ok_or_else(|| Error::MalformedPayload("weibo response carried no card group".into()))?;

        let mut scratch = ctx.pools.acquire_record_list();
        self.transform(group, &mut scratch);
        let records = scratch.clone();
        ctx.pools.release_record_list(scratch);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct WeiboResponse {
    #[serde(default)]
    ok: i32,
    #[serde(default)]
    data: WeiboData,
}

#[derive(Debug, Default, Deserialize)]
struct WeiboData {
    #[serde(default)]
    cards: Vec<WeiboCard>,
}

#[derive(Debug, Deserialize)]
struct WeiboCard {
    #[serde(default)]
    card_group: Vec<WeiboItem>,
}

#[derive(Debug, Deserialize)]
struct WeiboItem {
    #[serde(rename = "itemid", default)]
    item_id: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    word_scheme: String,
    #[serde(default)]
    onboard_time: i64,
    #[serde(default)]
    num: i64,
    #[serde(default)]
    scheme: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(desc: &str, word_scheme: &str, num: i64) -> WeiboItem {
        WeiboItem {
            item_id: "id".to_string(),
            desc: desc.to_string(),
            word_scheme: word_scheme.to_string(),
            onboard_time: 1_700_000_000,
            num,
            scheme: "sinaweibo://x".to_string(),
        }
    }

    #[test]
    fn test_meta() {
        let handler = WeiboHandler::new();
        assert_eq!(handler.path(), "/weibo");
        assert_eq!(handler.cache_key(), "weibo_hot");
    }

    #[test]
    fn test_transform_skips_pinned_entries() {
        let handler = WeiboHandler::new();
        let mut out = Vec::new();
        handler.transform(vec![item("", "", 0), item("topic", "#topic#", 42)], &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "topic");
        assert_eq!(out[0].hot, Some(42.0));
        assert_eq!(out[0].timestamp, Some(Timestamp::Millis(1_700_000_000_000)));
    }

    #[test]
    fn test_transform_builds_search_url() {
        let handler = WeiboHandler::new();
        let mut out = Vec::new();
        handler.transform(vec![item("hot topic", "", 1)], &mut out);

        assert!(out[0].url.contains("%23hot%20topic"));
        assert_eq!(out[0].desc.as_deref(), Some("#hot topic"));
    }

    #[test]
    fn test_response_decoding_rejects_error_status() {
        let body = r#"{"ok": 0, "data": {"cards": []}}"#;
        let decoded: WeiboResponse = serde_json::from_slice(body.as_bytes()).unwrap();
        assert_eq!(decoded.ok, 0);
    }
}
