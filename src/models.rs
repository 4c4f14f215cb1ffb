//! Normalized data model shared by every platform adapter
//!
//! All upstream payloads are translated into [`Record`] lists; the serving
//! layer wraps them in a [`ResponseEnvelope`]. Field names on the wire stay
//! camelCase for compatibility with existing consumers.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One normalized unit of fetched content.
///
/// Immutable once constructed; owned by the envelope that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the platform
    pub id: String,
    /// Title
    pub title: String,
    /// Description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Cover image URL (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Author / publisher (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Popularity score (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot: Option<f64>,
    /// Publish time, millisecond epoch or platform-native string (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Detail page link
    pub url: String,
    /// Mobile link (optional)
    #[serde(
        rename = "mobileUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mobile_url: Option<String>,
}

/// Publish time as upstreams report it: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Millisecond epoch
    Millis(i64),
    /// Platform-native textual time
    Text(String),
}

/// Static description of one platform feed, supplied by its handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformMeta {
    /// Route name, e.g. "hackernews"
    pub name: String,
    /// Display title, e.g. "Hacker News"
    pub title: String,
    /// Feed kind, e.g. "Popular"
    pub kind: String,
    /// Platform description
    pub description: Option<String>,
    /// Official link
    pub link: Option<String>,
}

impl PlatformMeta {
    pub fn new(name: &str, title: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            kind: kind.to_string(),
            description: None,
            link: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_string());
        self
    }
}

/// Unified response shape returned by every feed route.
///
/// Constructed fresh per request and never mutated afterwards. Envelopes are
/// not cached; only the serialized record list is, and an envelope is rebuilt
/// around cached or fresh data on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Status code: 200 on success
    pub code: u16,
    /// Human-readable status
    pub message: String,
    /// Route name, e.g. "hackernews"
    pub name: String,
    /// Platform display title
    pub title: String,
    /// Feed kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Platform description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Official link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Generation time, RFC3339
    #[serde(rename = "updateTime")]
    pub update_time: String,
    /// Record count
    pub total: usize,
    /// Whether the data came from cache
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
    /// Normalized records
    pub data: Vec<Record>,
}

impl ResponseEnvelope {
    /// Build a success envelope around fresh or cached records.
    pub fn success(meta: &PlatformMeta, data: Vec<Record>, from_cache: bool) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            name: meta.name.clone(),
            title: meta.title.clone(),
            kind: meta.kind.clone(),
            description: meta.description.clone(),
            link: meta.link.clone(),
            update_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total: data.len(),
            from_cache,
            data,
        }
    }
}

/// Error body returned by the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record {
            id: "1".to_string(),
            title: "A".to_string(),
            desc: None,
            cover: None,
            author: Some("alice".to_string()),
            hot: Some(1234.0),
            timestamp: Some(Timestamp::Millis(1_700_000_000_000)),
            url: "http://x/1".to_string(),
            mobile_url: None,
        }
    }

    #[test]
    fn test_record_omits_empty_optionals() {
        let json = serde_json::to_value(sample_record()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("desc"));
        assert!(!obj.contains_key("cover"));
        assert!(!obj.contains_key("mobileUrl"));
        assert_eq!(obj["author"], "alice");
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: Record = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_timestamp_accepts_number_or_string() {
        let millis: Timestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(millis, Timestamp::Millis(1_700_000_000_000));

        let text: Timestamp = serde_json::from_str("\"2024-01-01\"").unwrap();
        assert_eq!(text, Timestamp::Text("2024-01-01".to_string()));
    }

    #[test]
    fn test_envelope_wire_names() {
        let meta = PlatformMeta::new("demo", "Demo", "Hot")
            .with_description("demo feed")
            .with_link("https://demo.example");
        let envelope = ResponseEnvelope::success(&meta, vec![sample_record()], true);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["fromCache"], true);
        assert_eq!(json["type"], "Hot");
        assert_eq!(json["total"], 1);
        assert!(json["updateTime"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_envelope_total_matches_data() {
        let meta = PlatformMeta::new("demo", "Demo", "Hot");
        let envelope = ResponseEnvelope::success(&meta, vec![], false);
        assert_eq!(envelope.total, 0);
        assert!(!envelope.from_cache);
        assert_eq!(envelope.code, 200);
    }
}
