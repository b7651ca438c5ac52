use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::StreamExt;
use harvest_logging::harvest_debug;
use harvester_core::{parse_iso8601_duration, DurationClass, VideoCandidate};
use serde_json::Value;

use crate::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// A date-ordered search of one channel's uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub channel_id: String,
    pub published_after: DateTime<Utc>,
    pub published_before: DateTime<Utc>,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub video_id: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// The external video metadata service. One method per billable call.
#[async_trait::async_trait]
pub trait VideoProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ProviderError>;

    /// Returns the raw detail items for up to one page of ids.
    async fn batch_details(&self, video_ids: &[String]) -> Result<Vec<Value>, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct YouTubeProvider {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl YouTubeProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ProviderError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, resource: &str, params: &[(&str, String)]) -> Result<reqwest::Url, ProviderError> {
        let base = self.settings.base_url.trim_end_matches('/');
        let mut url = reqwest::Url::parse(&format!("{base}/{resource}"))
            .map_err(|err| ProviderError::InvalidRequest(err.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if !self.settings.api_key.is_empty() {
                pairs.append_pair("key", &self.settings.api_key);
            }
        }
        Ok(url)
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<Value, ProviderError> {
        harvest_debug!("GET {}{}", url.origin().ascii_serialization(), url.path());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_message(&body).unwrap_or_else(|| status.to_string());
            let status = status.as_u16();
            return Err(if status == 401 || status == 403 {
                ProviderError::Auth { status, message }
            } else {
                ProviderError::HttpStatus { status, message }
            });
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ProviderError::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                });
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ProviderError::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&bytes).map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

#[async_trait::async_trait]
impl VideoProvider for YouTubeProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ProviderError> {
        let url = self.endpoint(
            "search",
            &[
                ("part", "id,snippet".to_string()),
                ("channelId", query.channel_id.clone()),
                ("type", "video".to_string()),
                ("order", "date".to_string()),
                ("maxResults", query.max_results.to_string()),
                ("publishedAfter", rfc3339(query.published_after)),
                ("publishedBefore", rfc3339(query.published_before)),
            ],
        )?;
        let body = self.get_json(url).await?;
        Ok(items(&body).iter().filter_map(parse_search_hit).collect())
    }

    async fn batch_details(&self, video_ids: &[String]) -> Result<Vec<Value>, ProviderError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(
            "videos",
            &[
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("id", video_ids.join(",")),
                ("maxResults", video_ids.len().to_string()),
            ],
        )?;
        let body = self.get_json(url).await?;
        Ok(items(&body).to_vec())
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn items(body: &Value) -> &[Value] {
    body.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_search_hit(item: &Value) -> Option<SearchHit> {
    let video_id = item.pointer("/id/videoId").and_then(Value::as_str)?;
    Some(SearchHit {
        video_id: video_id.to_string(),
        published_at: item
            .pointer("/snippet/publishedAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Statistics arrive as decimal strings; absent or hidden counts read as zero.
fn count(item: &Value, pointer: &str) -> u64 {
    match item.pointer(pointer) {
        Some(Value::String(raw)) => raw.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn text(item: &Value, pointer: &str) -> String {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Builds a candidate from one `videos` detail item. Items without an id or
/// a parseable publish time are skipped.
pub fn parse_video_item(item: &Value) -> Option<VideoCandidate> {
    let video_id = item.get("id").and_then(Value::as_str)?.to_string();
    let published_at = item
        .pointer("/snippet/publishedAt")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)?;
    let duration_secs = item
        .pointer("/contentDetails/duration")
        .and_then(Value::as_str)
        .map(parse_iso8601_duration)
        .unwrap_or(0);
    let tags = item
        .pointer("/snippet/tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(VideoCandidate {
        video_id,
        channel_id: text(item, "/snippet/channelId"),
        channel_title: text(item, "/snippet/channelTitle"),
        title: text(item, "/snippet/title"),
        description: text(item, "/snippet/description"),
        tags,
        published_at,
        view_count: count(item, "/statistics/viewCount"),
        like_count: count(item, "/statistics/likeCount"),
        comment_count: count(item, "/statistics/commentCount"),
        duration_secs,
        duration_class: DurationClass::classify(duration_secs),
        raw: item.clone(),
    })
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout;
    }
    if err.is_decode() {
        return ProviderError::Decode(err.to_string());
    }
    ProviderError::Network(err.to_string())
}
