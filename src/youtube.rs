#![forbid(unsafe_code)]

//! Client for the YouTube Data API `videos` endpoint and the mapping from its
//! response items into [`VideoRecord`]s.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    config::Settings,
    error::ScrapeError,
    store::{Count, Document, Thumbnail, VideoRecord},
};

pub const REGION_CODE: &str = "IN";
pub const MAX_RESULTS: u32 = 50;
const PARTS: &str = "snippet,statistics,contentDetails";
const INVALID_RESPONSE: &str = "Invalid response from YouTube API";

/// Thin wrapper around a `ureq` agent. The agent is blocking, so every call
/// is moved onto tokio's blocking pool.
#[derive(Clone)]
pub struct YouTubeClient {
    api_key: Option<String>,
    api_base: String,
    agent: ureq::Agent,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.youtube_api_key.clone(),
            settings.youtube_api_base.clone(),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Requests up to [`MAX_RESULTS`] most popular videos for [`REGION_CODE`]
    /// and returns the raw `items`. Nothing is sent when no key is configured.
    pub async fn fetch_most_popular(&self) -> Result<Vec<Value>, ScrapeError> {
        let api_key = self.api_key.clone().ok_or(ScrapeError::Configuration)?;
        let agent = self.agent.clone();
        let url = format!("{}/videos", self.api_base);

        tokio::task::spawn_blocking(move || request_most_popular(&agent, &url, &api_key))
            .await
            .map_err(|err| ScrapeError::upstream(format!("task join error: {err}")))?
    }
}

fn request_most_popular(
    agent: &ureq::Agent,
    url: &str,
    api_key: &str,
) -> Result<Vec<Value>, ScrapeError> {
    let max_results = MAX_RESULTS.to_string();
    let response = agent
        .get(url)
        .query("part", PARTS)
        .query("chart", "mostPopular")
        .query("regionCode", REGION_CODE)
        .query("maxResults", &max_results)
        .query("key", api_key)
        .call()
        .map_err(describe_call_error)?;

    let body: Value = response
        .into_json()
        .map_err(|err| ScrapeError::upstream(format!("{INVALID_RESPONSE}: {err}")))?;
    extract_items(body)
}

// The request URL carries the API key, so transport errors are reported by
// kind and message only.
fn describe_call_error(err: ureq::Error) -> ScrapeError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            match api_error_message(&body) {
                Some(message) => ScrapeError::upstream(format!(
                    "YouTube API responded with status {code}: {message}"
                )),
                None => ScrapeError::upstream(format!("YouTube API responded with status {code}")),
            }
        }
        ureq::Error::Transport(transport) => {
            let mut message = format!("YouTube API request failed: {}", transport.kind());
            if let Some(detail) = transport.message() {
                message.push_str(": ");
                message.push_str(detail);
            }
            ScrapeError::upstream(message)
        }
    }
}

/// Pulls `error.message` out of a Google API error envelope.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn extract_items(body: Value) -> Result<Vec<Value>, ScrapeError> {
    match body {
        Value::Object(mut envelope) => match envelope.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ScrapeError::upstream(INVALID_RESPONSE)),
        },
        _ => Err(ScrapeError::upstream(INVALID_RESPONSE)),
    }
}

// Containers are typed and required by `map_item`. Leaves go through
// `lenient`, so a value of the wrong type is dropped instead of failing the
// item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideo {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    snippet: Option<ApiSnippet>,
    statistics: Option<ApiStatistics>,
    content_details: Option<ApiContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSnippet {
    #[serde(default, deserialize_with = "lenient")]
    published_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    channel_title: Option<String>,
    thumbnails: Option<ApiThumbnails>,
}

#[derive(Debug, Deserialize)]
struct ApiThumbnails {
    default: Option<ApiThumbnail>,
    medium: Option<ApiThumbnail>,
    high: Option<ApiThumbnail>,
}

#[derive(Debug, Deserialize)]
struct ApiThumbnail {
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    width: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    height: Option<u64>,
}

impl From<ApiThumbnail> for Thumbnail {
    fn from(thumb: ApiThumbnail) -> Self {
        Self {
            url: thumb.url,
            width: thumb.width,
            height: thumb.height,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatistics {
    #[serde(default, deserialize_with = "lenient")]
    view_count: Option<Count>,
    #[serde(default, deserialize_with = "lenient")]
    like_count: Option<Count>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiContentDetails {
    #[serde(default, deserialize_with = "lenient")]
    duration: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Maps every item or fails on the first malformed one. Callers rely on this
/// running to completion before anything is written.
pub fn map_items(items: Vec<Value>) -> Result<Vec<VideoRecord>, ScrapeError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| map_item(index, item))
        .collect()
}

/// Copies one API item into the stored record shape. Leaf values are copied
/// verbatim; the containers they live in are required.
pub fn map_item(index: usize, item: Value) -> Result<VideoRecord, ScrapeError> {
    let malformed = |reason: String| ScrapeError::MalformedItem { index, reason };
    let missing = |field: &str| malformed(format!("missing {field}"));

    let video: ApiVideo =
        serde_json::from_value(item).map_err(|err| malformed(format!("unexpected shape: {err}")))?;

    let id = video.id.ok_or_else(|| missing("id"))?;
    let snippet = video.snippet.ok_or_else(|| missing("snippet"))?;
    let statistics = video.statistics.ok_or_else(|| missing("statistics"))?;
    let content_details = video
        .content_details
        .ok_or_else(|| missing("contentDetails"))?;
    let thumbnails = snippet
        .thumbnails
        .ok_or_else(|| missing("snippet.thumbnails"))?;

    let video_thumbnails: Vec<Thumbnail> = vec![
        thumbnails
            .default
            .ok_or_else(|| missing("snippet.thumbnails.default"))?
            .into(),
        thumbnails
            .medium
            .ok_or_else(|| missing("snippet.thumbnails.medium"))?
            .into(),
        thumbnails
            .high
            .ok_or_else(|| missing("snippet.thumbnails.high"))?
            .into(),
    ];

    Ok(VideoRecord {
        video_id: Some(id.clone()),
        id,
        title: snippet.title,
        author: snippet.channel_title,
        author_id: snippet.channel_id,
        published: snippet.published_at,
        description: snippet.description,
        view_count: statistics.view_count,
        like_count: statistics.like_count,
        duration: content_details.duration.clone(),
        time_text: content_details.duration,
        video_thumbnails,
        extras: Document::new(),
    })
}
