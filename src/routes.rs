#![forbid(unsafe_code)]

//! HTTP surface: the two HTML pages, the scrape trigger and static assets.
//!
//! Every failure leaves as `{success: false, error}` JSON; ingestion failures
//! also carry `errorType`.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path as AxumPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use mime_guess::MimeGuess;
use serde::Serialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::{
    error::{PageError, ScrapeError},
    pipeline::{ScrapeSummary, scrape_trending},
    store::{VideoRecord, VideoStore},
    views,
    youtube::YouTubeClient,
};

pub const TRENDING_LIMIT: usize = 60;

#[derive(Clone)]
pub struct AppState {
    store: VideoStore,
    youtube: YouTubeClient,
    assets_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(store: VideoStore, youtube: YouTubeClient, assets_dir: PathBuf) -> Self {
        Self {
            store,
            youtube,
            assets_dir: Arc::new(assets_dir),
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    error_type: Option<&'static str>,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            error_type: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            error_type: None,
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::NotFound => Self::not_found(err.to_string()),
            PageError::Storage(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        Self {
            error_type: Some(err.kind()),
            ..Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "success": false,
            "error": self.message,
        });
        if let Some(error_type) = self.error_type {
            body["errorType"] = error_type.into();
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    success: bool,
    #[serde(flatten)]
    summary: ScrapeSummary,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(trending))
        .route("/video/{video_id}", get(video_detail))
        .route("/scrape", get(scrape))
        .route("/assets/{*path}", get(asset))
        .with_state(state)
}

async fn trending(State(state): State<AppState>) -> ApiResult<Html<String>> {
    tracing::info!("Fetching trending videos from database");
    let entries = state
        .store
        .trending(TRENDING_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = %format!("{err:#}"), "Error fetching trending videos");
            ApiError::from(PageError::Storage(err))
        })?;
    tracing::info!(count = entries.len(), "Trending videos fetched");
    Ok(Html(views::render_trending(&entries)))
}

async fn video_detail(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
) -> ApiResult<Html<String>> {
    tracing::info!(%video_id, "Fetching video details");
    let record = load_video(&state.store, &video_id).await.map_err(|err| {
        match &err {
            PageError::NotFound => tracing::warn!(%video_id, "Video not found"),
            PageError::Storage(source) => {
                tracing::error!(%video_id, error = %format!("{source:#}"), "Error fetching video details")
            }
        }
        ApiError::from(err)
    })?;
    Ok(Html(views::render_video(&record)))
}

async fn load_video(store: &VideoStore, video_id: &str) -> Result<VideoRecord, PageError> {
    store.get_video(video_id).await?.ok_or(PageError::NotFound)
}

async fn scrape(State(state): State<AppState>) -> ApiResult<Json<ScrapeResponse>> {
    match scrape_trending(&state.youtube, &state.store).await {
        Ok(summary) => Ok(Json(ScrapeResponse {
            success: true,
            summary,
        })),
        Err(err) => {
            tracing::error!(error_type = err.kind(), error = %err, "Error during YouTube API fetch");
            Err(ApiError::from(err))
        }
    }
}

async fn asset(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
) -> ApiResult<Response> {
    let target = resolve_asset_path(&state.assets_dir, &path)?;
    stream_file(target).await
}

/// Maps a request path onto the assets directory. Only plain path segments
/// are accepted, so `..` and absolute paths never escape the root.
fn resolve_asset_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::not_found("file not found"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("file not found"));
    }

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, metadata.len().into());
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{api_item, sample_video, spawn_fake_api};
    use axum::{body::to_bytes, http::Request};
    use serde_json::{Value, json};
    use tempfile::tempdir;
    use tower::ServiceExt;

    struct TestApp {
        _temp: tempfile::TempDir,
        store: VideoStore,
        state: AppState,
    }

    impl TestApp {
        async fn new() -> Self {
            Self::with_youtube(YouTubeClient::new(None, "http://127.0.0.1:9/v3")).await
        }

        async fn with_youtube(youtube: YouTubeClient) -> Self {
            let temp = tempdir().unwrap();
            let store = VideoStore::open(&temp.path().join("videos.db"))
                .await
                .unwrap();
            let assets_dir = temp.path().join("assets");
            std::fs::create_dir_all(&assets_dir).unwrap();

            Self {
                state: AppState::new(store.clone(), youtube, assets_dir),
                store,
                _temp: temp,
            }
        }

        async fn get(&self, uri: &str) -> (StatusCode, Option<String>, String) {
            let response = router(self.state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (
                status,
                content_type,
                String::from_utf8_lossy(&body).into_owned(),
            )
        }

        async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
            let (status, _, body) = self.get(uri).await;
            (status, serde_json::from_str(&body).unwrap())
        }
    }

    #[tokio::test]
    async fn trending_page_lists_newest_first() {
        let app = TestApp::new().await;
        app.store
            .upsert_video(&sample_video("older", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        app.store
            .upsert_video(&sample_video("newer", "2024-06-01T00:00:00Z"))
            .await
            .unwrap();

        let (status, content_type, body) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        let newer = body.find("Video newer").expect("newer listed");
        let older = body.find("Video older").expect("older listed");
        assert!(newer < older);
        assert!(body.contains("/vi/newer/medium.jpg"));
    }

    #[tokio::test]
    async fn trending_page_shows_at_most_sixty_videos() {
        let app = TestApp::new().await;
        for n in 0..65 {
            let published = format!("2024-01-01T00:{:02}:00Z", n % 60);
            app.store
                .upsert_video(&sample_video(&format!("v{n:02}"), &published))
                .await
                .unwrap();
        }

        let (status, _, body) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.matches("class=\"video-card\"").count(), TRENDING_LIMIT);
    }

    #[tokio::test]
    async fn pages_render_sparse_documents() {
        let app = TestApp::new().await;
        app.store
            .upsert_video(&VideoRecord {
                id: "bare".into(),
                ..VideoRecord::default()
            })
            .await
            .unwrap();

        let (status, _, body) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/video/bare"));

        let (status, _, body) = app.get("/video/bare").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("watch?v=bare"));
    }

    #[tokio::test]
    async fn video_page_renders_record() {
        let app = TestApp::new().await;
        app.store
            .upsert_video(&sample_video("abc", "2024-05-01T10:00:00Z"))
            .await
            .unwrap();

        let (status, content_type, body) = app.get("/video/abc").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(body.contains("<h1>Video abc</h1>"));
        assert!(body.contains("/vi/abc/high.jpg"));
    }

    #[tokio::test]
    async fn unknown_video_is_404() {
        let app = TestApp::new().await;
        let (status, body) = app.get_json("/video/never-ingested").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "error": "Video not found"}));
    }

    #[tokio::test]
    async fn broken_store_turns_both_pages_into_500() {
        let app = TestApp::new().await;
        app.store
            .upsert_video(&sample_video("abc", "2024-05-01T10:00:00Z"))
            .await
            .unwrap();
        app.store.execute_batch("DROP TABLE videos;").await.unwrap();

        for uri in ["/", "/video/abc"] {
            let (status, body) = app.get_json(uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(body["success"], false, "{uri}");
            assert!(
                body["error"].as_str().is_some_and(|message| !message.is_empty()),
                "{uri}: {body}"
            );
            assert!(body.get("errorType").is_none(), "{uri}");
        }
    }

    #[tokio::test]
    async fn scrape_without_key_fails_without_side_effects() {
        let fake = spawn_fake_api(
            StatusCode::OK,
            json!({"items": [api_item("a", "2024-05-01T10:00:00Z")]}),
        )
        .await;
        let app = TestApp::with_youtube(YouTubeClient::new(None, fake.base.clone())).await;

        let (status, body) = app.get_json("/scrape").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": "YouTube API key not configured",
                "errorType": "ConfigurationError"
            })
        );
        assert_eq!(fake.hits(), 0);
        assert_eq!(app.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scrape_reports_counts_and_is_idempotent() {
        let fake = spawn_fake_api(
            StatusCode::OK,
            json!({"items": [
                api_item("a", "2024-05-01T10:00:00Z"),
                api_item("b", "2024-05-01T11:00:00Z")
            ]}),
        )
        .await;
        let app =
            TestApp::with_youtube(YouTubeClient::new(Some("key".into()), fake.base.clone())).await;

        let (status, body) = app.get_json("/scrape").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"success": true, "videosCount": 2, "savedCount": 2})
        );
        assert_eq!(fake.hits(), 1);

        let (status, _) = app.get_json("/scrape").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fake.hits(), 2);
        assert_eq!(app.store.count().await.unwrap(), 2);

        let (_, _, page) = app.get("/video/a").await;
        assert!(page.contains("Title a"));
    }

    #[tokio::test]
    async fn scrape_without_items_is_upstream_error() {
        let fake = spawn_fake_api(StatusCode::OK, json!({"kind": "youtube#videoListResponse"})).await;
        let app =
            TestApp::with_youtube(YouTubeClient::new(Some("key".into()), fake.base.clone())).await;

        let (status, body) = app.get_json("/scrape").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["errorType"], "UpstreamError");
        assert_eq!(body["error"], "Invalid response from YouTube API");
        assert_eq!(app.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scrape_with_unreachable_api_is_upstream_error() {
        let app = TestApp::with_youtube(YouTubeClient::new(
            Some("key".into()),
            "http://127.0.0.1:9/v3",
        ))
        .await;

        let (status, body) = app.get_json("/scrape").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorType"], "UpstreamError");
    }

    #[tokio::test]
    async fn assets_are_served_with_mime_type() {
        let app = TestApp::new().await;
        std::fs::write(app.state.assets_dir.join("style.css"), "body{}").unwrap();

        let (status, content_type, body) = app.get("/assets/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/css"));
        assert_eq!(body, "body{}");
    }

    #[tokio::test]
    async fn missing_asset_is_404() {
        let app = TestApp::new().await;
        let (status, body) = app.get_json("/assets/nope.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "error": "file not found"}));
    }

    #[test]
    fn asset_paths_cannot_escape_root() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve_asset_path(root, "css/site.css").unwrap(),
            PathBuf::from("/srv/assets/css/site.css")
        );
        for bad in ["../secret.txt", "css/../../etc/passwd", "", "./style.css"] {
            let err = resolve_asset_path(root, bad).unwrap_err();
            assert_eq!(err.status, StatusCode::NOT_FOUND, "{bad} was accepted");
        }
    }
}
