//! Shared fixtures for the library tests: a stored video record, a canned
//! YouTube API item and a local HTTP server standing in for the API.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{Json, Router, extract::RawQuery, http::StatusCode, routing::get};
use serde_json::{Value, json};

use crate::store::{Count, Document, Thumbnail, VideoRecord};

/// Fully populated record with `default`/`medium`/`high` thumbnails named
/// after their variant.
pub(crate) fn sample_video(id: &str, published: &str) -> VideoRecord {
    VideoRecord {
        id: id.to_owned(),
        video_id: Some(id.to_owned()),
        title: Some(format!("Video {id}")),
        author: Some("Channel".into()),
        author_id: Some("UC123".into()),
        published: Some(published.to_owned()),
        description: Some("desc".into()),
        view_count: Some(Count::Text("1000".into())),
        like_count: Some(Count::Text("10".into())),
        duration: Some("PT4M13S".into()),
        time_text: Some("PT4M13S".into()),
        video_thumbnails: ["default", "medium", "high"]
            .iter()
            .map(|size| Thumbnail {
                url: Some(format!("https://i.ytimg.com/vi/{id}/{size}.jpg")),
                width: Some(120),
                height: Some(90),
            })
            .collect(),
        extras: Document::new(),
    }
}

/// One `videos` item in the shape the Data API returns it.
pub(crate) fn api_item(id: &str, published: &str) -> Value {
    json!({
        "kind": "youtube#video",
        "etag": format!("etag-{id}"),
        "id": id,
        "snippet": {
            "publishedAt": published,
            "channelId": format!("UC{id}"),
            "title": format!("Title {id}"),
            "description": format!("Description of {id}\nsecond line"),
            "channelTitle": format!("Channel {id}"),
            "thumbnails": {
                "default": {"url": format!("https://i.ytimg.com/vi/{id}/default.jpg"), "width": 120, "height": 90},
                "medium": {"url": format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg"), "width": 320, "height": 180},
                "high": {"url": format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"), "width": 480, "height": 360},
                "standard": {"url": format!("https://i.ytimg.com/vi/{id}/sddefault.jpg"), "width": 640, "height": 480}
            }
        },
        "contentDetails": {"duration": "PT4M13S", "definition": "hd"},
        "statistics": {"viewCount": "1234", "likeCount": "56", "commentCount": "7"}
    })
}

pub(crate) struct FakeApi {
    pub base: String,
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<String>>>,
}

impl FakeApi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

/// Serves `body` with `status` on `GET {base}/videos` from an ephemeral port.
pub(crate) async fn spawn_fake_api(status: StatusCode, body: Value) -> FakeApi {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_query = Arc::new(Mutex::new(None));

    let app = Router::new().route(
        "/youtube/v3/videos",
        get({
            let hits = hits.clone();
            let last_query = last_query.clone();
            move |RawQuery(query): RawQuery| {
                let hits = hits.clone();
                let last_query = last_query.clone();
                let body = body.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    *last_query.lock().unwrap() = query;
                    (status, Json(body))
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeApi {
        base: format!("http://{addr}/youtube/v3"),
        hits,
        last_query,
    }
}
