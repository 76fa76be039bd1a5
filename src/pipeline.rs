#![forbid(unsafe_code)]

//! Fetch → map → upsert, shared by `GET /scrape` and the `scrape` binary.

use futures::future::join_all;
use serde::Serialize;

use crate::{
    error::ScrapeError,
    store::{VideoRecord, VideoStore},
    youtube::{YouTubeClient, map_items},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSummary {
    pub videos_count: usize,
    pub saved_count: usize,
}

/// Issues every upsert at once and waits for all of them. One failure fails
/// the batch; upserts that already went through stay committed.
pub async fn upsert_all(
    store: &VideoStore,
    records: &[VideoRecord],
) -> Result<ScrapeSummary, ScrapeError> {
    let outcomes = join_all(records.iter().map(|record| store.upsert_video(record))).await;

    let mut failed = 0;
    for (record, outcome) in records.iter().zip(outcomes) {
        if let Err(err) = outcome {
            failed += 1;
            tracing::error!(video_id = %record.id, error = %format!("{err:#}"), "Failed to save video");
        }
    }

    if failed > 0 {
        return Err(ScrapeError::Persistence {
            failed,
            total: records.len(),
        });
    }

    Ok(ScrapeSummary {
        videos_count: records.len(),
        saved_count: records.len(),
    })
}

pub async fn scrape_trending(
    client: &YouTubeClient,
    store: &VideoStore,
) -> Result<ScrapeSummary, ScrapeError> {
    tracing::info!("Starting scrape of YouTube trending videos");

    let items = client.fetch_most_popular().await?;
    let records = map_items(items)?;
    tracing::info!("Fetched {} trending videos", records.len());

    let summary = upsert_all(store, &records).await?;
    tracing::info!(
        "Successfully saved {} videos to database",
        summary.saved_count
    );
    Ok(summary)
}
