//! Video document store.
//!
//! Records are persisted as JSON documents in a single libsql table keyed by
//! the YouTube video id. The document is schema-less: whatever keys it holds
//! are written back untouched, and decoding into [`VideoRecord`] never fails
//! because of a missing or mistyped field.

use std::{fmt, path::Path};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, params};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Raw document as it sits in the `document` column.
pub type Document = Map<String, Value>;

/// Counters are kept exactly as the API formatted them. YouTube sends
/// numeric strings, older documents may hold plain integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Number(u64),
    Text(String),
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Number(value) => write!(f, "{value}"),
            Count::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

/// Application-side view of a stored document.
///
/// Only `id` is guaranteed. Keys this struct does not know about are kept in
/// `extras` so a read-modify-write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub video_thumbnails: Vec<Thumbnail>,
    #[serde(flatten)]
    pub extras: Document,
}

impl VideoRecord {
    /// Decodes a stored document field by field. Anything that does not fit
    /// the expected type is treated as absent.
    pub fn from_document(id: impl Into<String>, mut doc: Document) -> Self {
        doc.remove("id");
        let video_thumbnails = match doc.remove("videoThumbnails") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        };

        Self {
            id: id.into(),
            video_id: take(&mut doc, "videoId"),
            title: take(&mut doc, "title"),
            author: take(&mut doc, "author"),
            author_id: take(&mut doc, "authorId"),
            published: take(&mut doc, "published"),
            description: take(&mut doc, "description"),
            view_count: take(&mut doc, "viewCount"),
            like_count: take(&mut doc, "likeCount"),
            duration: take(&mut doc, "duration"),
            time_text: take(&mut doc, "timeText"),
            video_thumbnails,
            extras: doc,
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self).context("serializing video record")? {
            Value::Object(map) => Ok(map),
            other => bail!("video record serialized to non-object JSON: {other}"),
        }
    }

    /// Sort key stored next to the document. RFC 3339 timestamps are
    /// normalized to UTC with a fixed nine-digit fraction so they compare
    /// correctly as text.
    pub fn published_key(&self) -> Option<String> {
        let raw = self.published.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
            ),
            Err(_) => Some(raw.to_string()),
        }
    }
}

fn take<T: DeserializeOwned>(doc: &mut Document, key: &str) -> Option<T> {
    doc.remove(key)
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Projection used by the trending page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    pub id: String,
    pub time_text: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub view_count: Option<Count>,
    /// Second thumbnail variant (medium) when the record has one.
    pub thumbnail: Option<Thumbnail>,
}

impl From<VideoRecord> for TrendingEntry {
    fn from(record: VideoRecord) -> Self {
        let thumbnail = record.video_thumbnails.into_iter().nth(1);
        Self {
            id: record.id,
            time_text: record.time_text,
            author: record.author,
            title: record.title,
            view_count: record.view_count,
            thumbnail,
        }
    }
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            published TEXT,
            document TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published);
        "#,
    )
    .await?;
    Ok(())
}

/// Cloneable handle over one libsql connection. Opened once at startup and
/// shared by every request.
#[derive(Clone)]
pub struct VideoStore {
    conn: Connection,
}

impl VideoStore {
    /// Opens (and if necessary creates) the database and its schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening video DB {}", path.display()))?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn)
            .await
            .context("creating video schema")?;
        Ok(Self { conn })
    }

    /// Inserts the record or replaces the stored document wholesale.
    pub async fn upsert_video(&self, record: &VideoRecord) -> Result<()> {
        let document = serde_json::to_string(&record.to_document()?)
            .context("encoding video document")?;
        let published = record.published_key();

        self.conn
            .execute(
                r#"
                INSERT INTO videos (id, published, document)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    published = excluded.published,
                    document = excluded.document
                "#,
                params![record.id.as_str(), published.as_deref(), document],
            )
            .await
            .with_context(|| format!("upserting video {}", record.id))?;

        Ok(())
    }

    /// Newest `limit` records by publish time, projected for the list page.
    pub async fn trending(&self, limit: usize) -> Result<Vec<TrendingEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, document
                FROM videos
                ORDER BY published DESC, id ASC
                LIMIT ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![limit as i64]).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let document: String = row.get(1)?;
            entries.push(TrendingEntry::from(decode_row(id, &document)));
        }
        Ok(entries)
    }

    pub async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, document FROM videos WHERE id = ?1")
            .await?;

        let mut rows = stmt.query([id]).await?;
        if let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let document: String = row.get(1)?;
            Ok(Some(decode_row(id, &document)))
        } else {
            Ok(None)
        }
    }

    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM videos", params![])
            .await?;
        let row = rows.next().await?.context("missing count row")?;
        let count: i64 = row.get(0)?;
        Ok(count.max(0) as u64)
    }

    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).await?;
        Ok(())
    }
}

fn decode_row(id: String, document: &str) -> VideoRecord {
    let doc = match serde_json::from_str::<Value>(document) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::warn!(video_id = %id, "stored document is not a JSON object; rendering it empty");
            Document::new()
        }
    };
    VideoRecord::from_document(id, doc)
}
