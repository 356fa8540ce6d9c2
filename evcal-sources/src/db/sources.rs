//! SQLite-backed source repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evcal_common::db::{Event, Source, Venue};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use url::Url;

use super::{SourceDetails, SourceParams, SourceRepository};
use crate::error::{Error, Result};
use crate::fetcher::ParsedEvent;

const SOURCE_COLUMNS: &str = "id, url, title, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "id, source_id, venue_id, uid, title, description, url, start_time, end_time, created_at";

/// Run the source validation rules, replacing any previous errors.
///
/// Returns true when the source is valid.
pub fn validate(source: &mut Source) -> bool {
    source.errors.clear();

    let url = source.url.trim();
    if url.is_empty() {
        source.errors.add("url", "can't be blank");
    } else {
        let supported = Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https" | "webcal") && u.has_host())
            .unwrap_or(false);
        if !supported {
            source.errors.add("url", "is invalid");
        }
    }

    source.errors.is_empty()
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct SqliteSourceRepository {
    pool: SqlitePool,
}

impl SqliteSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Source>> {
        let source = sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources WHERE url = ? ORDER BY id LIMIT 1",
            SOURCE_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }
}

#[async_trait]
impl SourceRepository for SqliteSourceRepository {
    async fn find(&self, id: i64) -> Result<Source> {
        sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources WHERE id = ?",
            SOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::source_not_found(id.to_string()))
    }

    async fn find_with_details(&self, id: i64) -> Result<SourceDetails> {
        let source = self.find(id).await?;

        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE source_id = ? ORDER BY start_time",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let venues = sqlx::query_as::<_, Venue>(
            "SELECT id, source_id, title FROM venues WHERE source_id = ? ORDER BY title",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SourceDetails {
            source,
            events,
            venues,
        })
    }

    async fn find_or_create(&self, params: &SourceParams) -> Result<Source> {
        let url = params.url.as_deref().map(str::trim).unwrap_or_default();
        let title = clean(params.title.as_deref());

        if !url.is_empty() {
            if let Some(mut existing) = self.find_by_url(url).await? {
                debug!(source_id = existing.id, url, "Reusing existing source");
                if existing.title.is_none() && title.is_some() {
                    existing.title = title;
                    self.save(&mut existing).await?;
                }
                return Ok(existing);
            }
        }

        let mut source = Source::new(url, title);
        self.save(&mut source).await?;
        Ok(source)
    }

    async fn listing(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources ORDER BY created_at DESC, id DESC",
            SOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn listing_page(&self, limit: i64, offset: i64) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            SOURCE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn save(&self, source: &mut Source) -> Result<bool> {
        if !validate(source) {
            return Ok(false);
        }

        source.url = source.url.trim().to_string();
        let now = Utc::now();

        if source.is_persisted() {
            sqlx::query("UPDATE sources SET url = ?, title = ?, updated_at = ? WHERE id = ?")
                .bind(&source.url)
                .bind(&source.title)
                .bind(now)
                .bind(source.id)
                .execute(&self.pool)
                .await?;
            source.updated_at = Some(now);
            debug!(source_id = source.id, "Updated source");
        } else {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO sources (url, title, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(&source.url)
            .bind(&source.title)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
            source.id = id;
            source.created_at = Some(now);
            source.updated_at = Some(now);
            info!(source_id = id, url = %source.url, "Created source");
        }

        Ok(true)
    }

    async fn update(&self, source: &mut Source, params: &SourceParams) -> Result<bool> {
        if let Some(url) = &params.url {
            source.url = url.trim().to_string();
        }
        if params.title.is_some() {
            source.title = clean(params.title.as_deref());
        }
        self.save(source).await
    }

    async fn destroy(&self, source: &Source) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM events WHERE source_id = ?")
            .bind(source.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM venues WHERE source_id = ?")
            .bind(source.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(source_id = source.id, "Deleted source");
        Ok(())
    }

    async fn create_events(
        &self,
        source: &Source,
        entries: Vec<ParsedEvent>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();

        for entry in entries {
            if !entry.is_upcoming(now) {
                continue;
            }

            if let Some(uid) = &entry.uid {
                let seen: Option<i64> =
                    sqlx::query_scalar("SELECT id FROM events WHERE source_id = ? AND uid = ? LIMIT 1")
                        .bind(source.id)
                        .bind(uid)
                        .fetch_optional(&mut *tx)
                        .await?;
                if seen.is_some() {
                    continue;
                }
            }

            let venue_id = match entry.location.as_deref() {
                Some(location) => Some(find_or_create_venue(&mut *tx, source.id, location).await?),
                None => None,
            };

            let event = sqlx::query_as::<_, Event>(&format!(
                "INSERT INTO events (source_id, venue_id, uid, title, description, url, start_time, end_time, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
                EVENT_COLUMNS
            ))
            .bind(source.id)
            .bind(venue_id)
            .bind(&entry.uid)
            .bind(&entry.title)
            .bind(&entry.description)
            .bind(&entry.url)
            .bind(entry.start_time)
            .bind(entry.end_time)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            created.push(event);
        }

        tx.commit().await?;
        info!(source_id = source.id, count = created.len(), "Imported events");
        Ok(created)
    }

    async fn find_event(&self, id: i64) -> Result<Event> {
        sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::event_not_found(id.to_string()))
    }

    async fn upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE COALESCE(end_time, start_time) >= ? ORDER BY start_time, id",
            EVENT_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}

async fn find_or_create_venue(
    conn: &mut SqliteConnection,
    source_id: i64,
    title: &str,
) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM venues WHERE source_id = ? AND title = ? LIMIT 1")
            .bind(source_id)
            .bind(title)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i64 =
        sqlx::query_scalar("INSERT INTO venues (source_id, title) VALUES (?, ?) RETURNING id")
            .bind(source_id)
            .bind(title)
            .fetch_one(&mut *conn)
            .await?;
    Ok(id)
}
