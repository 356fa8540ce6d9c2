//! Persistence for sources and the events imported from them
//!
//! Handlers and the import workflow only see the [`SourceRepository`] trait;
//! [`SqliteSourceRepository`] is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evcal_common::db::{Event, Source, Venue};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetcher::ParsedEvent;

mod sources;
pub use sources::{validate, SqliteSourceRepository};

/// User-supplied source attributes (form fields or JSON body)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceParams {
    pub url: Option<String>,
    pub title: Option<String>,
}

/// A source together with everything imported from it
#[derive(Debug, Clone, Serialize)]
pub struct SourceDetails {
    #[serde(flatten)]
    pub source: Source,
    pub events: Vec<Event>,
    pub venues: Vec<Venue>,
}

#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Load a source or fail with `Error::NotFound`
    async fn find(&self, id: i64) -> Result<Source>;

    /// Load a source with its events and venues or fail with `Error::NotFound`
    async fn find_with_details(&self, id: i64) -> Result<SourceDetails>;

    /// Reuse the source already registered for the URL in `params`, or
    /// create one. An invalid source comes back unsaved with `errors` set.
    async fn find_or_create(&self, params: &SourceParams) -> Result<Source>;

    /// All sources, newest first
    async fn listing(&self) -> Result<Vec<Source>>;

    /// One window of [`listing`](Self::listing)
    async fn listing_page(&self, limit: i64, offset: i64) -> Result<Vec<Source>>;

    async fn count(&self) -> Result<i64>;

    /// Validate then insert or update. `Ok(false)` leaves the reasons in `source.errors`.
    async fn save(&self, source: &mut Source) -> Result<bool>;

    /// Apply the present attributes of `params`, then [`save`](Self::save)
    async fn update(&self, source: &mut Source, params: &SourceParams) -> Result<bool>;

    /// Delete a source along with its events and venues
    async fn destroy(&self, source: &Source) -> Result<()>;

    /// Persist the upcoming, not yet imported entries of a fetched feed and
    /// return the events created.
    async fn create_events(
        &self,
        source: &Source,
        entries: Vec<ParsedEvent>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>>;

    async fn find_event(&self, id: i64) -> Result<Event>;

    /// Events that have not ended by `now`, soonest first
    async fn upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>>;
}
