//! Import workflow: find or create a source, fetch its feed, report the result
//!
//! Whether a fetch was attempted is kept apart from whether it found
//! anything, because users are told different things in each case.

use chrono::Utc;
use evcal_common::db::{Event, Source};
use html_escape::encode_text;
use tracing::{info, warn};

use crate::db::{validate, SourceParams, SourceRepository};
use crate::error::{Error, Result};
use crate::fetcher::{FetchErrorKind, SourceFetcher};

/// Imported events listed by title in the success summary; the rest are counted
pub const MAX_EVENTS_IN_SUMMARY: usize = 5;

pub const NO_UPCOMING_EVENTS_MESSAGE: &str =
    "Unable to find any upcoming events to import from this source";

/// User-facing text for each fetch failure the workflow absorbs.
/// Kinds missing from this table fail the request instead.
const FETCH_ERROR_MESSAGES: &[(FetchErrorKind, &str)] = &[
    (
        FetchErrorKind::AuthenticationRequired,
        "source requires authentication",
    ),
    (
        FetchErrorKind::RemoteHttp,
        "we received an error from this source",
    ),
    (FetchErrorKind::HostUnreachable, "this source is not responding"),
    (FetchErrorKind::DnsFailure, "hostname not found"),
];

pub fn fetch_error_message(kind: FetchErrorKind) -> Option<&'static str> {
    FETCH_ERROR_MESSAGES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, message)| *message)
}

/// Whether the feed was fetched and parsed
#[derive(Debug, Clone, PartialEq)]
pub enum ImportAttempt {
    /// Source was invalid or the fetch failed
    NotAttempted,
    /// Fetch completed; holds the events created, possibly none
    Attempted(Vec<Event>),
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: Source,
    pub attempt: ImportAttempt,
}

impl ImportReport {
    /// The created events, when the import counts as a success
    pub fn imported_events(&self) -> Option<&[Event]> {
        match &self.attempt {
            ImportAttempt::Attempted(events) if !events.is_empty() => Some(events),
            _ => None,
        }
    }

    /// Failure text for an unsuccessful import
    pub fn failure_message(&self) -> String {
        match &self.attempt {
            ImportAttempt::Attempted(_) => NO_UPCOMING_EVENTS_MESSAGE.to_string(),
            ImportAttempt::NotAttempted => {
                format!("Unable to import: {}", self.source.errors.to_sentence())
            }
        }
    }
}

/// Run the import for user-supplied source attributes
///
/// Fetch failures listed in the message table land on `source.errors`; any
/// other fetch failure is returned as `Error::Fetch`.
pub async fn import_source(
    sources: &dyn SourceRepository,
    fetcher: &dyn SourceFetcher,
    params: &SourceParams,
) -> Result<ImportReport> {
    let mut source = sources.find_or_create(params).await?;

    if !validate(&mut source) {
        info!(url = %source.url, errors = %source.errors.to_sentence(), "Import rejected: invalid source");
        return Ok(ImportReport {
            source,
            attempt: ImportAttempt::NotAttempted,
        });
    }

    let attempt = match fetcher.fetch(&source).await {
        Ok(entries) => {
            let events = sources.create_events(&source, entries, Utc::now()).await?;
            ImportAttempt::Attempted(events)
        }
        Err(err) => match err.kind().and_then(fetch_error_message) {
            Some(message) => {
                warn!(source_id = source.id, error = %err, "Import fetch failed");
                source.errors.add_to_base(message);
                ImportAttempt::NotAttempted
            }
            None => return Err(Error::Fetch(err)),
        },
    };

    Ok(ImportReport { source, attempt })
}

/// HTML summary of a successful import, linking each listed event
pub fn success_summary(events: &[Event]) -> String {
    let mut summary = format!("<p>Imported {} entries:</p><ul>", events.len());

    for event in events.iter().take(MAX_EVENTS_IN_SUMMARY) {
        summary.push_str(&format!(
            "<li><a href=\"/events/{}\">{}</a></li>",
            event.id,
            encode_text(&event.title)
        ));
    }

    if events.len() > MAX_EVENTS_IN_SUMMARY {
        summary.push_str(&format!(
            "<li>And {} other events.</li>",
            events.len() - MAX_EVENTS_IN_SUMMARY
        ));
    }

    summary.push_str("</ul>");
    summary
}
