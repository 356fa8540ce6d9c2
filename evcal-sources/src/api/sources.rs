//! Source CRUD and import handlers
//!
//! Each handler does its work once, then lets the negotiated [`Responder`]
//! pick the representation.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use evcal_common::db::Source;
use html_escape::encode_text;
use tracing::warn;

use super::flash::{Flash, FlashKind};
use super::format::{Format, SourceListing};
use crate::db::SourceParams;
use crate::error::{Error, Result};
use crate::import::import_source;
use crate::pagination::{calculate_pagination, PageQuery};
use crate::views::FormMode;
use crate::AppState;

/// Path segment that is never a source id
const RESERVED_ID: &str = "import";

/// Positive integer ids only; anything else cannot name a source
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

async fn load_source(state: &AppState, raw_id: &str) -> Result<Source> {
    match parse_id(raw_id) {
        Some(id) => state.sources.find(id).await,
        None => Err(Error::source_not_found(raw_id)),
    }
}

/// GET /sources
pub async fn index(
    State(state): State<AppState>,
    format: Format,
    flash: Flash,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    let responder = format.responder();

    let listing = if responder.wants_pages() {
        let total = state.sources.count().await?;
        let pagination =
            calculate_pagination(total, query.page, query.per_page, state.settings.per_page);
        let sources = state
            .sources
            .listing_page(pagination.per_page, pagination.offset)
            .await?;
        SourceListing {
            sources,
            pagination: Some(pagination),
        }
    } else {
        SourceListing {
            sources: state.sources.listing().await?,
            pagination: None,
        }
    };

    Ok(responder.listing(listing, &flash))
}

/// GET /sources/:id
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    format: Format,
    flash: Flash,
) -> Result<Response> {
    show_source(&state, &id, format, &flash).await
}

/// GET /sources/import, which the import action's path shadows
pub async fn show_reserved(
    State(state): State<AppState>,
    format: Format,
    flash: Flash,
) -> Result<Response> {
    show_source(&state, RESERVED_ID, format, &flash).await
}

async fn show_source(state: &AppState, raw_id: &str, format: Format, flash: &Flash) -> Result<Response> {
    let details = match parse_id(raw_id) {
        Some(id) => state.sources.find_with_details(id).await,
        None => Err(Error::source_not_found(raw_id)),
    };

    match details {
        Ok(details) => Ok(format.responder().show(details, flash)),
        Err(err @ Error::NotFound { .. }) => {
            // Someone reloading the import result page lands here; no warning for them
            if format == Format::Html && raw_id != RESERVED_ID {
                flash.set(FlashKind::Failure, encode_text(&err.to_string()));
            }
            Ok(Redirect::to("/sources/new").into_response())
        }
        Err(err) => Err(err),
    }
}

/// GET /sources/new
pub async fn new_source(format: Format, flash: Flash) -> Response {
    format
        .responder()
        .form(&Source::default(), FormMode::New, &flash)
}

/// GET /sources/:id/edit
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    format: Format,
    flash: Flash,
) -> Result<Response> {
    let source = load_source(&state, &id).await?;
    Ok(format.responder().form(&source, FormMode::Edit, &flash))
}

/// POST /sources
pub async fn create(
    State(state): State<AppState>,
    format: Format,
    flash: Flash,
    params: SourceParams,
) -> Result<Response> {
    let responder = format.responder();
    let mut source = Source::default();

    if state.sources.update(&mut source, &params).await? {
        Ok(responder.created(&source, &flash))
    } else {
        Ok(responder.invalid(&source, FormMode::New))
    }
}

/// PUT /sources/:id (also POST for HTML forms)
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    format: Format,
    flash: Flash,
    params: SourceParams,
) -> Result<Response> {
    let responder = format.responder();
    let mut source = load_source(&state, &id).await?;

    if state.sources.update(&mut source, &params).await? {
        Ok(responder.updated(&source, &flash))
    } else {
        Ok(responder.invalid(&source, FormMode::Edit))
    }
}

/// DELETE /sources/:id (also POST /sources/:id/delete)
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    format: Format,
) -> Result<Response> {
    let source = load_source(&state, &id).await?;
    state.sources.destroy(&source).await?;
    Ok(format.responder().destroyed())
}

/// POST /sources/import
pub async fn import(
    State(state): State<AppState>,
    format: Format,
    flash: Flash,
    params: SourceParams,
) -> Result<Response> {
    let responder = format.responder();
    let report = import_source(state.sources.as_ref(), state.fetcher.as_ref(), &params).await?;

    match report.imported_events() {
        Some(events) => Ok(responder.imported(&report.source, events, &flash)),
        None => {
            let message = report.failure_message();
            warn!(url = %report.source.url, reason = %message, "Import produced no events");
            Ok(responder.import_failed(&report.source, &message))
        }
    }
}
