//! Response format negotiation
//!
//! Handlers run their business logic once and hand the outcome to a
//! [`Responder`]: [`HtmlResponder`] for browsers (pages, redirects, flash)
//! or [`JsonResponder`] for API clients (serialized records, status codes).
//! Only the HTML side stores flash messages; API clients never render the
//! page that would consume them.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use evcal_common::db::{Event, Source};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

use super::flash::{Flash, FlashKind, FlashMessage};
use crate::db::SourceDetails;
use crate::import::success_summary;
use crate::pagination::{calculate_pagination, Pagination};
use crate::views::{self, FormMode};

pub const CREATED_NOTICE: &str = "Source was successfully created.";
pub const UPDATED_NOTICE: &str = "Source was successfully updated.";

/// Requested representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Structured,
}

#[derive(Debug, Deserialize)]
struct FormatQuery {
    format: Option<String>,
}

impl Format {
    /// `?format=json|html` wins; otherwise the first media type in `Accept`
    pub fn from_parts(parts: &Parts) -> Self {
        if let Ok(Query(query)) = Query::<FormatQuery>::try_from_uri(&parts.uri) {
            match query.format.as_deref() {
                Some("json") => return Format::Structured,
                Some("html") => return Format::Html,
                _ => {}
            }
        }

        let preferred = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .and_then(|accept| accept.split(',').next())
            .map(|media| media.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

        match preferred.as_deref() {
            Some("application/json") => Format::Structured,
            _ => Format::Html,
        }
    }

    pub fn responder(self) -> &'static dyn Responder {
        match self {
            Format::Html => &HtmlResponder,
            Format::Structured => &JsonResponder,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Format
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Format::from_parts(parts))
    }
}

/// Sources for the listing; `pagination` is set when the responder pages
pub struct SourceListing {
    pub sources: Vec<Source>,
    pub pagination: Option<Pagination>,
}

/// Turns operation outcomes into responses for one format
pub trait Responder: Send + Sync {
    /// Whether listings should be fetched a page at a time
    fn wants_pages(&self) -> bool;

    fn listing(&self, listing: SourceListing, flash: &Flash) -> Response;

    fn show(&self, details: SourceDetails, flash: &Flash) -> Response;

    /// Blank or existing source for the new/edit form
    fn form(&self, source: &Source, mode: FormMode, flash: &Flash) -> Response;

    fn created(&self, source: &Source, flash: &Flash) -> Response;

    fn updated(&self, source: &Source, flash: &Flash) -> Response;

    /// Create or update rejected by validation
    fn invalid(&self, source: &Source, mode: FormMode) -> Response;

    fn destroyed(&self) -> Response;

    fn imported(&self, source: &Source, events: &[Event], flash: &Flash) -> Response;

    fn import_failed(&self, source: &Source, message: &str) -> Response;
}

pub struct HtmlResponder;

impl Responder for HtmlResponder {
    fn wants_pages(&self) -> bool {
        true
    }

    fn listing(&self, listing: SourceListing, flash: &Flash) -> Response {
        let pagination = listing.pagination.unwrap_or_else(|| {
            let total = listing.sources.len() as i64;
            calculate_pagination(total, None, None, total.max(1))
        });
        Html(views::sources_index(
            &listing.sources,
            &pagination,
            flash.take().as_ref(),
        ))
        .into_response()
    }

    fn show(&self, details: SourceDetails, flash: &Flash) -> Response {
        Html(views::source_show(&details, flash.take().as_ref())).into_response()
    }

    fn form(&self, source: &Source, mode: FormMode, flash: &Flash) -> Response {
        Html(views::source_form(source, mode, flash.take().as_ref())).into_response()
    }

    fn created(&self, source: &Source, flash: &Flash) -> Response {
        flash.set(FlashKind::Notice, CREATED_NOTICE);
        Redirect::to(&source_path(source)).into_response()
    }

    fn updated(&self, source: &Source, flash: &Flash) -> Response {
        flash.set(FlashKind::Notice, UPDATED_NOTICE);
        Redirect::to(&source_path(source)).into_response()
    }

    fn invalid(&self, source: &Source, mode: FormMode) -> Response {
        Html(views::source_form(source, mode, None)).into_response()
    }

    fn destroyed(&self) -> Response {
        Redirect::to("/sources").into_response()
    }

    fn imported(&self, _source: &Source, events: &[Event], flash: &Flash) -> Response {
        flash.set(FlashKind::Success, success_summary(events));
        Redirect::to("/events").into_response()
    }

    fn import_failed(&self, source: &Source, message: &str) -> Response {
        // Shown on this render only, not stored for the next request
        let failure = FlashMessage::new(FlashKind::Failure, message);
        Html(views::source_form(source, FormMode::New, Some(&failure))).into_response()
    }
}

pub struct JsonResponder;

impl Responder for JsonResponder {
    fn wants_pages(&self) -> bool {
        false
    }

    fn listing(&self, listing: SourceListing, _flash: &Flash) -> Response {
        Json(listing.sources).into_response()
    }

    fn show(&self, details: SourceDetails, _flash: &Flash) -> Response {
        Json(details).into_response()
    }

    fn form(&self, source: &Source, _mode: FormMode, _flash: &Flash) -> Response {
        Json(source).into_response()
    }

    fn created(&self, source: &Source, _flash: &Flash) -> Response {
        (
            StatusCode::CREATED,
            [(header::LOCATION, source_path(source))],
            Json(source),
        )
            .into_response()
    }

    fn updated(&self, _source: &Source, _flash: &Flash) -> Response {
        StatusCode::OK.into_response()
    }

    fn invalid(&self, source: &Source, _mode: FormMode) -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": source.errors })),
        )
            .into_response()
    }

    fn destroyed(&self) -> Response {
        StatusCode::OK.into_response()
    }

    fn imported(&self, source: &Source, events: &[Event], _flash: &Flash) -> Response {
        Json(json!({ "source": source, "events": events })).into_response()
    }

    fn import_failed(&self, source: &Source, message: &str) -> Response {
        // A fetch that found nothing leaves no source errors; report the reason instead
        let errors = if source.errors.is_empty() {
            json!([message])
        } else {
            json!(source.errors)
        };
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors })),
        )
            .into_response()
    }
}

fn source_path(source: &Source) -> String {
    format!("/sources/{}", source.id)
}
