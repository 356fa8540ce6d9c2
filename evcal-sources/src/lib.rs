//! evcal-sources library - calendar feed sources and event import
//!
//! Manages the external calendar feeds events are imported from, with HTML
//! pages for browsers and JSON for API clients.

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod import;
pub mod pagination;
pub mod views;

use api::flash::FlashStore;
use db::SourceRepository;
use evcal_common::config::{ServiceConfig, DEFAULT_PER_PAGE};
use fetcher::SourceFetcher;

/// Request-time settings taken from [`ServiceConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Turn away the new-source form and imports
    pub import_disabled: bool,
    /// Default page size for the HTML source listing
    pub per_page: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            import_disabled: false,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl From<&ServiceConfig> for Settings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            import_disabled: config.import_disabled,
            per_page: config.per_page,
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sources: Arc<dyn SourceRepository>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub flash: FlashStore,
    pub settings: Settings,
}

impl AppState {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        fetcher: Arc<dyn SourceFetcher>,
        settings: Settings,
    ) -> Self {
        Self {
            sources,
            fetcher,
            flash: FlashStore::new(),
            settings,
        }
    }
}

impl FromRef<AppState> for FlashStore {
    fn from_ref(state: &AppState) -> Self {
        state.flash.clone()
    }
}

/// Build application router
///
/// The import gate covers only the new-source form and the import action.
/// `GET /sources/import` is routed to show, which treats `import` as a
/// reserved id.
pub fn build_router(state: AppState) -> Router {
    use api::sources;

    let gate = middleware::from_fn_with_state(state.clone(), api::import_guard);

    let source_routes = Router::new()
        .route("/sources", get(sources::index).post(sources::create))
        .route(
            "/sources/new",
            get(sources::new_source).route_layer(gate.clone()),
        )
        .route(
            "/sources/import",
            post(sources::import)
                .route_layer(gate)
                .get(sources::show_reserved),
        )
        .route(
            "/sources/:id",
            get(sources::show)
                .put(sources::update)
                .post(sources::update)
                .delete(sources::destroy),
        )
        .route("/sources/:id/edit", get(sources::edit))
        .route("/sources/:id/delete", post(sources::destroy));

    let pages = Router::new()
        .route("/", get(api::pages::home))
        .route("/events", get(api::pages::events_index))
        .route("/events/:id", get(api::pages::event_show))
        .merge(api::health_routes());

    Router::new()
        .merge(source_routes)
        .merge(pages)
        .layer(middleware::from_fn(api::session_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
