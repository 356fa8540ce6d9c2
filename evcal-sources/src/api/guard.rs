//! Import gate
//!
//! Layered on the new-source form and the import action only. When imports
//! are disabled in configuration, requests are turned away before any
//! repository or fetcher work.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use super::flash::{Flash, FlashKind};
use super::format::Format;
use crate::AppState;

pub const IMPORTS_DISABLED_MESSAGE: &str = "The ability to import events has been temporarily disabled because it's being abused to create thousands of spammy, unwanted events. If you have a solution, please join the discussion at the <a href='http://groups.google.com/group/pdx-tech-calendar/'>Forum</a>.";

/// Redirect to the home page with a warning when imports are disabled
pub async fn import_guard(
    State(state): State<AppState>,
    format: Format,
    flash: Flash,
    request: Request,
    next: Next,
) -> Response {
    if !state.settings.import_disabled {
        return next.run(request).await;
    }

    info!(path = %request.uri().path(), "Import attempt refused: imports disabled");
    if format == Format::Html {
        flash.set(FlashKind::Failure, IMPORTS_DISABLED_MESSAGE);
    }
    Redirect::to("/").into_response()
}
