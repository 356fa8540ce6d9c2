//! Home page and the event pages import results link to

use axum::{
    extract::{Path, State},
    response::Html,
};
use chrono::Utc;

use super::flash::Flash;
use crate::error::{Error, Result};
use crate::views;
use crate::AppState;

/// GET /
pub async fn home(flash: Flash) -> Html<String> {
    Html(views::home_page(flash.take().as_ref()))
}

/// GET /events
pub async fn events_index(State(state): State<AppState>, flash: Flash) -> Result<Html<String>> {
    let events = state.sources.upcoming_events(Utc::now()).await?;
    Ok(Html(views::events_index(&events, flash.take().as_ref())))
}

/// GET /events/:id
pub async fn event_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    flash: Flash,
) -> Result<Html<String>> {
    let event_id = id
        .parse::<i64>()
        .map_err(|_| Error::event_not_found(id.as_str()))?;
    let event = state.sources.find_event(event_id).await?;
    Ok(Html(views::event_show(&event, flash.take().as_ref())))
}
