//! HTML pages
//!
//! Pages are assembled from the embedded layout template. All record text is
//! escaped here; flash text is inserted as-is.

use evcal_common::db::{ErrorList, Event, Source};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::api::flash::FlashMessage;
use crate::db::SourceDetails;
use crate::pagination::Pagination;

const LAYOUT_HTML: &str = include_str!("../ui/layout.html");

/// Which source form to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit,
}

/// Substitute `{{NAME}}` placeholders in one pass, so inserted values are never rescanned
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                match values.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn layout(title: &str, flash: Option<&FlashMessage>, body: &str) -> String {
    let flash_html = flash
        .map(|message| {
            format!(
                "<div class=\"flash {}\">{}</div>",
                message.kind.as_str(),
                message.text
            )
        })
        .unwrap_or_default();

    let title_html = text(title);
    fill(
        LAYOUT_HTML,
        &[
            ("TITLE", title_html.as_ref()),
            ("FLASH", flash_html.as_str()),
            ("BODY", body),
        ],
    )
}

pub fn home_page(flash: Option<&FlashMessage>) -> String {
    let body = "<p>Browse <a href=\"/events\">upcoming events</a>, \
                manage <a href=\"/sources\">sources</a>, \
                or <a href=\"/sources/new\">import events from a calendar feed</a>.</p>";
    layout("Event calendar", flash, body)
}

pub fn sources_index(
    sources: &[Source],
    pagination: &Pagination,
    flash: Option<&FlashMessage>,
) -> String {
    let mut body = String::new();

    if sources.is_empty() {
        body.push_str("<p>No sources yet.</p>");
    } else {
        body.push_str("<table><tr><th>Title</th><th>URL</th><th></th></tr>");
        for source in sources {
            body.push_str(&format!(
                "<tr><td><a href=\"/sources/{id}\">{title}</a></td><td>{url}</td>\
                 <td><a href=\"/sources/{id}/edit\">Edit</a></td></tr>",
                id = source.id,
                title = text(source.display_name()),
                url = text(&source.url),
            ));
        }
        body.push_str("</table>");
    }

    body.push_str("<p class=\"pagination\">");
    if pagination.has_previous() {
        body.push_str(&format!(
            "<a href=\"/sources?page={}&amp;per_page={}\">Previous</a> ",
            pagination.page - 1,
            pagination.per_page
        ));
    }
    body.push_str(&format!(
        "Page {} of {}",
        pagination.page,
        pagination.total_pages.max(1)
    ));
    if pagination.has_next() {
        body.push_str(&format!(
            " <a href=\"/sources?page={}&amp;per_page={}\">Next</a>",
            pagination.page + 1,
            pagination.per_page
        ));
    }
    body.push_str("</p><p><a href=\"/sources/new\">Import a new source</a></p>");

    layout("Sources", flash, &body)
}

pub fn source_show(details: &SourceDetails, flash: Option<&FlashMessage>) -> String {
    let source = &details.source;
    let mut body = format!(
        "<p>URL: <a href=\"{href}\">{url}</a></p>",
        href = attr(&source.url),
        url = text(&source.url),
    );

    body.push_str(&format!("<h2>Events ({})</h2>", details.events.len()));
    body.push_str(&event_list(&details.events));

    if !details.venues.is_empty() {
        body.push_str("<h2>Venues</h2><ul>");
        for venue in &details.venues {
            body.push_str(&format!("<li>{}</li>", text(&venue.title)));
        }
        body.push_str("</ul>");
    }

    body.push_str(&format!(
        "<p><a href=\"/sources/{id}/edit\">Edit</a></p>\
         <form method=\"post\" action=\"/sources/{id}/delete\"><button type=\"submit\">Delete</button></form>",
        id = source.id
    ));

    layout(source.display_name(), flash, &body)
}

/// New form imports straight away; edit form updates the record
pub fn source_form(source: &Source, mode: FormMode, flash: Option<&FlashMessage>) -> String {
    let (title, action, button) = match mode {
        FormMode::New => ("Import events", "/sources/import".to_string(), "Import"),
        FormMode::Edit => (
            "Edit source",
            format!("/sources/{}", source.id),
            "Update",
        ),
    };

    let mut body = error_list(&source.errors);
    body.push_str(&format!(
        "<form method=\"post\" action=\"{action}\">\
         <p><label>URL <input type=\"text\" name=\"url\" value=\"{url}\" size=\"60\"></label></p>\
         <p><label>Title <input type=\"text\" name=\"title\" value=\"{title}\" size=\"60\"></label></p>\
         <p><button type=\"submit\">{button}</button></p></form>",
        action = action,
        url = attr(&source.url),
        title = attr(source.title.as_deref().unwrap_or_default()),
        button = button,
    ));

    if mode == FormMode::New {
        body.push_str("<p>Paste the address of an iCalendar (.ics or webcal://) feed.</p>");
    }

    layout(title, flash, &body)
}

pub fn events_index(events: &[Event], flash: Option<&FlashMessage>) -> String {
    let body = if events.is_empty() {
        "<p>No upcoming events.</p>".to_string()
    } else {
        event_list(events)
    };
    layout("Upcoming events", flash, &body)
}

pub fn event_show(event: &Event, flash: Option<&FlashMessage>) -> String {
    let mut body = format!(
        "<p>Starts: {}</p>",
        event.start_time.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(end) = event.end_time {
        body.push_str(&format!("<p>Ends: {}</p>", end.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(description) = &event.description {
        body.push_str(&format!("<p>{}</p>", text(description)));
    }
    if let Some(url) = &event.url {
        // Feed-supplied; only web links become anchors
        if url.starts_with("http://") || url.starts_with("https://") {
            body.push_str(&format!(
                "<p><a href=\"{}\">{}</a></p>",
                attr(url),
                text(url)
            ));
        } else {
            body.push_str(&format!("<p>{}</p>", text(url)));
        }
    }
    if let Some(source_id) = event.source_id {
        body.push_str(&format!(
            "<p>Imported from <a href=\"/sources/{}\">source {}</a></p>",
            source_id, source_id
        ));
    }
    layout(&event.title, flash, &body)
}

fn event_list(events: &[Event]) -> String {
    if events.is_empty() {
        return "<p>None.</p>".to_string();
    }

    let mut html = String::from("<ul>");
    for event in events {
        html.push_str(&format!(
            "<li>{} <a href=\"/events/{}\">{}</a></li>",
            event.start_time.format("%Y-%m-%d %H:%M"),
            event.id,
            text(&event.title)
        ));
    }
    html.push_str("</ul>");
    html
}

fn error_list(errors: &ErrorList) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let mut html = String::from("<ul class=\"errors\">");
    for message in errors.full_messages() {
        html.push_str(&format!("<li>{}</li>", text(message)));
    }
    html.push_str("</ul>");
    html
}
