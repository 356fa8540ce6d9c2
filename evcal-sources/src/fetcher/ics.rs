//! iCalendar feed parsing using the icalendar crate's parser.

use super::ParsedEvent;
use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use icalendar::{
    parser::{read_calendar, unfold, Component},
    CalendarDateTime, DatePerhapsTime,
};
use tracing::debug;

const UNTITLED: &str = "Untitled event";

/// Parse every VEVENT in an iCalendar document
///
/// Entries without a usable DTSTART are skipped. A document that is not
/// iCalendar at all is an error.
pub fn parse_feed(content: &str) -> anyhow::Result<Vec<ParsedEvent>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| anyhow!("Not an iCalendar feed: {}", e))?;

    // Feeds come as one VCALENDAR; the parser may expose it as the single top-level component
    let mut entries = Vec::new();
    for component in &calendar.components {
        collect_events(component, &mut entries);
    }

    Ok(entries)
}

fn collect_events(component: &Component, entries: &mut Vec<ParsedEvent>) {
    if component.name == "VEVENT" {
        match parse_event(component) {
            Some(entry) => entries.push(entry),
            None => debug!("Skipping VEVENT without a usable DTSTART"),
        }
        return;
    }

    for child in &component.components {
        collect_events(child, entries);
    }
}

fn parse_event(vevent: &Component) -> Option<ParsedEvent> {
    let start_time = to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?)?;
    let end_time = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(to_utc);

    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .filter(|v| !v.trim().is_empty())
    };

    Some(ParsedEvent {
        uid: text("UID"),
        title: text("SUMMARY").unwrap_or_else(|| UNTITLED.to_string()),
        description: text("DESCRIPTION"),
        url: text("URL"),
        location: text("LOCATION"),
        start_time,
        end_time,
    })
}

/// Floating times and unknown TZIDs are taken as UTC
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(date) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Some(naive.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.parse::<chrono_tz::Tz>() {
                Ok(tz) => tz
                    .from_local_datetime(&date_time)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc)),
                Err(_) => Some(date_time.and_utc()),
            }
        }
    }
}

/// Undo RFC 5545 TEXT escaping
fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
