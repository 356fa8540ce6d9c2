//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External calendar feed from which events are imported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Validation and import errors; never persisted
    #[serde(skip)]
    #[sqlx(skip)]
    pub errors: ErrorList,
}

impl Source {
    /// Unsaved source built from user input
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
            ..Default::default()
        }
    }

    /// True once the record has been inserted
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Title for display, falling back to the URL
    pub fn display_name(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.url,
        }
    }
}

/// Calendar entry created by importing a [`Source`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub source_id: Option<i64>,
    pub venue_id: Option<i64>,
    /// iCalendar UID of the entry this event came from
    pub uid: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Venue {
    pub id: i64,
    pub source_id: Option<i64>,
    pub title: String,
}

/// Ordered list of full, human-readable error messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<String>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message about one attribute, e.g. `add("url", "can't be blank")`
    /// records `Url can't be blank`.
    pub fn add(&mut self, field: &str, message: &str) {
        self.0.push(format!("{} {}", humanize(field), message));
    }

    /// Add a message about the record as a whole, verbatim
    pub fn add_to_base(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn full_messages(&self) -> &[String] {
        &self.0
    }

    /// Join messages as an English list: `a`, `a and b`, `a, b, and c`
    pub fn to_sentence(&self) -> String {
        match self.0.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{} and {}", first, second),
            [init @ .., last] => format!("{}, and {}", init.join(", "), last),
        }
    }
}

/// `start_time` -> `Start time`
fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
