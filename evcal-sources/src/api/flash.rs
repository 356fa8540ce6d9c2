//! One-shot flash messages
//!
//! A message set while handling one request is shown by the next page the
//! same session renders, then discarded. Messages nobody collects expire
//! after [`FLASH_TTL`].

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Notice,
    Success,
    Failure,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Notice => "notice",
            FlashKind::Success => "success",
            FlashKind::Failure => "failure",
        }
    }
}

/// Flash text is rendered as HTML; user-derived parts must already be escaped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    pub fn new(kind: FlashKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// How long an uncollected message is kept
pub const FLASH_TTL: Duration = Duration::from_secs(10 * 60);

struct Pending {
    message: FlashMessage,
    stored_at: Instant,
}

/// Pending messages by session, at most one per session
#[derive(Clone)]
pub struct FlashStore {
    pending: Arc<Mutex<HashMap<SessionId, Pending>>>,
    ttl: Duration,
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::with_ttl(FLASH_TTL)
    }
}

impl FlashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Store `message` for `session`, dropping expired messages of every session
    pub fn set(&self, session: SessionId, message: FlashMessage) {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        pending.insert(
            session,
            Pending {
                message,
                stored_at: now,
            },
        );
    }

    pub fn take(&self, session: SessionId) -> Option<FlashMessage> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending
            .remove(&session)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.message)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The current session's flash slot
pub struct Flash {
    store: FlashStore,
    session: SessionId,
}

impl Flash {
    pub fn set(&self, kind: FlashKind, text: impl Into<String>) {
        self.store.set(self.session, FlashMessage::new(kind, text));
    }

    pub fn take(&self) -> Option<FlashMessage> {
        self.store.take(self.session)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Flash
where
    FlashStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Without the session layer, messages go to a throwaway session
        let session = parts
            .extensions
            .get::<SessionId>()
            .copied()
            .unwrap_or_else(SessionId::generate);

        Ok(Flash {
            store: FlashStore::from_ref(state),
            session,
        })
    }
}
