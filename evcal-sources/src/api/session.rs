//! Client sessions
//!
//! Each browser gets an opaque `evcal_session` cookie. Nothing but the flash
//! store is keyed by it.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "evcal_session";

/// Session identifier, placed in request extensions by [`session_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Value for a `Set-Cookie` header
    pub fn cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.0
        )
    }
}

/// Session id from the request's `Cookie` headers, if well-formed
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(SessionId)
}

/// Attach a [`SessionId`] to every request, issuing a cookie to new clients
pub async fn session_middleware(mut request: Request, next: Next) -> Response {
    let (session, issued) = match session_from_headers(request.headers()) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    request.extensions_mut().insert(session);
    let mut response = next.run(request).await;

    if issued {
        debug!(session = %session.0, "Issued session cookie");
        if let Ok(value) = HeaderValue::from_str(&session.cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_read_from_cookie_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, id)).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(SessionId(id)));
    }

    #[test]
    fn test_malformed_session_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("evcal_session=not-a-uuid"),
        );

        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }
}
