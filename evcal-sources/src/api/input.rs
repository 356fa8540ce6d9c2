//! Source attributes from a request body
//!
//! Browsers post url-encoded forms; API clients may send JSON instead.

use axum::{
    async_trait,
    extract::{rejection::FormRejection, FromRequest, Request},
    http::header,
    Form, Json,
};

use crate::db::SourceParams;
use crate::error::Error;

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for SourceParams
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(&request) {
            let Json(params) = Json::<SourceParams>::from_request(request, state)
                .await
                .map_err(|e| Error::BadRequest(e.body_text()))?;
            return Ok(params);
        }

        let Form(params) = Form::<SourceParams>::from_request(request, state)
            .await
            .map_err(|e: FormRejection| Error::BadRequest(e.body_text()))?;
        Ok(params)
    }
}
