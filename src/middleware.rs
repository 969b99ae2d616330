//! [axum] integration.
//!
//! [require_token] rejects requests without a valid token with a bodiless `401 Unauthorized`; accepted requests reach the
//! wrapped handler, which receives the token's [Payload] by using it as an extractor.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
//! use hmac_auth::{middleware::require_token, HmacAuth, Payload};
//!
//! async fn download(payload: Payload) -> Json<Payload> {
//!     Json(payload)
//! }
//!
//! let auth = Arc::new(HmacAuth::new(["current", "previous"], "token").unwrap());
//! let app: Router = Router::new()
//!     .route("/download", get(download))
//!     .layer(from_fn_with_state(auth, require_token));
//! ```
use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info_span, warn};
use url::form_urlencoded;

use crate::{HmacAuth, Payload};

/// Largest form body buffered while looking for the token.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

/// Middleware for [axum::middleware::from_fn_with_state] guarding every route behind it.
///
/// The token is read from the query string and, for `application/x-www-form-urlencoded` requests, from the form body.
/// Exactly one value must be present across both.
pub async fn require_token(State(auth): State<Arc<HmacAuth>>, request: Request, next: Next) -> Response {
    let span = info_span!("hmac_auth", method = %request.method(), path = %request.uri().path());

    let (mut request, values) = match token_values(request, auth.param()).await {
        Ok(found) => found,
        Err(err) => {
            span.in_scope(|| warn!(reason = "unreadable_body", "couldn't read form body: {}", err));
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let now = chrono::Utc::now().timestamp();
    match span.in_scope(|| auth.authenticate(values.as_slice(), now, |payload| payload)) {
        Ok(payload) => {
            request.extensions_mut().insert(payload);
            next.run(request).await
        }
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Collects every value of `param` in the request. A form body is buffered and put back for the handler.
async fn token_values(request: Request, param: &str) -> Result<(Request, Vec<String>), axum::Error> {
    let mut values: Vec<String> = request
        .uri()
        .query()
        .map(|query| matching(query.as_bytes(), param))
        .unwrap_or_default();

    if !is_form(&request) {
        return Ok((request, values));
    }

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_FORM_BYTES).await?;
    values.extend(matching(&bytes, param));

    Ok((Request::from_parts(parts, Body::from(bytes)), values))
}

fn matching(input: &[u8], param: &str) -> Vec<String> {
    form_urlencoded::parse(input)
        .filter(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .collect()
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

impl<S> FromRequestParts<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Payload>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
