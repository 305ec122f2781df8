//! The HTTP surface: method gating, content-type check, versioned path
//! dispatch and deprecation responses. Everything else is delegated to the
//! query engine; errors come back as `text/plain` `"{Status}: {message}"`
//! bodies.

use std::fmt::Display;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use once_cell::sync::Lazy;
use tower_http::trace::TraceLayer;

use crate::query::{self, Query};
use crate::result::ResultBody;
use crate::{MIN_API, NEW_BROWSE_PATH, NEXT_API};

use super::state::AppState;

static DEPRECATED_APIS: Lazy<Vec<String>> = Lazy::new(|| infer_deprecated_apis(MIN_API));

pub fn router(state: AppState) -> Router {
    let browse = Router::new()
        .route(NEW_BROWSE_PATH, any(browse_handler))
        .route("/api/browse/{version}/{*rest}", any(legacy_browse_handler))
        .layer(middleware::from_fn(require_post));

    Router::new()
        .merge(browse)
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_post(request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, request.method());
    }
    next.run(request).await
}

async fn browse_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_browse(state, headers, body).await
}

/// Legacy `/api/browse/<version>/…` shim: deprecated versions are Gone,
/// versions outside the active window don't exist.
async fn legacy_browse_handler(
    Path((version, _rest)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if DEPRECATED_APIS.iter().any(|v| v == &version) {
        return error_response(StatusCode::GONE, format!("deprecated API version: {version}"));
    }
    if version != MIN_API && version != NEXT_API {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("non-existent API version: \"{version}\""),
        );
    }
    handle_browse(state, headers, body).await
}

async fn handle_browse(state: AppState, headers: HeaderMap, body: Bytes) -> Response {
    if !is_json_request(&headers) {
        return error_response(StatusCode::BAD_REQUEST, "expected application/json");
    }

    let parsed = match Query::parse(&body) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err),
    };

    match query::execute(parsed, &state.sessions).await {
        Ok(result) => match result.into_body() {
            ResultBody::Json(result) => Json(result).into_response(),
            ResultBody::Png(bytes) => {
                ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
            }
        },
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .map(str::trim)
                .unwrap_or_default()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false)
}

fn error_response(status: StatusCode, message: impl Display) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    (status, format!("{reason}: {message}\n")).into_response()
}

/// Every `vMAJ.MIN` strictly below the minimum API, minors 0 through 9.
fn infer_deprecated_apis(min_api: &str) -> Vec<String> {
    let (min_major, min_minor) = parse_api_version(min_api).expect("malformed minimum API");
    let mut deprecated = Vec::new();
    for major in 0..min_major {
        for minor in 0..10 {
            deprecated.push(format!("v{major}.{minor}"));
        }
    }
    for minor in 0..min_minor {
        deprecated.push(format!("v{min_major}.{minor}"));
    }
    deprecated
}

fn parse_api_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.strip_prefix('v')?.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
