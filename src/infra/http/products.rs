use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::VARY},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use crate::{
    application::{
        catalog::{CatalogService, ListingRequest},
        error::HttpError,
        filters::Endpoint,
    },
    infra::db::PostgresCatalog,
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

/// Header sent by partial-update clients; such requests get the JSON fragments.
pub const HX_REQUEST_HEADER: &str = "hx-request";

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<CatalogService>,
    pub db: Option<Arc<PostgresCatalog>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/products", get(manual_listing))
        .route("/products/facets", get(faceted_listing))
        .route("/products/live", get(live_listing))
        .route("/_health/db", get(db_health))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Serialize)]
struct PartialPayload<'a> {
    html: &'a str,
    tags_html: &'a str,
}

async fn manual_listing(
    State(state): State<HttpState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    listing(&state, Endpoint::Manual, &headers, query.as_deref()).await
}

async fn faceted_listing(
    State(state): State<HttpState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    listing(&state, Endpoint::Faceted, &headers, query.as_deref()).await
}

async fn live_listing(
    State(state): State<HttpState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    listing(&state, Endpoint::Live, &headers, query.as_deref()).await
}

async fn listing(
    state: &HttpState,
    endpoint: Endpoint,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Response {
    let request = ListingRequest::from_query(endpoint, query.unwrap_or(""));
    let payload = match state.catalog.listing(&request).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };

    let mut response = if is_partial(headers) {
        Json(PartialPayload {
            html: &payload.html,
            tags_html: &payload.tags_html,
        })
        .into_response()
    } else {
        match state.catalog.render_page(endpoint, &payload) {
            Ok(page) => Html(page).into_response(),
            Err(err) => return err.into_response(),
        }
    };
    response
        .headers_mut()
        .insert(VARY, HeaderValue::from_static(HX_REQUEST_HEADER));
    response
}

pub(super) fn is_partial(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match &state.db {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn not_found() -> HttpError {
    HttpError::new(
        "infra::http::products::not_found",
        StatusCode::NOT_FOUND,
        "Resource not found",
        "no route matched",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_requests_are_detected_case_insensitively() {
        let mut headers = HeaderMap::new();
        assert!(!is_partial(&headers));

        headers.insert(HX_REQUEST_HEADER, HeaderValue::from_static("TRUE"));
        assert!(is_partial(&headers));

        headers.insert(HX_REQUEST_HEADER, HeaderValue::from_static("false"));
        assert!(!is_partial(&headers));
    }
}
