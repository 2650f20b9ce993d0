//! Request ids and access logging for the catalog routes.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::products::is_partial;

/// Echoed on every response so a client report can be matched to a log line.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4(),
    };
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// What the access log records about a request before it is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccessLine {
    /// Route template that matched, `unmatched` for the fallback.
    route: String,
    partial: bool,
    query: String,
    request_id: String,
}

impl AccessLine {
    fn from_request(request: &Request<Body>) -> Self {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or("unmatched", MatchedPath::as_str)
            .to_string();
        let partial = is_partial(request.headers());
        let request_id = request
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id.to_string())
            .unwrap_or_default();

        Self {
            route,
            partial,
            query: request.uri().query().unwrap_or("").to_string(),
            request_id,
        }
    }

    fn emit(&self, status: StatusCode, elapsed_ms: u64, report: Option<ErrorReport>) {
        if !(status.is_client_error() || status.is_server_error()) {
            debug!(
                target: "vetrina::http::access",
                status = status.as_u16(),
                route = %self.route,
                partial = self.partial,
                query = %self.query,
                elapsed_ms,
                request_id = %self.request_id,
                "listing served",
            );
            return;
        }

        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .map_or("no diagnostic available", String::as_str);
        if status.is_server_error() {
            error!(
                target: "vetrina::http::access",
                status = status.as_u16(),
                route = %self.route,
                partial = self.partial,
                query = %self.query,
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id = %self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target: "vetrina::http::access",
                status = status.as_u16(),
                route = %self.route,
                partial = self.partial,
                query = %self.query,
                elapsed_ms,
                source,
                detail = %detail,
                request_id = %self.request_id,
                "request rejected",
            );
        }
    }
}

/// Logs every request: successes at debug, failures with their error chain.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let line = AccessLine::from_request(&request);

    let mut response = next.run(request).await;
    let status = response.status();
    let report = response.extensions_mut().remove::<ErrorReport>();
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    line.emit(status, elapsed_ms, report);

    response
}
