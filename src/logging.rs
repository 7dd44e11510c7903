//! Logging and tracing setup for Compliance Core.
//!
//! Request spans record the method, path and organization scope. Query
//! strings and bodies are never recorded; they can carry employee names,
//! emails and incident details.

use axum::http::{HeaderMap, Request};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::auth::ORGANIZATION_HEADER;
use crate::config::{LogFormat, LoggingConfig};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

/// Organization scope of a request, when the header holds a valid UUID.
fn request_organization(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Span factory for HTTP requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            organization_id = ?request_organization(request.headers()),
        )
    }
}

/// Trace layer for the router, using [`RequestSpan`].
pub fn http_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}

/// Initialize tracing for tests (human-readable format, no JSON).
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("compliance_core=debug")
        .try_init();
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_request_organization() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_organization(&headers), None);

        headers.insert(ORGANIZATION_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(request_organization(&headers), None);

        let id = Uuid::new_v4();
        headers.insert(
            ORGANIZATION_HEADER,
            HeaderValue::from_str(&format!(" {} ", id)).unwrap(),
        );
        assert_eq!(request_organization(&headers), Some(id));
    }
}
