//! Response envelopes, observability headers and error mapping.

use std::fmt::Display;
use std::time::Duration;

use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::DiscoveryError;

pub(crate) const X_CACHE_SOURCE: &str = "x-cache-source";
pub(crate) const X_RESPONSE_TIME: &str = "x-response-time";
pub(crate) const X_OPTIMIZATION_RATIO: &str = "x-optimization-ratio";
pub(crate) const X_TOTAL_READS: &str = "x-total-reads";

/// `{success: true, data, meta}`.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T, M> {
    pub success: bool,
    pub data: T,
    pub meta: M,
}

impl<T: Serialize, M: Serialize> Envelope<T, M> {
    pub fn ok(data: T, meta: M) -> Self {
        Self {
            success: true,
            data,
            meta,
        }
    }
}

/// Observability headers attached to discovery responses.
pub(crate) struct DiscoveryHeaders<'a> {
    pub cache_source: &'a str,
    pub elapsed: Duration,
    pub optimization_ratio: f64,
    pub total_reads: usize,
}

impl DiscoveryHeaders<'_> {
    pub fn apply(&self, response: &mut Response) {
        set_header(response, X_CACHE_SOURCE, self.cache_source);
        set_header(response, X_RESPONSE_TIME, format_ms(self.elapsed));
        set_header(response, X_OPTIMIZATION_RATIO, self.optimization_ratio);
        set_header(response, X_TOTAL_READS, self.total_reads);
    }
}

pub(crate) fn format_ms(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
}

fn set_header(response: &mut Response, name: &'static str, value: impl Display) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

/// Error response: `{success: false, error: {message, code, timestamp, responseTime}}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub error: DiscoveryError,
    pub elapsed: Duration,
}

impl ApiError {
    pub fn new(error: DiscoveryError, elapsed: Duration) -> Self {
        Self { error, elapsed }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    message: String,
    code: &'static str,
    timestamp: String,
    response_time: String,
}

/// HTTP status for an error surfacing at the boundary.
pub(crate) fn status_for(error: &DiscoveryError) -> StatusCode {
    match error {
        DiscoveryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DiscoveryError::Repository(_)
        | DiscoveryError::RepositoryApi { .. }
        | DiscoveryError::RateLimited { .. } => StatusCode::BAD_GATEWAY,
        DiscoveryError::LaneTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DiscoveryError::Aggregation { .. }
        | DiscoveryError::Compute(_)
        | DiscoveryError::CacheTier(_)
        | DiscoveryError::Serialization(_)
        | DiscoveryError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let response_time = format_ms(self.elapsed);
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                message: self.error.to_string(),
                code: self.error.code(),
                timestamp: Utc::now().to_rfc3339(),
                response_time: response_time.clone(),
            },
        };
        let mut response = (status, Json(body)).into_response();
        set_header(&mut response, X_RESPONSE_TIME, response_time);
        response
    }
}
