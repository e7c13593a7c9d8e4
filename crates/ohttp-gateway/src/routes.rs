//! HTTP routes and the per-request state machine
//!
//! Gateway endpoints validate method and content type before any ciphertext
//! is touched, then hand off to the encapsulation handler registered for the
//! path. The relay-visible status partition is {200, 400, 401}; see the
//! error module for the taxonomy.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use http::header::{self, HeaderValue};
use http::request::Parts;
use http::{Method, StatusCode};
use rand::Rng;

use ohttp_core::content_types;
use ohttp_core::EncapsulatedRequest;

use crate::metrics::{
    RequestMetrics, EVENT_CONFIGS_REQUEST, EVENT_GATEWAY_REQUEST, RESULT_CONFIGS_UNAVAILABLE,
    RESULT_INVALID_CONTENT, RESULT_INVALID_CONTENT_TYPE, RESULT_INVALID_METHOD,
};
use crate::state::AppState;

const TWELVE_HOURS: u32 = 12 * 3600;
const TWENTY_FOUR_HOURS: u32 = 24 * 3600;

/// Build the router over all configured endpoints.
pub fn create_router(state: AppState) -> Router {
    let endpoints = state.endpoints.clone();
    Router::new()
        .route(&endpoints.gateway, any(gateway_endpoint))
        .route(&endpoints.echo, any(gateway_endpoint))
        .route(&endpoints.metadata, any(gateway_endpoint))
        .route(&endpoints.configs, any(configs_endpoint))
        .route(&endpoints.legacy_configs, any(legacy_configs_endpoint))
        .route(&endpoints.health, get(health_endpoint))
        .fallback(index_endpoint)
        .with_state(state)
}

/// Reject a request on the outer envelope.
fn http_error(
    debug_response: bool,
    status: StatusCode,
    debug_message: String,
    metrics: &mut RequestMetrics,
    status_prefix: &str,
) -> Response {
    tracing::debug!(%status, message = %debug_message, "rejecting request");
    metrics.response_status(status_prefix, status.as_u16());
    let body = if debug_response {
        debug_message
    } else {
        status.canonical_reason().unwrap_or_default().to_string()
    };
    (status, body).into_response()
}

async fn gateway_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let mut metrics = state.metrics.create(EVENT_GATEWAY_REQUEST);
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    tracing::debug!(method = %method, path = parts.uri.path(), "handling gateway request");

    if method != Method::POST {
        metrics.fire(RESULT_INVALID_METHOD);
        return http_error(
            state.debug_response,
            StatusCode::BAD_REQUEST,
            format!("invalid method: {method}"),
            &mut metrics,
            method.as_str(),
        );
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match content_type.as_str() {
        content_types::OHTTP_REQUEST => {
            ohttp_gateway_request(&state, parts, body, &mut metrics).await
        }
        content_types::OHTTP_CHUNKED_REQUEST => {
            // Reserved content type with no streaming path behind it yet.
            metrics.fire(RESULT_INVALID_CONTENT_TYPE);
            http_error(
                state.debug_response,
                StatusCode::BAD_REQUEST,
                format!("invalid content type: {content_type}"),
                &mut metrics,
                method.as_str(),
            )
        }
        other => {
            metrics.fire(RESULT_INVALID_CONTENT_TYPE);
            http_error(
                state.debug_response,
                StatusCode::BAD_REQUEST,
                format!("invalid content type: {other}"),
                &mut metrics,
                method.as_str(),
            )
        }
    }
}

async fn ohttp_gateway_request(
    state: &AppState,
    parts: Parts,
    body: Body,
    metrics: &mut RequestMetrics,
) -> Response {
    let method = parts.method.clone();

    let Some(handler) = state.handlers.get(parts.uri.path()) else {
        return http_error(
            state.debug_response,
            StatusCode::BAD_REQUEST,
            "unknown handler".to_string(),
            metrics,
            method.as_str(),
        );
    };

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "reading request body failed");
            metrics.fire(RESULT_INVALID_CONTENT);
            return http_error(
                state.debug_response,
                StatusCode::BAD_REQUEST,
                "reading request body failed".to_string(),
                metrics,
                method.as_str(),
            );
        }
    };

    let encapsulated = match EncapsulatedRequest::unmarshal(&body) {
        Ok(encapsulated) => encapsulated,
        Err(err) => {
            tracing::debug!(error = %err, "parsing encapsulated request failed");
            metrics.fire(RESULT_INVALID_CONTENT);
            return http_error(
                state.debug_response,
                StatusCode::BAD_REQUEST,
                "parsing encapsulated request failed".to_string(),
                metrics,
                method.as_str(),
            );
        }
    };

    match handler.handle(&parts, encapsulated, metrics).await {
        Ok(response) => {
            let packed = response.marshal();
            metrics.response_status(method.as_str(), StatusCode::OK.as_u16());
            (
                [
                    (header::CONTENT_TYPE, content_types::OHTTP_RESPONSE),
                    (header::CONNECTION, "Keep-Alive"),
                ],
                packed,
            )
                .into_response()
        }
        Err(err) => {
            tracing::debug!(error = %err, "encapsulation handler failed");
            http_error(
                state.debug_response,
                err.outer_status(),
                err.to_string(),
                metrics,
                method.as_str(),
            )
        }
    }
}

/// Spread client key refreshes uniformly over a 12-36 h window.
fn cache_control_value() -> String {
    let max_age = rand::thread_rng().gen_range(TWELVE_HOURS..TWELVE_HOURS + TWENTY_FOUR_HOURS);
    format!("max-age={max_age}, private")
}

async fn configs_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let mut metrics = state.metrics.create(EVENT_CONFIGS_REQUEST);
    let method = request.method().clone();
    tracing::debug!(method = %method, path = request.uri().path(), "serving key configurations");

    let body = state.gateway.store().marshal_configs();
    metrics.response_status(method.as_str(), StatusCode::OK.as_u16());
    (
        [
            (header::CACHE_CONTROL, cache_control_value()),
            (header::CONTENT_TYPE, content_types::OHTTP_KEYS.to_string()),
        ],
        body,
    )
        .into_response()
}

async fn legacy_configs_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let mut metrics = state.metrics.create(EVENT_CONFIGS_REQUEST);
    let method = request.method().clone();
    tracing::debug!(method = %method, path = request.uri().path(), "serving legacy key configuration");

    let Some(body) = state.gateway.store().marshal_legacy_config() else {
        tracing::warn!("legacy configuration unavailable");
        metrics.fire(RESULT_CONFIGS_UNAVAILABLE);
        return http_error(
            state.debug_response,
            StatusCode::INTERNAL_SERVER_ERROR,
            "config unavailable".to_string(),
            &mut metrics,
            method.as_str(),
        );
    };

    metrics.response_status(method.as_str(), StatusCode::OK.as_u16());

    // Legacy clients dispatch on the absence of a Content-Type header, so
    // only Cache-Control is set here.
    let mut response = body.into_response();
    response.headers_mut().remove(header::CONTENT_TYPE);
    if let Ok(value) = HeaderValue::from_str(&cache_control_value()) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

async fn health_endpoint() -> &'static str {
    "ok"
}

/// Plaintext configuration dump served for any unrouted path.
async fn index_endpoint(State(state): State<AppState>) -> String {
    let endpoints = &state.endpoints;
    format!(
        "OHTTP Gateway\n\
         ----------------\n\
         Config endpoint: {}\n\
         Legacy config endpoint: {}\n\
         Target endpoint: {}\n\
            Request content type:  {}\n\
            Response content type: {}\n\
         Echo endpoint: {}\n\
         Metadata endpoint: {}\n\
         ----------------\n",
        endpoints.configs,
        endpoints.legacy_configs,
        endpoints.gateway,
        state.gateway.request_label(),
        state.gateway.response_label(),
        endpoints.echo,
        endpoints.metadata,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_control_window() {
        for _ in 0..64 {
            let value = cache_control_value();
            let max_age: u32 = value
                .strip_prefix("max-age=")
                .and_then(|rest| rest.strip_suffix(", private"))
                .and_then(|age| age.parse().ok())
                .expect("well-formed Cache-Control value");
            assert!((TWELVE_HOURS..TWELVE_HOURS + TWENTY_FOUR_HOURS).contains(&max_age));
        }
    }
}
