//! Inner request dispatch: decapsulate, run one application handler, seal
//!
//! The three handler variants share one contract: consume the decapsulated
//! plaintext and produce the inner response bytes, or an application-tier
//! error. Application-tier failures are sealed with the same context as a
//! successful response would be, under an outer 200.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::request::Parts;

use ohttp_core::bhttp::{BinaryRequest, BinaryResponse};
use ohttp_core::{EncapsulatedRequest, EncapsulatedResponse, Gateway};

use crate::error::GatewayError;
use crate::metrics::{
    RequestMetrics, PAYLOAD_STATUS_PREFIX, RESULT_CONFIG_MISMATCH, RESULT_CONTENT_DECODE_FAILED,
    RESULT_CONTENT_ENCODE_FAILED, RESULT_DECAPSULATION_FAILED, RESULT_ENCAPSULATION_FAILED,
    RESULT_REQUEST_TRANSLATE_FAILED, RESULT_SUCCESS, RESULT_TARGET_REQUEST_FAILED,
    RESULT_TARGET_REQUEST_FORBIDDEN,
};

/// Outbound HTTP dispatch restricted to an allowlist of target origins.
#[derive(Debug, Clone)]
pub struct TargetClient {
    http: reqwest::Client,
    allowed_origins: Option<HashSet<String>>,
    log_forbidden_errors: bool,
}

impl TargetClient {
    pub fn new(
        http: reqwest::Client,
        allowed_origins: Option<HashSet<String>>,
        log_forbidden_errors: bool,
    ) -> Self {
        Self {
            http,
            allowed_origins,
            log_forbidden_errors,
        }
    }

    /// Decode the plaintext as a binary HTTP request, police the target,
    /// fetch, and re-encode the response.
    async fn dispatch(
        &self,
        plaintext: &[u8],
        metrics: &mut RequestMetrics,
    ) -> Result<Vec<u8>, GatewayError> {
        let inner = match BinaryRequest::decode(plaintext) {
            Ok(inner) => inner,
            Err(err) => {
                tracing::debug!(error = %err, "inner payload is not valid binary HTTP");
                metrics.fire(RESULT_CONTENT_DECODE_FAILED);
                return Err(GatewayError::PayloadMarshalling);
            }
        };

        let Some(host) = inner.host() else {
            metrics.fire(RESULT_REQUEST_TRANSLATE_FAILED);
            return Err(GatewayError::PayloadMarshalling);
        };

        // The inner Host is the sole policy authority; the outer request
        // addressed the gateway itself and is irrelevant here.
        if let Some(allowed) = &self.allowed_origins {
            if !allowed.contains(&host) {
                metrics.fire(RESULT_TARGET_REQUEST_FORBIDDEN);
                if self.log_forbidden_errors {
                    tracing::warn!(%host, path = %inner.path, "target forbidden on gateway");
                }
                return Err(GatewayError::TargetForbidden);
            }
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &inner.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                metrics.fire(RESULT_REQUEST_TRANSLATE_FAILED);
                return Err(GatewayError::PayloadMarshalling);
            };
            let Ok(value) = HeaderValue::from_bytes(value) else {
                metrics.fire(RESULT_REQUEST_TRANSLATE_FAILED);
                return Err(GatewayError::PayloadMarshalling);
            };
            headers.append(name, value);
        }

        let scheme = if inner.scheme.is_empty() {
            "http"
        } else {
            inner.scheme.as_str()
        };
        let path = if inner.path.is_empty() {
            "/"
        } else {
            inner.path.as_str()
        };
        let url = format!("{scheme}://{host}{path}");

        let response = match self
            .http
            .request(inner.method.clone(), url)
            .headers(headers)
            .body(inner.body.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "outbound target request failed");
                metrics.fire(RESULT_TARGET_REQUEST_FAILED);
                return Err(GatewayError::TargetRequestFailed);
            }
        };
        metrics.fire(RESULT_SUCCESS);

        let status = response.status();
        let response_headers: Vec<(String, Vec<u8>)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(error = %err, "reading target response body failed");
                metrics.fire(RESULT_CONTENT_ENCODE_FAILED);
                return Err(GatewayError::InternalServer);
            }
        };

        metrics.response_status(PAYLOAD_STATUS_PREFIX, status.as_u16());
        Ok(BinaryResponse {
            status,
            headers: response_headers,
            body: body.to_vec(),
        }
        .encode())
    }
}

/// The application handler variants, selected per endpoint at boot.
#[derive(Debug)]
pub enum AppHandler {
    /// Returns the plaintext unmodified.
    Echo,
    /// Returns a dump of the outer request's method, URL and headers.
    Metadata,
    /// Decodes the plaintext as binary HTTP and fetches from the target.
    BinaryHttp(TargetClient),
}

/// Drives one encapsulated exchange: decapsulate, dispatch, seal.
#[derive(Debug)]
pub struct EncapsulationHandler {
    gateway: Arc<Gateway>,
    app: AppHandler,
}

impl EncapsulationHandler {
    pub fn new(gateway: Arc<Gateway>, app: AppHandler) -> Self {
        Self { gateway, app }
    }

    pub async fn handle(
        &self,
        outer: &Parts,
        request: EncapsulatedRequest,
        metrics: &mut RequestMetrics,
    ) -> Result<EncapsulatedResponse, GatewayError> {
        let (plaintext, context) = match self.gateway.decapsulate(&request) {
            Ok(decapsulated) => decapsulated,
            Err(ohttp_core::Error::ConfigMismatch) => {
                metrics.fire(RESULT_CONFIG_MISMATCH);
                return Err(GatewayError::ConfigMismatch);
            }
            Err(_) => {
                metrics.fire(RESULT_DECAPSULATION_FAILED);
                return Err(GatewayError::Encapsulation);
            }
        };

        let inner_result = match &self.app {
            AppHandler::Echo => {
                metrics.fire(RESULT_SUCCESS);
                Ok(plaintext)
            }
            AppHandler::Metadata => match dump_outer_request(outer) {
                Ok(dump) => {
                    metrics.fire(RESULT_SUCCESS);
                    Ok(dump)
                }
                Err(_) => {
                    metrics.fire(RESULT_CONTENT_ENCODE_FAILED);
                    Err(GatewayError::InternalServer)
                }
            },
            AppHandler::BinaryHttp(target) => target.dispatch(&plaintext, metrics).await,
        };

        let response_plaintext = match inner_result {
            Ok(bytes) => bytes,
            Err(err) if err.is_application() => {
                // Sealed inner failure: the relay sees only an outer 200.
                let status = err.inner_status();
                metrics.response_status(PAYLOAD_STATUS_PREFIX, status.as_u16());
                BinaryResponse::new(status, err.to_string().into_bytes()).encode()
            }
            Err(err) => return Err(err),
        };

        match context.encapsulate_response(&response_plaintext) {
            Ok(response) => Ok(response),
            Err(_) => {
                metrics.fire(RESULT_ENCAPSULATION_FAILED);
                Err(GatewayError::Encapsulation)
            }
        }
    }
}

/// Textual dump of the outer request line and headers, body excluded.
fn dump_outer_request(parts: &Parts) -> Result<Vec<u8>, std::fmt::Error> {
    let mut dump = String::new();
    write!(dump, "{} {} {:?}\r\n", parts.method, parts.uri, parts.version)?;
    for (name, value) in &parts.headers {
        write!(dump, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))?;
    }
    dump.push_str("\r\n");
    Ok(dump.into_bytes())
}
