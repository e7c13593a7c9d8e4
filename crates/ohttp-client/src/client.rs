//! Gateway client: key discovery plus one-shot encapsulated exchanges

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use ohttp_core::bhttp::{BinaryRequest, BinaryResponse};
use ohttp_core::content_types;
use ohttp_core::{EncapsulatedResponse, PublicConfig};

use crate::error::ClientError;
use crate::Result;

/// A client bound to one gateway.
///
/// Call [`GatewayClient::init`] to fetch the advertised key configurations,
/// then exchange messages through the gateway with [`GatewayClient::exchange`]
/// or [`GatewayClient::fetch_via_gateway`].
pub struct GatewayClient {
    http: Client,
    gateway_url: String,
    config_path: String,
    configs: Vec<PublicConfig>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("gateway_url", &self.gateway_url)
            .field("configs", &self.configs.len())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a client for the gateway at `gateway_url`, using the default
    /// key-discovery path.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self::with_config_path(gateway_url, "/ohttp-keys")
    }

    pub fn with_config_path(
        gateway_url: impl Into<String>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
            config_path: config_path.into(),
            configs: Vec::new(),
        }
    }

    /// Fetch and parse the gateway's advertised key configurations.
    pub async fn init(&mut self) -> Result<()> {
        let bytes = self
            .http
            .get(format!("{}{}", self.gateway_url, self.config_path))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        self.configs = PublicConfig::parse_list(&bytes)?;
        tracing::debug!(configs = self.configs.len(), "fetched gateway key configurations");
        Ok(())
    }

    /// The advertised configurations, primary first.
    pub fn configs(&self) -> &[PublicConfig] {
        &self.configs
    }

    /// Encapsulate `plaintext` to the gateway's primary configuration, POST
    /// it to `path` and decapsulate the response.
    pub async fn exchange(&self, path: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let config = self.configs.first().ok_or(ClientError::NoConfig)?;
        self.exchange_with_config(config, path, plaintext).await
    }

    /// As [`GatewayClient::exchange`], but against an explicit configuration.
    pub async fn exchange_with_config(
        &self,
        config: &PublicConfig,
        path: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let sender = ohttp_core::Client::new(config.clone());
        let (request, context) = sender.encapsulate_request(plaintext)?;

        let response = self
            .http
            .post(format!("{}{}", self.gateway_url, path))
            .header(CONTENT_TYPE, content_types::OHTTP_REQUEST)
            .body(request.marshal())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::GatewayStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if content_type.as_deref() != Some(content_types::OHTTP_RESPONSE) {
            return Err(ClientError::UnexpectedContentType(content_type));
        }

        let body = response.bytes().await?;
        let encapsulated = EncapsulatedResponse::unmarshal(&body, context.suite().aead)?;
        Ok(context.decapsulate_response(&encapsulated)?)
    }

    /// Send an inner HTTP request through the gateway's application endpoint
    /// and decode the inner response.
    pub async fn fetch_via_gateway(
        &self,
        gateway_path: &str,
        inner: &BinaryRequest,
    ) -> Result<BinaryResponse> {
        let plaintext = inner.encode();
        let sealed = self.exchange(gateway_path, &plaintext).await?;
        Ok(BinaryResponse::decode(&sealed)?)
    }
}
