//! Gateway configuration from the environment
//!
//! Every setting has a default so the gateway boots with no environment at
//! all: plaintext listener on 8080, random seed, unrestricted targets.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use ohttp_core::{DEFAULT_REQUEST_LABEL, DEFAULT_RESPONSE_LABEL};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GATEWAY_ENDPOINT: &str = "/gateway";
pub const DEFAULT_CONFIG_ENDPOINT: &str = "/ohttp-keys";
pub const DEFAULT_LEGACY_CONFIG_ENDPOINT: &str = "/ohttp-configs";
pub const DEFAULT_ECHO_ENDPOINT: &str = "/gateway-echo";
pub const DEFAULT_METADATA_ENDPOINT: &str = "/gateway-metadata";
pub const DEFAULT_HEALTH_ENDPOINT: &str = "/health";
pub const DEFAULT_SERVICE_NAME: &str = "ohttp_gateway";

// Environment variables. Names are part of the deployment contract.
const PORT_VAR: &str = "PORT";
const GATEWAY_ENDPOINT_VAR: &str = "GATEWAY_ENDPOINT";
const CONFIG_ENDPOINT_VAR: &str = "CONFIG_ENDPOINT";
const LEGACY_CONFIG_ENDPOINT_VAR: &str = "LEGACY_CONFIG_ENDPOINT";
const ECHO_ENDPOINT_VAR: &str = "ECHO_ENDPOINT";
const METADATA_ENDPOINT_VAR: &str = "METADATA_ENDPOINT";
const HEALTH_ENDPOINT_VAR: &str = "HEALTH_ENDPOINT";
const CONFIGURATION_ID_VAR: &str = "CONFIGURATION_ID";
const SEED_VAR: &str = "SEED_SECRET_KEY";
const ALLOWED_ORIGINS_VAR: &str = "ALLOWED_TARGET_ORIGINS";
const CUSTOM_REQUEST_LABEL_VAR: &str = "CUSTOM_REQUEST_TYPE";
const CUSTOM_RESPONSE_LABEL_VAR: &str = "CUSTOM_RESPONSE_TYPE";
const CERT_VAR: &str = "CERT";
const KEY_VAR: &str = "KEY";
const METRICS_HOST_VAR: &str = "MONITORING_METRICS_HOST";
const METRICS_PORT_VAR: &str = "MONITORING_METRICS_PORT";
const SERVICE_NAME_VAR: &str = "MONITORING_SERVICE_NAME";
const DEBUG_VAR: &str = "GATEWAY_DEBUG";
const VERBOSE_VAR: &str = "VERBOSE";
const LOG_SECRETS_VAR: &str = "LOG_SECRETS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid hex seed: {0}")]
    InvalidSeedEncoding(#[from] hex::FromHexError),

    #[error("custom content-type labels must be configured in pairs")]
    UnpairedLabels,

    #[error("endpoint paths must be distinct: {0}")]
    DuplicateEndpoint(String),

    #[error("endpoint path must start with '/': {0}")]
    InvalidEndpoint(String),

    #[error("invalid metrics listen address: {0}")]
    InvalidMetricsAddr(String),
}

/// The routable paths the gateway exposes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub gateway: String,
    pub echo: String,
    pub metadata: String,
    pub configs: String,
    pub legacy_configs: String,
    pub health: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_GATEWAY_ENDPOINT.to_string(),
            echo: DEFAULT_ECHO_ENDPOINT.to_string(),
            metadata: DEFAULT_METADATA_ENDPOINT.to_string(),
            configs: DEFAULT_CONFIG_ENDPOINT.to_string(),
            legacy_configs: DEFAULT_LEGACY_CONFIG_ENDPOINT.to_string(),
            health: DEFAULT_HEALTH_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            &self.gateway,
            &self.echo,
            &self.metadata,
            &self.configs,
            &self.legacy_configs,
            &self.health,
        ];
        let mut seen = HashSet::new();
        for path in all {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidEndpoint(path.clone()));
            }
            if !seen.insert(path.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(path.clone()));
            }
        }
        Ok(())
    }
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub endpoints: Endpoints,
    pub config_id: u8,
    /// Decoded seed, if one was provided; a random seed is used otherwise.
    pub seed: Option<Vec<u8>>,
    pub allowed_origins: Option<HashSet<String>>,
    pub custom_request_label: Option<String>,
    pub custom_response_label: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub debug_response: bool,
    pub verbose: bool,
    pub log_secrets: bool,
    pub metrics_addr: Option<SocketAddr>,
    pub service_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            endpoints: Endpoints::default(),
            config_id: 0,
            seed: None,
            allowed_origins: None,
            custom_request_label: None,
            custom_response_label: None,
            cert_file: None,
            key_file: None,
            debug_response: false,
            verbose: false,
            log_secrets: false,
            metrics_addr: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoints = Endpoints {
            gateway: env_string(GATEWAY_ENDPOINT_VAR, DEFAULT_GATEWAY_ENDPOINT),
            echo: env_string(ECHO_ENDPOINT_VAR, DEFAULT_ECHO_ENDPOINT),
            metadata: env_string(METADATA_ENDPOINT_VAR, DEFAULT_METADATA_ENDPOINT),
            configs: env_string(CONFIG_ENDPOINT_VAR, DEFAULT_CONFIG_ENDPOINT),
            legacy_configs: env_string(LEGACY_CONFIG_ENDPOINT_VAR, DEFAULT_LEGACY_CONFIG_ENDPOINT),
            health: env_string(HEALTH_ENDPOINT_VAR, DEFAULT_HEALTH_ENDPOINT),
        };
        endpoints.validate()?;

        let seed = match env_opt(SEED_VAR) {
            Some(seed_hex) => Some(hex::decode(seed_hex)?),
            None => None,
        };

        let metrics_addr = match (env_opt(METRICS_HOST_VAR), env_opt(METRICS_PORT_VAR)) {
            (Some(host), Some(port)) => {
                let addr = format!("{host}:{port}");
                Some(
                    addr.parse()
                        .map_err(|_| ConfigError::InvalidMetricsAddr(addr))?,
                )
            }
            _ => None,
        };

        Ok(Self {
            port: env_u64(PORT_VAR, u64::from(DEFAULT_PORT)) as u16,
            endpoints,
            config_id: env_u64(CONFIGURATION_ID_VAR, 0) as u8,
            seed,
            allowed_origins: env_opt(ALLOWED_ORIGINS_VAR).map(|list| parse_origin_list(&list)),
            custom_request_label: env_opt(CUSTOM_REQUEST_LABEL_VAR),
            custom_response_label: env_opt(CUSTOM_RESPONSE_LABEL_VAR),
            cert_file: env_opt(CERT_VAR).map(PathBuf::from),
            key_file: env_opt(KEY_VAR).map(PathBuf::from),
            debug_response: env_bool(DEBUG_VAR, false),
            verbose: env_bool(VERBOSE_VAR, false),
            log_secrets: env_bool(LOG_SECRETS_VAR, false),
            metrics_addr,
            service_name: env_string(SERVICE_NAME_VAR, DEFAULT_SERVICE_NAME),
        })
    }

    /// Resolve the HPKE label pair from the custom-label settings.
    ///
    /// Both unset, or both set to the same value, selects the defaults.
    /// Setting only one of the pair is a startup error.
    pub fn resolve_labels(&self) -> Result<(String, String), ConfigError> {
        match (&self.custom_request_label, &self.custom_response_label) {
            (None, None) => Ok((
                DEFAULT_REQUEST_LABEL.to_string(),
                DEFAULT_RESPONSE_LABEL.to_string(),
            )),
            (Some(request), Some(response)) if request == response => Ok((
                DEFAULT_REQUEST_LABEL.to_string(),
                DEFAULT_RESPONSE_LABEL.to_string(),
            )),
            (Some(request), Some(response)) => Ok((request.clone(), response.clone())),
            _ => Err(ConfigError::UnpairedLabels),
        }
    }

    /// TLS paths when both are configured; plaintext listener otherwise.
    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
            _ => None,
        }
    }
}

/// Split a comma-separated origin list into the allowlist set.
pub fn parse_origin_list(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_string(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
