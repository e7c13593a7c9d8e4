//! ohttp-gateway binary
//!
//! All configuration comes from the environment; every setting has a
//! default, so `ohttp-gateway` with no environment boots a plaintext
//! listener on port 8080 with a random seed and unrestricted targets.
//!
//! Exits non-zero on startup failure (invalid seed, unpaired custom labels,
//! metrics exporter failure); runtime HTTP errors never terminate the
//! process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rand::RngCore;

use ohttp_core::{AeadId, Gateway, KdfId, KemId, KeyStore, Suite, SEED_LENGTH};
use ohttp_gateway::handler::{AppHandler, EncapsulationHandler, TargetClient};
use ohttp_gateway::{create_router, metrics, AppState, GatewayConfig, GatewayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let (request_label, response_label) = config
        .resolve_labels()
        .context("resolving content-type labels")?;

    let seed = match &config.seed {
        Some(seed) => {
            if config.log_secrets {
                tracing::info!(seed = %hex::encode(seed), "using configured key seed");
            } else {
                tracing::info!("using key seed provided in environment");
            }
            seed.clone()
        }
        None => {
            let mut seed = vec![0u8; SEED_LENGTH];
            rand::rngs::OsRng.fill_bytes(&mut seed);
            tracing::info!("generated a random key seed");
            seed
        }
    };

    let store = KeyStore::from_seed(
        &seed,
        config.config_id,
        Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::Aes128Gcm),
    )
    .context("deriving key configurations from seed")?;
    tracing::info!(
        primary_key_id = config.config_id,
        legacy_key_id = store.legacy_key_id(),
        "key configurations ready"
    );

    let gateway = Arc::new(Gateway::with_labels(store, request_label, response_label));

    let target_client = TargetClient::new(
        reqwest::Client::new(),
        config.allowed_origins.clone(),
        config.verbose,
    );

    let mut handlers = HashMap::new();
    handlers.insert(
        config.endpoints.gateway.clone(),
        EncapsulationHandler::new(gateway.clone(), AppHandler::BinaryHttp(target_client)),
    );
    handlers.insert(
        config.endpoints.echo.clone(),
        EncapsulationHandler::new(gateway.clone(), AppHandler::Echo),
    );
    handlers.insert(
        config.endpoints.metadata.clone(),
        EncapsulationHandler::new(gateway.clone(), AppHandler::Metadata),
    );

    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr, &config.service_name)
            .context("installing metrics exporter")?;
        tracing::info!(%addr, service = %config.service_name, "metrics exporter listening");
    }

    let state = AppState::new(
        gateway,
        handlers,
        config.endpoints.clone(),
        config.debug_response,
    );
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let mut server = GatewayServer::new(router, addr);
    if let Some((cert, key)) = config.tls_paths() {
        server = server.with_tls(cert, key);
    }

    server.run().await.context("serving")?;
    Ok(())
}
