//! Listener bootstrap: plaintext by default, rustls when cert/key are set

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;

/// Serves a built router on one address.
pub struct GatewayServer {
    router: Router,
    addr: SocketAddr,
    tls: Option<(PathBuf, PathBuf)>,
}

impl GatewayServer {
    pub fn new(router: Router, addr: SocketAddr) -> Self {
        Self {
            router,
            addr,
            tls: None,
        }
    }

    /// Terminate TLS with the given PEM certificate and key.
    pub fn with_tls(mut self, cert: PathBuf, key: PathBuf) -> Self {
        self.tls = Some((cert, key));
        self
    }

    pub async fn run(self) -> std::io::Result<()> {
        match self.tls {
            Some((cert, key)) => {
                tracing::info!(addr = %self.addr, cert = %cert.display(), "listening with TLS");
                let tls_config = RustlsConfig::from_pem_file(cert, key).await?;
                axum_server::bind_rustls(self.addr, tls_config)
                    .serve(self.router.into_make_service())
                    .await
            }
            None => {
                tracing::info!(addr = %self.addr, "listening without TLS");
                let listener = TcpListener::bind(self.addr).await?;
                axum::serve(listener, self.router).await
            }
        }
    }
}
