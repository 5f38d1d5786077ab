use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::routing::{get, post};
use axum::Router;
use tracing::{error, info};

use crate::dispatch::UpdateProcessor;
use crate::request::RequestFactory;
use crate::transport::Transport;
use crate::update::Update;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Public HTTPS URL the platform will call; its path becomes the local
    /// callback route.
    pub public_url: String,
    pub listen_addr: SocketAddr,
    /// Self-signed certificate to attach to the subscription call.
    pub certificate: Option<PathBuf>,
}

#[derive(Clone)]
struct WebhookState {
    processor: Arc<dyn UpdateProcessor>,
}

/// Push acquisition: registers the callback with the platform at construction
/// and serves inbound updates over HTTP. TLS termination is left to the
/// fronting infrastructure; only the certificate file travels to the
/// subscribe call.
pub struct WebhookBot {
    router: Router,
    listen_addr: SocketAddr,
}

impl WebhookBot {
    /// Performs the one-time platform subscription and prepares the routes.
    /// Subscription failure is fatal: without it the platform would never
    /// call back.
    pub async fn subscribe_and_bind(
        factory: &RequestFactory,
        transport: Arc<dyn Transport>,
        processor: Arc<dyn UpdateProcessor>,
        config: &WebhookConfig,
    ) -> Result<Self> {
        let path = callback_path(&config.public_url)?;
        let certificate = match &config.certificate {
            Some(cert_path) => {
                let filename = cert_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("certificate.pem")
                    .to_string();
                let bytes = std::fs::read(cert_path).with_context(|| {
                    format!("failed to read certificate {}", cert_path.display())
                })?;
                Some((filename, bytes))
            }
            None => None,
        };
        let request = factory.subscribe_webhook(
            &config.public_url,
            certificate.as_ref().map(|(n, b)| (n.as_str(), b.as_slice())),
        )?;
        let reply = transport
            .execute(&request)
            .await
            .context("webhook subscription failed")?;
        info!("webhook sign-up result: {}", String::from_utf8_lossy(&reply));
        info!("callback path is: {}", path);

        let router = Router::new()
            .route(&path, post(receive_update))
            .route("/ping", get(ping))
            .with_state(WebhookState { processor });
        Ok(Self {
            router,
            listen_addr: config.listen_addr,
        })
    }

    /// Serve until the process exits. There is no graceful-shutdown contract
    /// for this mode.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        info!("webhook listening on {}", self.listen_addr);
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("webhook server terminated")?;
        Ok(())
    }

    /// No-op: the listener runs until the process exits.
    pub fn stop(&self) {}
}

fn callback_path(public_url: &str) -> Result<String> {
    let url = reqwest::Url::parse(public_url)
        .with_context(|| format!("invalid webhook URL: {}", public_url))?;
    let path = url.path();
    Ok(if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    })
}

/// The platform expects no response body and ignores our status beyond "came
/// back promptly", so both decode and processing failures only get logged.
async fn receive_update(State(state): State<WebhookState>, body: Bytes) {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            error!("failed to decode update body: {e:#}");
            return;
        }
    };
    if let Err(e) = state.processor.process(&update).await {
        error!("failed to process update {}: {e:#}", update.id);
    }
}

/// Liveness endpoint, unrelated to update processing.
async fn ping(ConnectInfo(addr): ConnectInfo<SocketAddr>) -> String {
    format!(
        "Ping from '{}'.\nReceived at: {}.",
        addr,
        chrono::Utc::now()
    )
}
