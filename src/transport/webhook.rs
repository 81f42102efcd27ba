//! Webhook delivery: teloxide's axum listener, served by us so certificates
//! can be loaded directly when no proxy terminates TLS.

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use teloxide::update_listeners::webhooks::Options;
use tracing::{info, warn};

use crate::config::WebhookServerConfig;

/// Listener options. The route is the path of the public URL, and Telegram
/// must echo the secret token in every request; teloxide generates one when
/// none is configured.
pub fn options(config: &WebhookServerConfig) -> Options {
    let mut options = Options::new(config.listen, config.public_url.clone());
    if let Some(secret) = &config.secret_token {
        options = options.secret_token(secret.clone());
    }
    if config.behind_proxy {
        options = options.drop_pending_updates();
    }
    options
}

/// Serve the webhook router until the listener's stop flag fires
pub async fn serve<F>(app: Router, config: &WebhookServerConfig, stop_flag: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    match &config.tls {
        Some(tls) => {
            info!("Loading TLS certificates:");
            info!("  Certificate: {}", tls.cert_path.display());
            info!("  Private key: {}", tls.key_path.display());
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| anyhow::anyhow!(
                    "Failed to load TLS certificates: {}\n  Certificate: {}\n  Private key: {}",
                    e, tls.cert_path.display(), tls.key_path.display()
                ))?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                stop_flag.await;
                shutdown.graceful_shutdown(None);
            });

            info!("Webhook server listening on https://{}", config.listen);
            axum_server::bind_rustls(config.listen, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            if !config.behind_proxy {
                warn!("No SSL_CERT/SSL_KEY configured, serving plain HTTP");
            }
            let listener = tokio::net::TcpListener::bind(config.listen).await?;
            info!("Webhook server listening on http://{}", config.listen);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(stop_flag)
                .await?;
        }
    }

    Ok(())
}
