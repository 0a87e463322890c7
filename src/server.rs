//! HTTP side of webhook mode: Telegram's update endpoint plus `/health`.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, UpdateListener};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::WebhookConfig;

#[derive(Debug)]
pub enum ServerError {
    /// Telegram refused the webhook registration.
    SetWebhook(teloxide::RequestError),
    /// Could not bind the listen address.
    Bind { addr: SocketAddr, source: std::io::Error },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetWebhook(e) => write!(f, "failed to register webhook: {}", e),
            Self::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SetWebhook(e) => Some(e),
            Self::Bind { source, .. } => Some(source),
        }
    }
}

/// Registers the webhook with Telegram and serves it together with `/health`.
///
/// The returned listener feeds the dispatcher; when the dispatcher stops it,
/// the HTTP server shuts down gracefully.
pub async fn webhook_listener(
    bot: Bot,
    webhook: &WebhookConfig,
) -> Result<impl UpdateListener<Err = Infallible>, ServerError> {
    // Bind before the webhook is registered
    let addr = webhook.listen_addr;
    let tcp = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind { addr, source: e })?;

    bot.set_webhook(webhook.url.clone())
        .secret_token(webhook.secret.clone())
        .await
        .map_err(ServerError::SetWebhook)?;
    let (listener, stop_flag, router) = app(options(webhook));

    info!("Webhook registered at {}, listening on {}", webhook.url, addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, router).with_graceful_shutdown(stop_flag).await {
            error!("HTTP server error: {e}");
        }
        info!("HTTP server stopped");
    });

    Ok(listener)
}

fn options(webhook: &WebhookConfig) -> webhooks::Options {
    webhooks::Options::new(webhook.listen_addr, webhook.url.clone()).secret_token(webhook.secret.clone())
}

/// Update route on the webhook path (rejects a missing or wrong secret header)
/// merged with `/health`. Does not talk to Telegram.
fn app(
    options: webhooks::Options,
) -> (
    impl UpdateListener<Err = Infallible>,
    impl Future<Output = ()> + Send + 'static,
    Router,
) {
    let (listener, stop_flag, router) = webhooks::axum_no_setup(options);
    (listener, stop_flag, router.merge(health_router()))
}

fn health_router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
