//! HTTP server
//!
//! Wires configuration, storage, channel adapters and the engine into the axum
//! application.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use inbox_core::adapter::AdapterRegistry;
use inbox_core::config::Config;
use inbox_core::repository::{ConversationRepository, MessageRepository, NotificationSink};
use inbox_core::store::SqliteStore;
use inbox_engine::{
    ConfigCredentialsResolver, ConfigTenantResolver, OutboundService, ReconciliationEngine,
};
use inbox_instagram::InstagramAdapter;
use inbox_whatsapp::WhatsAppAdapter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::routes;
use crate::sink::LoggingNotificationSink;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconciliationEngine,
    pub outbound: OutboundService,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub whatsapp: Option<Arc<WhatsAppAdapter>>,
    pub instagram: Option<Arc<InstagramAdapter>>,
    /// URL Twilio signs requests against, set when signature validation is on
    pub twilio_webhook_url: Option<String>,
}

impl AppState {
    /// Build adapters, resolvers and services from configuration
    pub fn from_config(config: &Config, store: SqliteStore) -> anyhow::Result<Self> {
        Self::with_sink(config, store, Arc::new(LoggingNotificationSink))
    }

    pub fn with_sink(
        config: &Config,
        store: SqliteStore,
        sink: Arc<dyn NotificationSink>,
    ) -> anyhow::Result<Self> {
        let mut adapters = AdapterRegistry::new();

        let whatsapp = match &config.whatsapp {
            Some(wa) => {
                let adapter = WhatsAppAdapter::from_config(wa, &config.http)
                    .context("Failed to create WhatsApp adapter")?;
                let adapter = Arc::new(adapter);
                adapters.register(adapter.clone());
                info!("WhatsApp channel enabled");
                Some(adapter)
            }
            None => None,
        };

        let instagram = match &config.instagram {
            Some(ig) => {
                let adapter = InstagramAdapter::from_config(ig, &config.http)
                    .context("Failed to create Instagram adapter")?;
                let adapter = Arc::new(adapter);
                adapters.register(adapter.clone());
                info!("Instagram channel enabled");
                Some(adapter)
            }
            None => None,
        };

        let twilio_webhook_url = config
            .whatsapp
            .as_ref()
            .filter(|wa| wa.validate_signature)
            .and_then(|wa| wa.webhook_url.clone());

        let conversations: Arc<dyn ConversationRepository> = Arc::new(store.clone());
        let messages: Arc<dyn MessageRepository> = Arc::new(store.clone());
        let credentials = Arc::new(ConfigCredentialsResolver::from_config(config));

        let engine = ReconciliationEngine::new(
            conversations.clone(),
            messages.clone(),
            sink.clone(),
            adapters.clone(),
        )
        .with_tenant_resolver(Arc::new(ConfigTenantResolver::from_config(config)))
        .with_credentials_resolver(credentials.clone())
        .with_profile_store(Arc::new(store));

        let outbound =
            OutboundService::new(conversations.clone(), messages.clone(), sink, adapters)
                .with_credentials_resolver(credentials);

        Ok(Self {
            engine,
            outbound,
            conversations,
            messages,
            whatsapp,
            instagram,
            twilio_webhook_url,
        })
    }
}

/// Build the axum application
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown signal received");
}
