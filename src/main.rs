use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use careline::analysis::ParameterInterpreter;
use careline::api::{webhook_router, ApiContext};
use careline::completion::HttpCompletionClient;
use careline::config::{self, EngineConfig};
use careline::engine::FollowupEngine;
use careline::notify::{LoggingEmailSender, LoggingMessageSender, NotificationDispatcher};
use careline::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = EngineConfig::from_env();
    let store = Arc::new(
        MemoryStore::new().with_default_country_code(cfg.default_country_code.clone()),
    );
    let dispatcher = NotificationDispatcher::new(
        Arc::new(LoggingMessageSender),
        Arc::new(LoggingEmailSender),
        cfg.clinician_phone.clone(),
        cfg.clinician_email.clone(),
    );
    let interpreter = ParameterInterpreter::new(Arc::new(HttpCompletionClient::from_env()));
    let engine = FollowupEngine::new(store, dispatcher, interpreter, cfg);

    let app = webhook_router(ApiContext::new(engine));

    let bind = std::env::var("CARELINE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(addr = %bind, "Webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
