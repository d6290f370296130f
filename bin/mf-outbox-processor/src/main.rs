//! MarketFlow Outbox Processor Server
//!
//! Polls the outbox for pending notification and broadcast items and
//! delivers them to the configured collaborators.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use mf_common::OutboxRepository;
use mf_config::AppConfig;
use mf_outbox::{
    Broadcaster, ChannelBroadcaster, LogNotifier, MongoOutboxRepository, Notifier,
    OutboxProcessor, OutboxProcessorConfig, RedisBroadcaster, WebhookNotifier,
    WebhookNotifierConfig,
};
use mongodb::Client as MongoClient;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mf_common::logging::init_logging("mf-outbox-processor");

    info!("Starting MarketFlow Outbox Processor");

    let config = AppConfig::load()?;
    info!(
        poll_interval_ms = config.outbox.poll_interval_ms,
        batch_size = config.outbox.batch_size,
        "Outbox configuration loaded"
    );

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let mongo_client = MongoClient::with_uri_str(&config.mongodb.uri).await?;
    let db = mongo_client.database(&config.mongodb.database);
    info!(database = %config.mongodb.database, "Connected to MongoDB");

    let repository: Arc<dyn OutboxRepository> = Arc::new(MongoOutboxRepository::new(&db));

    let notifier: Arc<dyn Notifier> = if config.dev_mode {
        Arc::new(LogNotifier)
    } else {
        Arc::new(WebhookNotifier::new(WebhookNotifierConfig {
            webhook_url: config.notify.webhook_url.clone(),
            signing_key: config.notify.signing_key.clone(),
            connect_timeout: Duration::from_secs(config.notify.connect_timeout_seconds),
            request_timeout: Duration::from_secs(config.notify.request_timeout_seconds),
        })?)
    };

    let broadcaster: Arc<dyn Broadcaster> = if config.dev_mode {
        Arc::new(ChannelBroadcaster::new(1024))
    } else {
        Arc::new(
            RedisBroadcaster::connect(&config.redis.url, config.redis.channel_prefix.clone())
                .await?,
        )
    };

    let processor = Arc::new(OutboxProcessor::new(
        repository,
        notifier,
        broadcaster,
        OutboxProcessorConfig {
            poll_interval: Duration::from_millis(config.outbox.poll_interval_ms),
            batch_size: config.outbox.batch_size,
            max_retries: config.outbox.max_retries,
            stuck_timeout: Duration::from_secs(config.outbox.stuck_timeout_seconds),
        },
    ));

    let processor_task = processor.clone();
    tokio::spawn(async move {
        processor_task.start().await;
    });

    let app = Router::new()
        .route("/q/health", get(|| async { Json(serde_json::json!({"status": "UP"})) }))
        .route("/q/health/live", get(|| async { Json(serde_json::json!({"status": "UP"})) }))
        .route("/q/health/ready", get(|| async { Json(serde_json::json!({"status": "UP"})) }))
        .route("/q/metrics", get(move || {
            let prometheus = prometheus.clone();
            async move { prometheus.render() }
        }));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    info!(?addr, "HTTP server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Outbox processor stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
