//! MarketFlow Sweeper Server
//!
//! Runs the offer expiry and escrow maturity sweepers against the
//! configured store, with health and metrics endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use mf_config::AppConfig;
use mf_fulfillment::dispatch_job::ExpireStaleOffersUseCase;
use mf_fulfillment::escrow_hold::ReleaseHoldUseCase;
use mf_fulfillment::{
    DispatchStore, EmbeddedStore, EscrowStore, ExhaustionPolicy, MongoStore, OrderStore,
    PoolSelector, RankingPolicy, RiderStore,
};
use mf_sweeper::{EscrowMaturityPoller, FulfillmentSweeper, OfferExpiryPoller, SweeperConfig};
use mongodb::Client as MongoClient;
use serde::Serialize;
use tracing::info;

struct Stores {
    dispatch: Arc<dyn DispatchStore>,
    rider: Arc<dyn RiderStore>,
    order: Arc<dyn OrderStore>,
    escrow: Arc<dyn EscrowStore>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    if config.dev_mode || config.store.backend == "embedded" {
        info!("Using embedded store");
        let store = Arc::new(EmbeddedStore::new());
        return Ok(Stores {
            dispatch: store.clone(),
            rider: store.clone(),
            order: store.clone(),
            escrow: store,
        });
    }

    let client = MongoClient::with_uri_str(&config.mongodb.uri).await?;
    let db = client.database(&config.mongodb.database);
    info!(database = %config.mongodb.database, "Connected to MongoDB");

    let store = MongoStore::new(client, &db);
    store.ensure_indexes().await?;
    let store = Arc::new(store);
    Ok(Stores {
        dispatch: store.clone(),
        rider: store.clone(),
        order: store.clone(),
        escrow: store,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    sweeper_running: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mf_common::logging::init_logging("mf-sweeper-server");

    info!("Starting MarketFlow Fulfillment Sweeper");

    let config = AppConfig::load()?;
    info!(
        enabled = config.sweeper.enabled,
        offer_poll_ms = config.sweeper.offer_poll_interval_ms,
        escrow_poll_ms = config.sweeper.escrow_poll_interval_ms,
        "Sweeper configuration loaded"
    );

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let stores = build_stores(&config).await?;

    let ranking = RankingPolicy::from_config(&config.dispatch.ranking)
        .map_err(|e| anyhow::anyhow!(e))?;
    let selector = PoolSelector::new(stores.rider.clone(), ranking);
    let exhaustion = ExhaustionPolicy::from_config(
        &config.dispatch.exhaustion_policy,
        config.dispatch.rebroadcast_limit,
    )
    .map_err(|e| anyhow::anyhow!(e))?;

    let expire_offers =
        ExpireStaleOffersUseCase::new(stores.dispatch.clone(), selector.clone(), exhaustion);
    let release_hold = ReleaseHoldUseCase::new(stores.escrow.clone(), stores.order.clone());

    let sweeper_config = SweeperConfig {
        enabled: config.sweeper.enabled,
        offer_poll_interval: Duration::from_millis(config.sweeper.offer_poll_interval_ms),
        escrow_poll_interval: Duration::from_millis(config.sweeper.escrow_poll_interval_ms),
        batch_size: config.sweeper.batch_size,
        offer_ttl: Duration::from_secs(config.dispatch.offer_ttl_seconds),
    };

    let offer_poller = OfferExpiryPoller::new(
        expire_offers,
        sweeper_config.offer_ttl,
        sweeper_config.batch_size,
    );
    let escrow_poller = EscrowMaturityPoller::new(
        stores.escrow.clone(),
        release_hold,
        sweeper_config.batch_size,
    );

    let sweeper = Arc::new(FulfillmentSweeper::new(
        sweeper_config,
        offer_poller,
        escrow_poller,
    ));
    sweeper.start().await;

    let sweeper_clone = sweeper.clone();
    let app = Router::new()
        .route(
            "/q/health",
            get(move || {
                let s = sweeper_clone.clone();
                async move {
                    let running = s.is_running().await;
                    Json(HealthResponse {
                        status: if running { "UP".to_string() } else { "DOWN".to_string() },
                        sweeper_running: running,
                    })
                }
            }),
        )
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
        .with_graceful_shutdown(shutdown_signal(sweeper))
        .await?;

    info!("Sweeper server stopped");
    Ok(())
}

async fn shutdown_signal(sweeper: Arc<FulfillmentSweeper>) {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
    sweeper.stop().await;
}
