//! Gateway service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use gateway::fanout::FanoutHandler;
use gateway::hub::Hub;
use gateway::token::JwtVerifier;
use gateway::ws_server::{create_router, AppState};
use kafka_client::{KafkaProducer, TailConsumer};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting gateway service");

    let broker = common::config::BrokerConfig::from_env();
    let port = common::config::gateway_port();
    let metrics_port: u16 = common::config::env_or("METRICS_PORT", "9091").parse()?;
    let instance_id = Uuid::new_v4().to_string();

    info!("Configuration:");
    info!("  KAFKA_BROKERS: {}", broker.brokers);
    info!("  GATEWAY_PORT: {}", port);
    info!("  METRICS_PORT: {}", metrics_port);
    info!("  instance id: {}", instance_id);

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;
    info!("Prometheus metrics server started on port {}", metrics_port);

    let producer = KafkaProducer::connect(&broker.brokers)?;
    let consumer = TailConsumer::connect(&broker.brokers, common::config::CHAT_TOPIC, &instance_id)?;
    info!("Connected to Kafka at {}", broker.brokers);

    let hub = Hub::spawn();

    // Fan-out consumer: replays peer-gateway records into the local hub.
    let (fanout_shutdown_tx, fanout_shutdown_rx) = mpsc::channel(1);
    let fanout = FanoutHandler::new(hub.clone(), instance_id.clone());
    let fanout_handle = tokio::spawn(async move {
        if let Err(e) = consumer.run(&fanout, fanout_shutdown_rx).await {
            error!("Fan-out consumer error: {:?}", e);
        }
    });

    let state = Arc::new(AppState {
        hub,
        publisher: Arc::new(producer),
        verifier: Arc::new(JwtVerifier::new(&common::config::jwt_secret())),
        instance_id,
    });

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(common::signal::shutdown_signal())
        .await?;

    info!("Shutting down fan-out consumer...");
    let _ = fanout_shutdown_tx.send(()).await;
    let _ = fanout_handle.await;

    info!("Gateway stopped");
    Ok(())
}
