//! Persister service entry point.

use std::sync::Arc;

use anyhow::Result;
use kafka_client::{GroupConsumer, KafkaProducer};
use metrics_exporter_prometheus::PrometheusBuilder;
use persister::PersistHandler;
use storage::PgMessageStore;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting persister service");

    let broker = common::config::BrokerConfig::from_env();
    let max_retries = common::config::db_max_retries();
    let metrics_port: u16 = common::config::env_or("METRICS_PORT", "9092").parse()?;

    info!("Configuration:");
    info!("  KAFKA_BROKERS: {}", broker.brokers);
    info!("  KAFKA_CONSUMER_GROUP: {}", broker.consumer_group);
    info!("  KAFKA_DLQ_TOPIC: {}", broker.dlq_topic);
    info!("  DB_MAX_RETRIES: {}", max_retries);

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;
    info!("Prometheus metrics server started on port {}", metrics_port);

    let pool = storage::connect(&common::config::database_url()).await?;
    info!("Connected to Postgres");

    let dlq = KafkaProducer::connect(&broker.brokers)?;
    let consumer = GroupConsumer::connect(
        &broker.brokers,
        &broker.consumer_group,
        common::config::CHAT_TOPIC,
    )?;
    info!("Connected to Kafka at {}", broker.brokers);

    let handler = PersistHandler::new(
        Arc::new(PgMessageStore::new(pool)),
        Arc::new(dlq),
        broker.dlq_topic,
        max_retries,
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        common::signal::shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    consumer.run(&handler, shutdown_rx).await?;

    info!("Persister stopped");
    Ok(())
}
