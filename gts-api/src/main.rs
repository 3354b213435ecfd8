use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use gts_api::{app, AppState, AuthConfig};
use gts_core::notification::LogNotifier;
use gts_core::InMemoryStore;
use gts_core::Repositories;
use gts_store::app_config::Config;
use gts_store::{DbClient, EventProducer, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gts_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting GTS API on port {}", config.server.port);

    // Postgres, or the in-process store for local runs
    let repos = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url).await.context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await?;
            }
            db.repositories()
        }
        None => {
            tracing::warn!("No database configured, using the in-memory store");
            Repositories::from_store(Arc::new(InMemoryStore::new()))
        }
    };

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };

    let mut state = AppState::new(
        repos,
        &config.engine,
        auth,
        config.server.feed_capacity,
        Arc::new(LogNotifier::new()),
    )?;

    if let Some(url) = &config.redis.url {
        let redis = RedisClient::new(url).await.context("Failed to connect to Redis")?;
        state = state.with_redis(Arc::new(redis), config.rate_limit.clone());
    } else {
        tracing::warn!("No Redis configured, rate limiting disabled");
    }

    if let Some(brokers) = &config.kafka.brokers {
        let producer = EventProducer::new(brokers).context("Failed to create Kafka producer")?;
        state = state.with_kafka(Arc::new(producer));
    }

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
