use std::sync::Arc;
use tokio::sync::broadcast;

use gts_core::hos::StaticHosProvider;
use gts_core::notification::NotificationSender;
use gts_core::repository::Repositories;
use gts_core::settings::EngineSettings;
use gts_reservation::{CheckInService, LocationService, ReservationManager};
use gts_shared::events::OpsFeedEvent;
use gts_store::app_config::RateLimitConfig;
use gts_store::{EventProducer, RedisClient};

use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ReservationManager>,
    pub check_in: Arc<CheckInService>,
    pub locations: Arc<LocationService>,
    pub hos: Arc<StaticHosProvider>,
    pub redis: Option<Arc<RedisClient>>,
    pub kafka: Option<Arc<EventProducer>>,
    pub feed_tx: broadcast::Sender<OpsFeedEvent>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    /// Wire the engine services over one set of repositories. Redis and Kafka
    /// are attached afterwards when configured.
    pub fn new(
        repos: Repositories,
        settings: &EngineSettings,
        auth: AuthConfig,
        feed_capacity: usize,
        notifier: Arc<dyn NotificationSender>,
    ) -> anyhow::Result<Self> {
        let hos = Arc::new(StaticHosProvider::new(settings.hos.default_hours_remaining));
        let manager = ReservationManager::new(repos.clone(), settings)
            .with_hos(hos.clone())
            .with_notifier(notifier);
        let locations = LocationService::new(repos.clone(), manager.ledger().clone());
        let check_in = CheckInService::new(repos, &settings.geofence);
        let (feed_tx, _) = broadcast::channel(feed_capacity.max(1));

        Ok(Self {
            manager: Arc::new(manager),
            check_in: Arc::new(check_in),
            locations: Arc::new(locations),
            hos,
            redis: None,
            kafka: None,
            feed_tx,
            auth,
            rate_limit: RateLimitConfig::default(),
            metrics: Arc::new(ApiMetrics::new()?),
        })
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_kafka(mut self, kafka: Arc<EventProducer>) -> Self {
        self.kafka = Some(kafka);
        self
    }

    /// Fan an event out to live-feed subscribers and, when configured, Kafka.
    /// Delivery problems are logged; the request that caused the event has
    /// already committed.
    pub async fn publish(&self, event: OpsFeedEvent) {
        self.metrics.feed_events.with_label_values(&[event.kind()]).inc();

        if let Some(kafka) = &self.kafka {
            if let Err(e) = kafka.publish_event(&event).await {
                tracing::warn!("Failed to publish {} event to Kafka: {}", event.kind(), e);
            }
        }

        // No subscribers is not an error
        let _ = self.feed_tx.send(event);
    }
}
