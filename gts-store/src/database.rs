use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use gts_core::repository::Repositories;

use crate::activity_repo::StoreActivityRepository;
use crate::capacity_repo::StoreCapacityRepository;
use crate::location_repo::StoreLocationRepository;
use crate::reservation_repo::StoreReservationRepository;
use crate::StoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Postgres-backed implementations of every data-access trait, sharing this pool.
    pub fn repositories(&self) -> Repositories {
        let activity = Arc::new(StoreActivityRepository::new(self.pool.clone()));
        Repositories {
            locations: Arc::new(StoreLocationRepository::new(self.pool.clone())),
            capacity: Arc::new(StoreCapacityRepository::new(self.pool.clone())),
            reservations: Arc::new(StoreReservationRepository::new(self.pool.clone())),
            check_ins: activity.clone(),
            incidents: activity,
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
