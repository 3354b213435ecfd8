pub mod activity_repo;
pub mod app_config;
pub mod capacity_repo;
pub mod database;
pub mod error;
pub mod events;
pub mod location_repo;
pub mod redis_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use error::StoreError;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
