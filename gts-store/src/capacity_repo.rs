use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use gts_core::location::CapacityRecord;
use gts_core::repository::{CapacityRepository, RepoResult};

/// Capacity rows keyed by (location_id, date). Writes are conditional on the
/// row's `version` column so the ledger's commit loop works across processes.
pub struct StoreCapacityRepository {
    pool: PgPool,
}

impl StoreCapacityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CapacityRow {
    location_id: Uuid,
    date: NaiveDate,
    total_spots: i32,
    holdback_spots: i32,
    sold_spots: i32,
    version: i64,
}

impl From<CapacityRow> for CapacityRecord {
    fn from(row: CapacityRow) -> Self {
        CapacityRecord {
            location_id: row.location_id,
            date: row.date,
            total_spots: row.total_spots,
            holdback_spots: row.holdback_spots,
            sold_spots: row.sold_spots,
            version: row.version,
        }
    }
}

#[async_trait]
impl CapacityRepository for StoreCapacityRepository {
    async fn fetch_capacity(&self, location_id: Uuid, date: NaiveDate) -> RepoResult<Option<CapacityRecord>> {
        let row: Option<CapacityRow> = sqlx::query_as(
            "SELECT location_id, date, total_spots, holdback_spots, sold_spots, version \
             FROM location_capacity WHERE location_id = $1 AND date = $2",
        )
        .bind(location_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CapacityRecord::from))
    }

    async fn insert_capacity(&self, record: &CapacityRecord) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO location_capacity (location_id, date, total_spots, holdback_spots, sold_spots, version)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (location_id, date) DO NOTHING
            "#,
        )
        .bind(record.location_id)
        .bind(record.date)
        .bind(record.total_spots)
        .bind(record.holdback_spots)
        .bind(record.sold_spots)
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_capacity(&self, record: &CapacityRecord, expected_version: i64) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE location_capacity
            SET total_spots = $3, holdback_spots = $4, sold_spots = $5, version = $6, updated_at = NOW()
            WHERE location_id = $1 AND date = $2 AND version = $7
            "#,
        )
        .bind(record.location_id)
        .bind(record.date)
        .bind(record.total_spots)
        .bind(record.holdback_spots)
        .bind(record.sold_spots)
        .bind(record.version)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
