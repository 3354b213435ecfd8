use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use gts_core::repository::{CheckInRepository, IncidentRepository, RepoResult};
use gts_core::reservation::{CheckInEvent, Incident};

use crate::StoreError;

/// Append-only check-in and incident logs.
pub struct StoreActivityRepository {
    pool: PgPool,
}

impl StoreActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CheckInRow {
    id: Uuid,
    reservation_id: Uuid,
    location_id: Uuid,
    check_in_type: String,
    lat: f64,
    lng: f64,
    confidence: f64,
    ts: DateTime<Utc>,
}

impl TryFrom<CheckInRow> for CheckInEvent {
    type Error = StoreError;

    fn try_from(row: CheckInRow) -> Result<Self, Self::Error> {
        Ok(CheckInEvent {
            id: row.id,
            reservation_id: row.reservation_id,
            location_id: row.location_id,
            check_in_type: row
                .check_in_type
                .parse()
                .map_err(|e| StoreError::corrupt("check_in_events", e))?,
            lat: row.lat,
            lng: row.lng,
            confidence: row.confidence,
            ts: row.ts,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    reservation_id: Uuid,
    incident_type: String,
    notes: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        Ok(Incident {
            id: row.id,
            reservation_id: row.reservation_id,
            incident_type: row
                .incident_type
                .parse()
                .map_err(|e| StoreError::corrupt("incidents", e))?,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

pub(crate) async fn insert_check_in(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    event: &CheckInEvent,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO check_in_events (id, reservation_id, location_id, check_in_type, lat, lng, confidence, ts)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(event.id)
    .bind(event.reservation_id)
    .bind(event.location_id)
    .bind(event.check_in_type.as_str())
    .bind(event.lat)
    .bind(event.lng)
    .bind(event.confidence)
    .bind(event.ts)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn insert_incident(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    incident: &Incident,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO incidents (id, reservation_id, incident_type, notes, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(incident.id)
    .bind(incident.reservation_id)
    .bind(incident.incident_type.as_str())
    .bind(&incident.notes)
    .bind(&incident.created_by)
    .bind(incident.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn collect<R, T>(rows: Vec<R>) -> RepoResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(T::try_from(row)?);
    }
    Ok(out)
}

#[async_trait]
impl CheckInRepository for StoreActivityRepository {
    async fn list_check_ins(&self, reservation_id: Uuid) -> RepoResult<Vec<CheckInEvent>> {
        let rows: Vec<CheckInRow> = sqlx::query_as(
            "SELECT id, reservation_id, location_id, check_in_type, lat, lng, confidence, ts \
             FROM check_in_events WHERE reservation_id = $1 ORDER BY ts ASC",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }
}

#[async_trait]
impl IncidentRepository for StoreActivityRepository {
    async fn append_incident(&self, incident: &Incident) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_incident(&mut tx, incident).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_incidents(&self, reservation_id: Uuid) -> RepoResult<Vec<Incident>> {
        let rows: Vec<IncidentRow> = sqlx::query_as(
            "SELECT id, reservation_id, incident_type, notes, created_by, created_at \
             FROM incidents WHERE reservation_id = $1 ORDER BY created_at DESC",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn list_recent_incidents(&self, limit: usize) -> RepoResult<Vec<Incident>> {
        let rows: Vec<IncidentRow> = sqlx::query_as(
            "SELECT id, reservation_id, incident_type, notes, created_by, created_at \
             FROM incidents ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }
}
