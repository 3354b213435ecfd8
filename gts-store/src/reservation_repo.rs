use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use gts_core::repository::{HistoryEntry, RepoResult, ReservationFilter, ReservationRepository};
use gts_core::reservation::{Reservation, ReservationStatus};

use crate::activity_repo::{insert_check_in, insert_incident};
use crate::StoreError;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESERVATION_COLUMNS: &str = "id, driver_id, corridor_id, start_eta, arrival_window_start, arrival_window_end, \
     primary_location_id, backup_location_id, emergency_location_id, capacity_date, status, confirmation_code, \
     hours_remaining, created_at, updated_at, version";

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    driver_id: String,
    corridor_id: Uuid,
    start_eta: DateTime<Utc>,
    arrival_window_start: DateTime<Utc>,
    arrival_window_end: DateTime<Utc>,
    primary_location_id: Uuid,
    backup_location_id: Uuid,
    emergency_location_id: Uuid,
    capacity_date: NaiveDate,
    status: String,
    confirmation_code: String,
    hours_remaining: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    // The status field only changes through the state machine, so rows are
    // rebuilt through serde rather than a struct literal.
    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status: ReservationStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::corrupt("reservations", e))?;

        serde_json::from_value(json!({
            "id": row.id,
            "driver_id": row.driver_id,
            "corridor_id": row.corridor_id,
            "start_eta": row.start_eta,
            "arrival_window_start": row.arrival_window_start,
            "arrival_window_end": row.arrival_window_end,
            "primary_location_id": row.primary_location_id,
            "backup_location_id": row.backup_location_id,
            "emergency_location_id": row.emergency_location_id,
            "capacity_date": row.capacity_date,
            "status": status,
            "confirmation_code": row.confirmation_code,
            "hours_remaining": row.hours_remaining,
            "created_at": row.created_at,
            "updated_at": row.updated_at,
            "version": row.version,
        }))
        .map_err(|e| StoreError::corrupt("reservations", e))
    }
}

fn into_reservations(rows: Vec<ReservationRow>) -> RepoResult<Vec<Reservation>> {
    let mut reservations = Vec::with_capacity(rows.len());
    for row in rows {
        reservations.push(Reservation::try_from(row)?);
    }
    Ok(reservations)
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn insert_reservation(&self, reservation: &Reservation) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reservations (
                id, driver_id, corridor_id, start_eta, arrival_window_start, arrival_window_end,
                primary_location_id, backup_location_id, emergency_location_id, capacity_date, status,
                confirmation_code, hours_remaining, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (confirmation_code) DO NOTHING
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.driver_id)
        .bind(reservation.corridor_id)
        .bind(reservation.start_eta)
        .bind(reservation.arrival_window_start)
        .bind(reservation.arrival_window_end)
        .bind(reservation.primary_location_id)
        .bind(reservation.backup_location_id)
        .bind(reservation.emergency_location_id)
        .bind(reservation.capacity_date)
        .bind(reservation.status().as_str())
        .bind(&reservation.confirmation_code)
        .bind(reservation.hours_remaining)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .bind(reservation.version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations WHERE id = $1", RESERVATION_COLUMNS);
        let row: Option<ReservationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Reservation::try_from).transpose()?)
    }

    async fn get_reservation_by_code(&self, code: &str) -> RepoResult<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations WHERE confirmation_code = $1", RESERVATION_COLUMNS);
        let row: Option<ReservationRow> = sqlx::query_as(&sql).bind(code).fetch_optional(&self.pool).await?;
        Ok(row.map(Reservation::try_from).transpose()?)
    }

    async fn list_driver_reservations(&self, driver_id: &str) -> RepoResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE driver_id = $1 ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        );
        let rows: Vec<ReservationRow> = sqlx::query_as(&sql).bind(driver_id).fetch_all(&self.pool).await?;
        into_reservations(rows)
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> RepoResult<Vec<Reservation>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM reservations WHERE 1 = 1", RESERVATION_COLUMNS));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(corridor_id) = filter.corridor_id {
            builder.push(" AND corridor_id = ").push_bind(corridor_id);
        }
        if let Some(location_id) = filter.location_id {
            builder.push(" AND primary_location_id = ").push_bind(location_id);
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit as i64);

        let rows: Vec<ReservationRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        into_reservations(rows)
    }

    async fn list_location_reservations(
        &self,
        location_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations \
             WHERE primary_location_id = $1 \
               AND arrival_window_start >= $2 AND arrival_window_start <= $3 \
               AND status NOT IN ('CANCELED', 'FAILED') \
             ORDER BY arrival_window_start ASC",
            RESERVATION_COLUMNS
        );
        let rows: Vec<ReservationRow> = sqlx::query_as(&sql)
            .bind(location_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        into_reservations(rows)
    }

    async fn update_reservation(
        &self,
        reservation: &Reservation,
        expected_version: i64,
        entry: Option<&HistoryEntry>,
    ) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET arrival_window_start = $2,
                arrival_window_end = $3,
                primary_location_id = $4,
                capacity_date = $5,
                status = $6,
                hours_remaining = $7,
                updated_at = $8,
                version = $9
            WHERE id = $1 AND version = $10
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.arrival_window_start)
        .bind(reservation.arrival_window_end)
        .bind(reservation.primary_location_id)
        .bind(reservation.capacity_date)
        .bind(reservation.status().as_str())
        .bind(reservation.hours_remaining)
        .bind(reservation.updated_at)
        .bind(reservation.version)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        match entry {
            Some(HistoryEntry::CheckIn(event)) => insert_check_in(&mut tx, event).await?,
            Some(HistoryEntry::Incident(incident)) => insert_incident(&mut tx, incident).await?,
            None => {}
        }

        tx.commit().await?;
        Ok(true)
    }
}
