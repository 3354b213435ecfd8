use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use gts_core::location::{Corridor, Location};
use gts_core::repository::{LocationRepository, RepoResult};

pub struct StoreLocationRepository {
    pool: PgPool,
}

impl StoreLocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CorridorRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    address: String,
    lat: f64,
    lng: f64,
    corridor_id: Uuid,
    order_in_corridor: i32,
    admin_id: Option<String>,
    timezone: String,
    reliability_score: f64,
}

impl From<CorridorRow> for Corridor {
    fn from(row: CorridorRow) -> Self {
        Corridor {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            name: row.name,
            address: row.address,
            lat: row.lat,
            lng: row.lng,
            corridor_id: row.corridor_id,
            order_in_corridor: row.order_in_corridor,
            admin_id: row.admin_id,
            timezone: row.timezone,
            reliability_score: row.reliability_score,
        }
    }
}

const LOCATION_COLUMNS: &str =
    "id, name, address, lat, lng, corridor_id, order_in_corridor, admin_id, timezone, reliability_score";

#[async_trait]
impl LocationRepository for StoreLocationRepository {
    async fn list_corridors(&self) -> RepoResult<Vec<Corridor>> {
        let rows: Vec<CorridorRow> = sqlx::query_as("SELECT id, name, description FROM corridors ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Corridor::from).collect())
    }

    async fn get_corridor(&self, id: Uuid) -> RepoResult<Option<Corridor>> {
        let row: Option<CorridorRow> = sqlx::query_as("SELECT id, name, description FROM corridors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Corridor::from))
    }

    async fn list_corridor_locations(&self, corridor_id: Uuid) -> RepoResult<Vec<Location>> {
        let sql = format!(
            "SELECT {} FROM locations WHERE corridor_id = $1 ORDER BY order_in_corridor ASC",
            LOCATION_COLUMNS
        );
        let rows: Vec<LocationRow> = sqlx::query_as(&sql).bind(corridor_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn get_location(&self, id: Uuid) -> RepoResult<Option<Location>> {
        let sql = format!("SELECT {} FROM locations WHERE id = $1", LOCATION_COLUMNS);
        let row: Option<LocationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Location::from))
    }

    async fn list_admin_locations(&self, admin_id: &str) -> RepoResult<Vec<Location>> {
        let sql = format!(
            "SELECT {} FROM locations WHERE admin_id = $1 ORDER BY corridor_id, order_in_corridor",
            LOCATION_COLUMNS
        );
        let rows: Vec<LocationRow> = sqlx::query_as(&sql).bind(admin_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }
}
