//! ViewStore: read-only access to the civic graph views in Postgres.
//!
//! Every query is wrapped in `to_jsonb` so a row arrives as one JSON object.
//! Columns the row types don't name survive in their `extra`/`fields` maps.

use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::debug;

use civicgraph_common::{
    BridgeRow, CityLocationRow, CityRow, Config, EntityRow, LocationRow, OperationRow,
};

use crate::error::{StoreError, StoreResult};
use crate::source::{BridgeFilter, GraphSource, View};

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

const TOP_ENTITIES_SQL: &str = r#"
    SELECT to_jsonb(t) AS row
    FROM (
        (SELECT * FROM entities_view WHERE render = 1
         ORDER BY employees DESC NULLS LAST LIMIT $1)
        UNION
        (SELECT * FROM entities_view WHERE render = 1
         ORDER BY followers DESC NULLS LAST LIMIT $1)
    ) t
    ORDER BY t.name
"#;

const OTHER_ENTITIES_SQL: &str = r#"
    SELECT to_jsonb(t) AS row
    FROM (
        SELECT id, name, nickname, followers, employees, entity_type
        FROM entities_view
        WHERE render = 1 AND id <> ALL($1::bigint[])
    ) t
    ORDER BY t.name
"#;

const BRIDGES_SQL: &str = r#"
    SELECT to_jsonb(t) AS row
    FROM (
        SELECT * FROM bridges_view
        WHERE render = 1
          AND ($1::text IS NULL OR connection = $1)
          AND ($2::bigint[] IS NULL OR (entity_1_id = ANY($2) AND entity_2_id = ANY($2)))
    ) t
"#;

const OPERATIONS_SQL: &str = "SELECT to_jsonb(t) AS row FROM operations_view t";

const ENTITY_LOCATIONS_SQL: &str = "SELECT to_jsonb(t) AS row FROM locations_with_city t";

const LOCATIONS_SQL: &str = "SELECT to_jsonb(t) AS row FROM locations_view t";

const CITIES_SQL: &str = "SELECT to_jsonb(t) AS row FROM cities_view t";

const CITY_LOCATIONS_SQL: &str = r#"
    SELECT to_jsonb(t) AS row
    FROM (
        SELECT DISTINCT l.entity_id AS entity, l.address, l.address_lat, l.address_long,
               c.city_name, c.state_name, c.state_code, c.country_name, c.country_code,
               c.city_lat, c.city_long
        FROM locations_view l
        LEFT JOIN cities_view c ON l.city_id = c.id
    ) t
    ORDER BY t.entity
"#;

// ---------------------------------------------------------------------------
// ViewStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ViewStore {
    pool: PgPool,
}

impl ViewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool. Acquiring a connection fails with
    /// `sqlx::Error::PoolTimedOut` after `acquire_timeout`, and every
    /// connection carries the configured `statement_timeout`.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let statement_timeout_ms = config.statement_timeout.as_millis();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(format!("SET statement_timeout = {statement_timeout_ms}").as_str())
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await?;

        debug!(
            max_connections = config.max_connections,
            statement_timeout_ms = statement_timeout_ms as u64,
            "Connected to database"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GraphSource for ViewStore {
    async fn top_entities(&self, limit: i64) -> StoreResult<Vec<EntityRow>> {
        let start = Instant::now();
        let rows = sqlx::query_scalar::<_, serde_json::Value>(TOP_ENTITIES_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        decode(View::Entities, rows, start)
    }

    async fn entities_excluding(&self, exclude: &[i64]) -> StoreResult<Vec<EntityRow>> {
        let start = Instant::now();
        let rows = sqlx::query_scalar::<_, serde_json::Value>(OTHER_ENTITIES_SQL)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;
        decode(View::Entities, rows, start)
    }

    async fn bridges(&self, filter: &BridgeFilter) -> StoreResult<Vec<BridgeRow>> {
        let start = Instant::now();
        let rows = sqlx::query_scalar::<_, serde_json::Value>(BRIDGES_SQL)
            .bind(filter.connection.map(|c| c.as_str()))
            .bind(filter.endpoints.as_deref())
            .fetch_all(&self.pool)
            .await?;
        decode(View::Bridges, rows, start)
    }

    async fn operations(&self) -> StoreResult<Vec<OperationRow>> {
        self.fetch(View::Operations, OPERATIONS_SQL).await
    }

    async fn entity_locations(&self) -> StoreResult<Vec<LocationRow>> {
        self.fetch(View::LocationsWithCity, ENTITY_LOCATIONS_SQL).await
    }

    async fn locations(&self) -> StoreResult<Vec<LocationRow>> {
        self.fetch(View::Locations, LOCATIONS_SQL).await
    }

    async fn cities(&self) -> StoreResult<Vec<CityRow>> {
        self.fetch(View::Cities, CITIES_SQL).await
    }

    async fn city_locations(&self) -> StoreResult<Vec<CityLocationRow>> {
        self.fetch(View::Locations, CITY_LOCATIONS_SQL).await
    }
}

impl ViewStore {
    /// Run a parameterless query and decode every row.
    async fn fetch<T: DeserializeOwned>(&self, view: View, sql: &str) -> StoreResult<Vec<T>> {
        let start = Instant::now();
        let rows = sqlx::query_scalar::<_, serde_json::Value>(sql)
            .fetch_all(&self.pool)
            .await?;
        decode(view, rows, start)
    }
}

fn decode<T: DeserializeOwned>(
    view: View,
    rows: Vec<serde_json::Value>,
    start: Instant,
) -> StoreResult<Vec<T>> {
    let count = rows.len();
    let decoded = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| StoreError::Decode {
            view: view.name(),
            source,
        })?;

    debug!(
        view = view.name(),
        rows = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Fetched rows"
    );

    Ok(decoded)
}
