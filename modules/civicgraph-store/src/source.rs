//! The query contract shared by the Postgres store and the in-memory source.

use std::sync::Arc;

use async_trait::async_trait;
use civicgraph_common::{BridgeRow, CityLocationRow, CityRow, Connection, EntityRow, LocationRow, OperationRow};

use crate::error::StoreResult;

/// The relational views this layer reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Entities,
    Bridges,
    Operations,
    Locations,
    LocationsWithCity,
    Cities,
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Entities => "entities_view",
            View::Bridges => "bridges_view",
            View::Operations => "operations_view",
            View::Locations => "locations_view",
            View::LocationsWithCity => "locations_with_city",
            View::Cities => "cities_view",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which bridges to read. `render = 1` is always implied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeFilter {
    pub connection: Option<Connection>,
    /// When set, both endpoints must be in this set.
    pub endpoints: Option<Vec<i64>>,
}

impl BridgeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of(connection: Connection) -> Self {
        Self {
            connection: Some(connection),
            endpoints: None,
        }
    }

    pub fn between(ids: impl Into<Vec<i64>>) -> Self {
        Self {
            connection: None,
            endpoints: Some(ids.into()),
        }
    }

    pub fn matches(&self, bridge: &BridgeRow) -> bool {
        if !bridge.render {
            return false;
        }
        if let Some(connection) = self.connection {
            if bridge.connection != connection.as_str() {
                return false;
            }
        }
        match &self.endpoints {
            Some(ids) => ids.contains(&bridge.entity_1_id) && ids.contains(&bridge.entity_2_id),
            None => true,
        }
    }
}

/// Read access to the civic graph views.
///
/// Implemented by `ViewStore` (Postgres) and `MemorySource` (tests, pre-fetched rows).
/// Also implemented for `Arc<S>` so one source can back several readers.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Union of the `limit` largest entities by employees and by followers,
    /// render-eligible only, deduplicated and ordered by name.
    async fn top_entities(&self, limit: i64) -> StoreResult<Vec<EntityRow>>;

    /// Render-eligible entities outside `exclude`, projected to
    /// `id, name, nickname, followers, employees, entity_type`.
    async fn entities_excluding(&self, exclude: &[i64]) -> StoreResult<Vec<EntityRow>>;

    async fn bridges(&self, filter: &BridgeFilter) -> StoreResult<Vec<BridgeRow>>;

    async fn operations(&self) -> StoreResult<Vec<OperationRow>>;

    /// Rows of `locations_with_city`, still carrying `entity_id`.
    async fn entity_locations(&self) -> StoreResult<Vec<LocationRow>>;

    /// Rows of `locations_view`.
    async fn locations(&self) -> StoreResult<Vec<LocationRow>>;

    async fn cities(&self) -> StoreResult<Vec<CityRow>>;

    /// Distinct locations left-joined with their city, ordered by owning entity.
    async fn city_locations(&self) -> StoreResult<Vec<CityLocationRow>>;
}

#[async_trait]
impl<S: GraphSource + ?Sized> GraphSource for Arc<S> {
    async fn top_entities(&self, limit: i64) -> StoreResult<Vec<EntityRow>> {
        (**self).top_entities(limit).await
    }

    async fn entities_excluding(&self, exclude: &[i64]) -> StoreResult<Vec<EntityRow>> {
        (**self).entities_excluding(exclude).await
    }

    async fn bridges(&self, filter: &BridgeFilter) -> StoreResult<Vec<BridgeRow>> {
        (**self).bridges(filter).await
    }

    async fn operations(&self) -> StoreResult<Vec<OperationRow>> {
        (**self).operations().await
    }

    async fn entity_locations(&self) -> StoreResult<Vec<LocationRow>> {
        (**self).entity_locations().await
    }

    async fn locations(&self) -> StoreResult<Vec<LocationRow>> {
        (**self).locations().await
    }

    async fn cities(&self) -> StoreResult<Vec<CityRow>> {
        (**self).cities().await
    }

    async fn city_locations(&self) -> StoreResult<Vec<CityLocationRow>> {
        (**self).city_locations().await
    }
}
