//! GraphReader: composes view reads into vertex, edge and store payloads.
//!
//! Stages that depend on an earlier result (the "other" entities exclude the
//! top set, edges are scoped to the vertex ids) are awaited in order. Reads
//! with no dependency between them are joined. The first failing read fails
//! the whole call.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info};

use civicgraph_common::{EdgeKind, EntityRow, TOP_ENTITY_LIMIT};
use civicgraph_store::{BridgeFilter, GraphSource, StoreResult};

use crate::edge::{group_edges, process_edges};
use crate::payload::{
    CityIndex, CityLocations, EdgeList, GraphStore, GroupedEdges, LocationIndex, VertexList,
};
use crate::search::SearchIndex;
use crate::vertex::{process_vertices, VertexMap};

/// Read-only composer over any [`GraphSource`]. Holds no state between calls.
pub struct GraphReader<S> {
    source: S,
    top_limit: i64,
}

impl<S: GraphSource> GraphReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            top_limit: TOP_ENTITY_LIMIT,
        }
    }

    /// Override how many entities each ranking contributes to the top set.
    pub fn with_top_limit(mut self, limit: i64) -> Self {
        self.top_limit = limit;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // --- Vertices ---

    /// The curated top set, fully loaded.
    pub async fn top_entities(&self) -> StoreResult<VertexList> {
        let top = self.fetch_top().await?;
        let vertices = self.fold(top).await?;
        Ok(VertexList {
            vertices: vertices.into_vec(),
        })
    }

    /// Render-eligible stubs outside `exclude`.
    pub async fn other_entities(&self, exclude: &[i64]) -> StoreResult<VertexList> {
        let others = self.fetch_others(exclude).await?;
        let vertices = self.fold(others).await?;
        Ok(VertexList {
            vertices: vertices.into_vec(),
        })
    }

    /// Top entities followed by every other render-eligible entity.
    pub async fn vertices(&self) -> StoreResult<VertexList> {
        let vertices = self.load_vertices().await?;
        Ok(VertexList {
            vertices: vertices.into_vec(),
        })
    }

    async fn load_vertices(&self) -> StoreResult<VertexMap> {
        let mut entities = self.fetch_top().await?;
        let top_ids: Vec<i64> = entities.iter().map(|e| e.id).collect();
        entities.extend(self.fetch_others(&top_ids).await?);
        self.fold(entities).await
    }

    async fn fetch_top(&self) -> StoreResult<Vec<EntityRow>> {
        let mut rows = self.source.top_entities(self.top_limit).await?;
        for row in &mut rows {
            row.loaded = true;
        }
        Ok(rows)
    }

    async fn fetch_others(&self, exclude: &[i64]) -> StoreResult<Vec<EntityRow>> {
        let mut rows = self.source.entities_excluding(exclude).await?;
        for row in &mut rows {
            row.loaded = false;
        }
        Ok(rows)
    }

    /// Fetch bridges, operations and locations together, then fold.
    async fn fold(&self, entities: Vec<EntityRow>) -> StoreResult<VertexMap> {
        let start = Instant::now();
        let all_bridges = BridgeFilter::all();

        let (bridges, operations, locations) = tokio::try_join!(
            self.source.bridges(&all_bridges),
            self.source.operations(),
            self.source.entity_locations(),
        )?;

        let (vertices, stats) = process_vertices(entities, &bridges, &operations, locations);

        info!(
            vertices = vertices.len(),
            bridges = bridges.len(),
            operations = operations.len(),
            dropped = stats.dropped(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vertices folded"
        );

        Ok(vertices)
    }

    // --- Edges ---

    /// Render-eligible edges with both endpoints in `ids`, grouped by kind.
    pub async fn specified_edges(&self, ids: &[i64]) -> StoreResult<GroupedEdges> {
        let bridges = self.source.bridges(&BridgeFilter::between(ids)).await?;
        Ok(GroupedEdges {
            edges: group_edges(&bridges),
        })
    }

    /// Every render-eligible edge, grouped by kind.
    pub async fn all_edges(&self) -> StoreResult<GroupedEdges> {
        let bridges = self.source.bridges(&BridgeFilter::all()).await?;
        Ok(GroupedEdges {
            edges: group_edges(&bridges),
        })
    }

    /// Render-eligible edges of one kind.
    pub async fn edges(&self, kind: EdgeKind) -> StoreResult<EdgeList> {
        let bridges = self
            .source
            .bridges(&BridgeFilter::of(kind.connection()))
            .await?;
        debug!(kind = %kind, bridges = bridges.len(), "Projecting edges");
        Ok(EdgeList {
            edges: process_edges(&bridges, kind.with_financial_data()),
        })
    }

    // --- Locations ---

    pub async fn locations(&self) -> StoreResult<LocationIndex> {
        let rows = self.source.locations().await?;
        let mut locations = BTreeMap::new();
        for row in rows {
            match row.id {
                Some(id) => {
                    locations.insert(id, row);
                }
                None => debug!(entity_id = ?row.entity_id, "Location row without id"),
            }
        }
        Ok(LocationIndex { locations })
    }

    pub async fn cities(&self) -> StoreResult<CityIndex> {
        let rows = self.source.cities().await?;
        Ok(CityIndex {
            cities: rows.into_iter().map(|city| (city.id, city)).collect(),
        })
    }

    pub async fn city_locations(&self) -> StoreResult<CityLocations> {
        Ok(CityLocations {
            locations: self.source.city_locations().await?,
        })
    }

    // --- Store ---

    /// Vertices, then edges among them, then locations and cities.
    pub async fn store(&self) -> StoreResult<GraphStore> {
        let start = Instant::now();

        let vertices = self.load_vertices().await?;
        let ids = vertices.ids();
        let GroupedEdges { edges } = self.specified_edges(&ids).await?;
        let (locations, cities) = tokio::try_join!(self.locations(), self.cities())?;

        info!(
            vertices = vertices.len(),
            edges = edges.len(),
            locations = locations.locations.len(),
            cities = cities.cities.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Graph store assembled"
        );

        Ok(GraphStore {
            vertices,
            edges,
            locations: locations.locations,
            cities: cities.cities,
        })
    }

    /// Search over every vertex and the places they are located in.
    pub async fn search_index(&self) -> StoreResult<SearchIndex> {
        let vertices = self.load_vertices().await?;
        let rows = self.source.city_locations().await?;
        let index = SearchIndex::build(&vertices, &rows);
        debug!(keys = index.len(), "Search index built");
        Ok(index)
    }
}
