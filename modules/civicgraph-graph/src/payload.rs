//! The shapes handed to the presentation layer.

use std::collections::BTreeMap;

use serde::Serialize;

use civicgraph_common::{CityLocationRow, CityRow, LocationRow};

use crate::edge::{Edge, EdgeGroups};
use crate::vertex::{Vertex, VertexMap};

/// `{ vertices: [...] }`, in fold order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexList {
    pub vertices: Vec<Vertex>,
}

/// `{ edges: { funding, investment, collaboration, data } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEdges {
    pub edges: EdgeGroups,
}

/// `{ edges: [...] }` for a single edge kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeList {
    pub edges: Vec<Edge>,
}

/// `{ locations: { id: row } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationIndex {
    pub locations: BTreeMap<i64, LocationRow>,
}

/// `{ cities: { id: row } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityIndex {
    pub cities: BTreeMap<i64, CityRow>,
}

/// `{ locations: [...] }`, ordered by owning entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityLocations {
    pub locations: Vec<CityLocationRow>,
}

/// A full snapshot of the graph for the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStore {
    pub vertices: VertexMap,
    pub edges: EdgeGroups,
    pub locations: BTreeMap<i64, LocationRow>,
    pub cities: BTreeMap<i64, CityRow>,
}
