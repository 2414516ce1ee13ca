//! Graph shaping for the civic graph: vertices with their relationship
//! sequences, typed edges, and full-store snapshots.

pub mod edge;
pub mod payload;
pub mod reader;
pub mod search;
pub mod vertex;

pub use edge::{group_edges, process_edges, Edge, EdgeFinancials, EdgeGroups};
pub use payload::{
    CityIndex, CityLocations, EdgeList, GraphStore, GroupedEdges, LocationIndex, VertexList,
};
pub use reader::GraphReader;
pub use search::SearchIndex;
pub use vertex::{process_vertices, FoldStats, Vertex, VertexMap};
