//! Folding entity, bridge, operation and location rows into vertices.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info};

use civicgraph_common::{
    BridgeRow, Connection, EntityRow, Finance, LocationRow, OperationRow, VertexLocation,
};

// --- Relationship entries ---

/// A non-financial relationship: collaboration, data or employment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub entity_id: i64,
    pub entity: String,
}

/// A funding or investment relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialLink {
    pub entity_id: i64,
    pub entity: String,
    pub amount: Option<f64>,
    pub year: Option<i32>,
}

/// One revenue or expense figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    pub amount: Option<f64>,
    pub year: Option<i32>,
}

/// The vertex sequence a bridge lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Funding,
    Investments,
    Collaborations,
    Data,
    Employment,
}

impl Relation {
    /// Both directions of a funding or investment bridge land in the same sequence.
    pub fn of(connection: Connection) -> Self {
        match connection {
            Connection::FundingReceived | Connection::FundingGiven => Relation::Funding,
            Connection::InvestmentReceived | Connection::InvestmentMade => Relation::Investments,
            Connection::Collaboration => Relation::Collaborations,
            Connection::Data => Relation::Data,
            Connection::Employment => Relation::Employment,
        }
    }

    pub fn carries_financials(&self) -> bool {
        matches!(self, Relation::Funding | Relation::Investments)
    }
}

// --- Vertex ---

/// An entity with its relationship sequences, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vertex {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employees: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_people: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<bool>,
    /// `true` for the curated top set, `false` for stubs.
    pub loaded: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    pub collaborations: Vec<Link>,
    pub data: Vec<Link>,
    pub employment: Vec<Link>,
    pub expenses: Vec<Ledger>,
    pub funding: Vec<FinancialLink>,
    pub investments: Vec<FinancialLink>,
    pub locations: Vec<VertexLocation>,
    pub revenue: Vec<Ledger>,
}

impl From<EntityRow> for Vertex {
    fn from(row: EntityRow) -> Self {
        let key_people = row.key_people_list();
        Self {
            id: row.id,
            name: row.name,
            nickname: row.nickname,
            entity_type: row.entity_type,
            followers: row.followers,
            employees: row.employees,
            key_people,
            render: row.render,
            loaded: row.loaded,
            extra: row.extra,
            collaborations: Vec::new(),
            data: Vec::new(),
            employment: Vec::new(),
            expenses: Vec::new(),
            funding: Vec::new(),
            investments: Vec::new(),
            locations: Vec::new(),
            revenue: Vec::new(),
        }
    }
}

impl Vertex {
    fn attach(&mut self, relation: Relation, counterparty: String, bridge: &BridgeRow) {
        let entity_id = bridge.entity_2_id;

        if relation.carries_financials() {
            let link = FinancialLink {
                entity_id,
                entity: counterparty,
                amount: bridge.amount,
                year: bridge.year,
            };
            match relation {
                Relation::Investments => self.investments.push(link),
                _ => self.funding.push(link),
            }
            return;
        }

        let link = Link {
            entity_id,
            entity: counterparty,
        };
        match relation {
            Relation::Data => self.data.push(link),
            Relation::Employment => self.employment.push(link),
            _ => self.collaborations.push(link),
        }
    }

    fn record(&mut self, finance: Finance, operation: &OperationRow) {
        let entry = Ledger {
            amount: operation.amount,
            year: operation.year,
        };
        match finance {
            Finance::Revenue => self.revenue.push(entry),
            Finance::Expenses => self.expenses.push(entry),
        }
    }
}

// --- VertexMap ---

/// Vertices keyed by entity id, iterated in insertion order.
/// Serializes as a JSON object `{"<id>": vertex, ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexMap {
    vertices: Vec<Vertex>,
    by_id: HashMap<i64, usize>,
}

impl VertexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex. A repeated id replaces the earlier vertex in place.
    pub fn insert(&mut self, vertex: Vertex) {
        match self.by_id.get(&vertex.id) {
            Some(&idx) => self.vertices[idx] = vertex,
            None => {
                self.by_id.insert(vertex.id, self.vertices.len());
                self.vertices.push(vertex);
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<&Vertex> {
        self.by_id.get(&id).map(|&idx| &self.vertices[idx])
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut Vertex> {
        self.by_id.get(&id).map(|&idx| &mut self.vertices[idx])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.vertices.iter().map(|v| v.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn into_vec(self) -> Vec<Vertex> {
        self.vertices
    }
}

impl Serialize for VertexMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.vertices.len()))?;
        for vertex in &self.vertices {
            map.serialize_entry(&vertex.id.to_string(), vertex)?;
        }
        map.end()
    }
}

// --- Fold ---

/// Rows the fold dropped. Never an error: the views may reference
/// entities outside the vertex set being folded against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Bridges whose owner or counterparty is not a vertex.
    pub bridges_skipped: usize,
    pub unknown_connections: usize,
    pub operations_skipped: usize,
    pub unknown_finance: usize,
    pub locations_skipped: usize,
}

impl FoldStats {
    pub fn dropped(&self) -> usize {
        self.bridges_skipped
            + self.unknown_connections
            + self.operations_skipped
            + self.unknown_finance
            + self.locations_skipped
    }
}

/// Build the vertex mapping from raw view rows.
///
/// Entities are inserted in input order. Bridges append to the owner's
/// (`entity_1_id`) relationship sequences, operations to revenue or expenses,
/// locations (minus `entity_id`) to `locations`. Rows that reference an
/// unknown entity or carry an unknown connection/finance value are skipped
/// and counted in the returned [`FoldStats`].
pub fn process_vertices(
    entities: Vec<EntityRow>,
    bridges: &[BridgeRow],
    operations: &[OperationRow],
    locations: Vec<LocationRow>,
) -> (VertexMap, FoldStats) {
    let mut out = VertexMap::new();
    let mut stats = FoldStats::default();

    for entity in entities {
        out.insert(Vertex::from(entity));
    }

    for bridge in bridges {
        let Some(connection) = bridge.connection() else {
            stats.unknown_connections += 1;
            continue;
        };

        if !out.contains(bridge.entity_1_id) {
            debug!(
                entity_1_id = bridge.entity_1_id,
                connection = %connection,
                "Skipping bridge: owner is not a vertex"
            );
            stats.bridges_skipped += 1;
            continue;
        }

        let Some(counterparty) = out.get(bridge.entity_2_id).map(|v| v.name.clone()) else {
            debug!(
                entity_2_id = bridge.entity_2_id,
                connection = %connection,
                "Skipping bridge: counterparty is not a vertex"
            );
            stats.bridges_skipped += 1;
            continue;
        };

        if let Some(owner) = out.get_mut(bridge.entity_1_id) {
            owner.attach(Relation::of(connection), counterparty, bridge);
        }
    }

    for operation in operations {
        let Some(finance) = operation.finance() else {
            stats.unknown_finance += 1;
            continue;
        };
        match out.get_mut(operation.entity_id) {
            Some(owner) => owner.record(finance, operation),
            None => {
                debug!(entity_id = operation.entity_id, "Skipping operation: not a vertex");
                stats.operations_skipped += 1;
            }
        }
    }

    for location in locations {
        let (entity_id, location) = location.detach();
        match entity_id.and_then(|id| out.get_mut(id)) {
            Some(owner) => owner.locations.push(location),
            None => {
                debug!(entity_id = ?entity_id, "Skipping location: not a vertex");
                stats.locations_skipped += 1;
            }
        }
    }

    if stats.dropped() > 0 {
        info!(
            vertices = out.len(),
            bridges_skipped = stats.bridges_skipped,
            unknown_connections = stats.unknown_connections,
            operations_skipped = stats.operations_skipped,
            unknown_finance = stats.unknown_finance,
            locations_skipped = stats.locations_skipped,
            "Vertex fold dropped rows"
        );
    }

    (out, stats)
}
