//! Projecting bridges into renderable edges.

use serde::Serialize;
use tracing::debug;

use civicgraph_common::{BridgeRow, EdgeKind};

/// The only `type` a projected edge carries: edges point from the counterparty
/// to the owner, so the owner is always the receiving side.
pub const RECEIVED: &str = "Received";

/// Year and amount carried by funding and investment edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeFinancials {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub year: Option<i32>,
    pub amount: Option<f64>,
}

/// A directed edge for rendering. `source` is the bridge's counterparty,
/// `target` its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: i64,
    pub target: i64,
    #[serde(flatten)]
    pub financials: Option<EdgeFinancials>,
    pub render: bool,
}

impl Edge {
    pub fn from_bridge(bridge: &BridgeRow, with_financial_data: bool) -> Self {
        Self {
            source: bridge.entity_2_id,
            target: bridge.entity_1_id,
            financials: with_financial_data.then(|| EdgeFinancials {
                kind: RECEIVED,
                year: bridge.connection_year,
                amount: bridge.amount,
            }),
            render: bridge.render,
        }
    }
}

/// One edge per bridge, in input order.
pub fn process_edges(bridges: &[BridgeRow], with_financial_data: bool) -> Vec<Edge> {
    bridges
        .iter()
        .map(|bridge| Edge::from_bridge(bridge, with_financial_data))
        .collect()
}

/// Edges bucketed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeGroups {
    pub funding: Vec<Edge>,
    pub investment: Vec<Edge>,
    pub collaboration: Vec<Edge>,
    pub data: Vec<Edge>,
}

impl EdgeGroups {
    pub fn get(&self, kind: EdgeKind) -> &[Edge] {
        match kind {
            EdgeKind::Funding => &self.funding,
            EdgeKind::Investment => &self.investment,
            EdgeKind::Collaboration => &self.collaboration,
            EdgeKind::Data => &self.data,
        }
    }

    fn slot(&mut self, kind: EdgeKind) -> &mut Vec<Edge> {
        match kind {
            EdgeKind::Funding => &mut self.funding,
            EdgeKind::Investment => &mut self.investment,
            EdgeKind::Collaboration => &mut self.collaboration,
            EdgeKind::Data => &mut self.data,
        }
    }

    pub fn len(&self) -> usize {
        EdgeKind::ALL.iter().map(|k| self.get(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bucket bridges by the edge kind of their connection and project each bucket.
/// Bridges whose connection has no edge kind (Given/Made/Employment, or an
/// unrecognized value) appear in no bucket.
pub fn group_edges(bridges: &[BridgeRow]) -> EdgeGroups {
    let mut groups = EdgeGroups::default();
    let mut dropped = 0usize;

    for bridge in bridges {
        match bridge.connection().and_then(EdgeKind::from_connection) {
            Some(kind) => groups
                .slot(kind)
                .push(Edge::from_bridge(bridge, kind.with_financial_data())),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, grouped = groups.len(), "Bridges outside the edge groups");
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn funded() -> BridgeRow {
        BridgeRow {
            connection_year: Some(2020),
            amount: Some(500.0),
            ..BridgeRow::new(1, 2, "Funding Received")
        }
    }

    #[test]
    fn financial_edge_is_reversed_and_typed() {
        let edges = process_edges(&[funded()], true);
        assert_eq!(
            serde_json::to_value(&edges).unwrap(),
            json!([{
                "source": 2, "target": 1, "type": "Received",
                "year": 2020, "amount": 500.0, "render": true
            }])
        );
    }

    #[test]
    fn plain_edge_has_no_financial_keys() {
        let edges = process_edges(&[funded()], false);
        assert_eq!(
            serde_json::to_value(&edges).unwrap(),
            json!([{"source": 2, "target": 1, "render": true}])
        );
    }

    #[test]
    fn grouping_is_disjoint_and_drops_unrecognized() {
        let bridges = vec![
            funded(),
            BridgeRow::new(3, 4, "Investment Received"),
            BridgeRow::new(5, 6, "Collaboration"),
            BridgeRow::new(7, 8, "Data"),
            BridgeRow::new(1, 2, "Funding Given"),
            BridgeRow::new(1, 2, "Employment"),
            BridgeRow::new(1, 2, "Mentorship"),
        ];

        let groups = group_edges(&bridges);

        assert_eq!(groups.funding.len(), 1);
        assert_eq!(groups.investment.len(), 1);
        assert_eq!(groups.collaboration.len(), 1);
        assert_eq!(groups.data.len(), 1);
        assert_eq!(groups.len(), 4);
        assert!(groups.funding[0].financials.is_some());
        assert!(groups.investment[0].financials.is_some());
        assert!(groups.collaboration[0].financials.is_none());
        assert!(groups.data[0].financials.is_none());
    }
}
