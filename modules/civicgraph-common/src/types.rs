use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// How many entities each ranking (employees, followers) contributes to the top set.
pub const TOP_ENTITY_LIMIT: i64 = 10;

/// Separator used by `entities_view.key_people`.
pub const KEY_PEOPLE_DELIMITER: char = '|';

// --- Render flags ---

/// Views store `render` as a tinyint, but JSON rows may carry a real boolean.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl RawFlag {
    fn truthy(self) -> bool {
        match self {
            RawFlag::Bool(b) => b,
            RawFlag::Int(i) => i != 0,
            RawFlag::Float(f) => f != 0.0,
        }
    }
}

/// Deserialize a `render`-style flag. Null and missing are `false`.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(raw.map(RawFlag::truthy).unwrap_or(false))
}

/// Like [`deserialize_flag`] but keeps "absent" distinct from "false".
pub fn deserialize_opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(raw.map(RawFlag::truthy))
}

/// Text columns that are nullable in the view but never optional downstream.
pub fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Connections ---

/// The fixed vocabulary of `bridges_view.connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    FundingReceived,
    FundingGiven,
    InvestmentReceived,
    InvestmentMade,
    Collaboration,
    Data,
    Employment,
}

impl Connection {
    pub const ALL: [Connection; 7] = [
        Connection::FundingReceived,
        Connection::FundingGiven,
        Connection::InvestmentReceived,
        Connection::InvestmentMade,
        Connection::Collaboration,
        Connection::Data,
        Connection::Employment,
    ];

    /// The value as stored in the view.
    pub fn as_str(&self) -> &'static str {
        match self {
            Connection::FundingReceived => "Funding Received",
            Connection::FundingGiven => "Funding Given",
            Connection::InvestmentReceived => "Investment Received",
            Connection::InvestmentMade => "Investment Made",
            Connection::Collaboration => "Collaboration",
            Connection::Data => "Data",
            Connection::Employment => "Employment",
        }
    }

    /// Exact match against the stored value. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Edge kinds ---

/// The four edge groups rendered by the front end. Each is backed by
/// the "received" side of a connection so a pair of bridges yields one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Funding,
    Investment,
    Collaboration,
    Data,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Funding,
        EdgeKind::Investment,
        EdgeKind::Collaboration,
        EdgeKind::Data,
    ];

    pub fn connection(&self) -> Connection {
        match self {
            EdgeKind::Funding => Connection::FundingReceived,
            EdgeKind::Investment => Connection::InvestmentReceived,
            EdgeKind::Collaboration => Connection::Collaboration,
            EdgeKind::Data => Connection::Data,
        }
    }

    /// Inverse of [`EdgeKind::connection`]. Given/Made/Employment have no group.
    pub fn from_connection(connection: Connection) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.connection() == connection)
    }

    /// Funding and investment edges carry year and amount.
    pub fn with_financial_data(&self) -> bool {
        matches!(self, EdgeKind::Funding | EdgeKind::Investment)
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Funding => write!(f, "funding"),
            EdgeKind::Investment => write!(f, "investment"),
            EdgeKind::Collaboration => write!(f, "collaboration"),
            EdgeKind::Data => write!(f, "data"),
        }
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "funding" => Ok(EdgeKind::Funding),
            "investment" => Ok(EdgeKind::Investment),
            "collaboration" => Ok(EdgeKind::Collaboration),
            "data" => Ok(EdgeKind::Data),
            other => Err(format!(
                "unknown edge kind '{other}' (expected funding, investment, collaboration or data)"
            )),
        }
    }
}

// --- Finance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finance {
    Revenue,
    Expenses,
}

impl Finance {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Revenue" => Some(Finance::Revenue),
            "Expenses" => Some(Finance::Expenses),
            _ => None,
        }
    }
}

// --- View rows ---

/// A row of `entities_view`. Columns beyond the named ones land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<i64>,
    /// Raw `|`-delimited names, split during the vertex fold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_people: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub render: Option<bool>,
    /// Set by the composer that fetched the row, never by the view.
    #[serde(default)]
    pub loaded: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRow {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// `key_people` split on the delimiter, order preserved.
    pub fn key_people_list(&self) -> Option<Vec<String>> {
        self.key_people.as_ref().map(|raw| {
            raw.split(KEY_PEOPLE_DELIMITER)
                .map(|s| s.to_string())
                .collect()
        })
    }
}

/// A row of `bridges_view`. `entity_1_id` owns the relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeRow {
    pub entity_1_id: i64,
    pub entity_2_id: i64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub connection: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub connection_year: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub render: bool,
}

impl BridgeRow {
    pub fn new(entity_1_id: i64, entity_2_id: i64, connection: impl Into<String>) -> Self {
        Self {
            entity_1_id,
            entity_2_id,
            connection: connection.into(),
            render: true,
            ..Default::default()
        }
    }

    pub fn connection(&self) -> Option<Connection> {
        Connection::parse(&self.connection)
    }
}

/// A row of `operations_view`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRow {
    pub entity_id: i64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub finance: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl OperationRow {
    pub fn finance(&self) -> Option<Finance> {
        Finance::parse(&self.finance)
    }
}

/// A row of `locations_view` or `locations_with_city`. Every column other
/// than the ids is kept verbatim in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LocationRow {
    /// Split off the owning entity id, leaving the location as a vertex sees it.
    pub fn detach(self) -> (Option<i64>, VertexLocation) {
        (
            self.entity_id,
            VertexLocation {
                id: self.id,
                fields: self.fields,
            },
        )
    }
}

/// A location attached to a vertex: the row without `entity_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A row of `cities_view`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityRow {
    pub id: i64,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub state_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city_lat: Option<f64>,
    #[serde(default)]
    pub city_long: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A location left-joined with its city. `entity` is the owning entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityLocationRow {
    #[serde(default)]
    pub entity: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub address_lat: Option<f64>,
    #[serde(default)]
    pub address_long: Option<f64>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub state_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city_lat: Option<f64>,
    #[serde(default)]
    pub city_long: Option<f64>,
}

impl CityLocationRow {
    /// "City, State, Country", preferring names over codes. `None` without a city.
    pub fn place_key(&self) -> Option<String> {
        let city = self.city_name.as_deref().filter(|c| !c.is_empty())?;
        let mut parts = vec![city];
        if let Some(state) = non_empty(&self.state_name).or(non_empty(&self.state_code)) {
            parts.push(state);
        }
        if let Some(country) = non_empty(&self.country_name).or(non_empty(&self.country_code)) {
            parts.push(country);
        }
        Some(parts.join(", "))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_parse_is_exact() {
        assert_eq!(
            Connection::parse("Funding Received"),
            Some(Connection::FundingReceived)
        );
        assert_eq!(Connection::parse("funding received"), None);
        assert_eq!(Connection::parse("Sponsorship"), None);
    }

    #[test]
    fn edge_kind_maps_only_received_side() {
        assert_eq!(
            EdgeKind::from_connection(Connection::InvestmentReceived),
            Some(EdgeKind::Investment)
        );
        assert_eq!(EdgeKind::from_connection(Connection::FundingGiven), None);
        assert_eq!(EdgeKind::from_connection(Connection::Employment), None);
        assert!(EdgeKind::Funding.with_financial_data());
        assert!(!EdgeKind::Data.with_financial_data());
    }

    #[test]
    fn edge_kind_from_str_rejects_unknown() {
        assert_eq!("data".parse::<EdgeKind>(), Ok(EdgeKind::Data));
        assert!("employment".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn entity_row_keeps_unknown_columns() {
        let row: EntityRow = serde_json::from_value(json!({
            "id": 7,
            "name": "Acme",
            "render": 1,
            "url": "https://acme.example",
        }))
        .unwrap();

        assert_eq!(row.render, Some(true));
        assert!(!row.loaded);
        assert_eq!(row.extra.get("url"), Some(&json!("https://acme.example")));
    }

    #[test]
    fn key_people_splits_in_order() {
        let mut row = EntityRow::new(1, "Acme");
        row.key_people = Some("A|B|C".into());
        assert_eq!(
            row.key_people_list(),
            Some(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
        assert_eq!(EntityRow::new(2, "Other").key_people_list(), None);
    }

    #[test]
    fn bridge_render_accepts_int_and_bool() {
        let a: BridgeRow = serde_json::from_value(json!({
            "entity_1_id": 1, "entity_2_id": 2, "connection": "Data", "render": 0
        }))
        .unwrap();
        let b: BridgeRow = serde_json::from_value(json!({
            "entity_1_id": 1, "entity_2_id": 2, "connection": "Data", "render": true
        }))
        .unwrap();
        assert!(!a.render);
        assert!(b.render);
    }

    #[test]
    fn place_key_prefers_names_over_codes() {
        let row = CityLocationRow {
            entity: Some(3),
            city_name: Some("Seattle".into()),
            state_code: Some("WA".into()),
            country_name: Some("United States".into()),
            country_code: Some("US".into()),
            ..Default::default()
        };
        assert_eq!(row.place_key().as_deref(), Some("Seattle, WA, United States"));

        let no_city = CityLocationRow {
            entity: Some(3),
            ..Default::default()
        };
        assert_eq!(no_city.place_key(), None);
    }
}
