//! MemorySource: answers the `GraphSource` contract from rows held in memory.
//!
//! Mirrors the Postgres queries closely enough for tests and for callers that
//! already hold the rows. Records every view it is asked for, and can be told
//! to fail on a given view.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use civicgraph_common::{
    BridgeRow, CityLocationRow, CityRow, EntityRow, LocationRow, OperationRow,
};

use crate::error::{StoreError, StoreResult};
use crate::source::{BridgeFilter, GraphSource, View};

#[derive(Default)]
pub struct MemorySource {
    entities: Vec<EntityRow>,
    bridges: Vec<BridgeRow>,
    operations: Vec<OperationRow>,
    locations: Vec<LocationRow>,
    cities: Vec<CityRow>,
    fail_on: Option<View>,
    calls: Mutex<Vec<View>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(mut self, entities: Vec<EntityRow>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_bridges(mut self, bridges: Vec<BridgeRow>) -> Self {
        self.bridges = bridges;
        self
    }

    pub fn with_operations(mut self, operations: Vec<OperationRow>) -> Self {
        self.operations = operations;
        self
    }

    /// Locations must carry `city_id` in `fields` to join against cities.
    pub fn with_locations(mut self, locations: Vec<LocationRow>) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_cities(mut self, cities: Vec<CityRow>) -> Self {
        self.cities = cities;
        self
    }

    /// Every read of `view` fails with `StoreError::Unavailable`.
    pub fn failing_on(mut self, view: View) -> Self {
        self.fail_on = Some(view);
        self
    }

    /// Views read so far, in call order (for test assertions).
    pub fn calls(&self) -> Vec<View> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, view: View) -> StoreResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(view);

        if self.fail_on == Some(view) {
            return Err(StoreError::Unavailable {
                view: view.name(),
                reason: "configured to fail".to_string(),
            });
        }
        Ok(())
    }

    fn renderable(&self) -> impl Iterator<Item = &EntityRow> {
        self.entities.iter().filter(|e| e.render == Some(true))
    }

    fn city_of(&self, location: &LocationRow) -> Option<&CityRow> {
        let city_id = location.fields.get("city_id").and_then(Value::as_i64)?;
        self.cities.iter().find(|c| c.id == city_id)
    }

    /// `locations` joined with `cities`, flattened the way `locations_with_city` is.
    fn joined_locations(&self) -> Vec<LocationRow> {
        self.locations
            .iter()
            .map(|location| {
                let mut joined = location.clone();
                if let Some(city) = self.city_of(location) {
                    if let Ok(Value::Object(city_fields)) = serde_json::to_value(city) {
                        for (key, value) in city_fields {
                            if key != "id" {
                                joined.fields.entry(key).or_insert(value);
                            }
                        }
                    }
                }
                joined
            })
            .collect()
    }
}

/// Descending, with missing values last (Postgres `DESC NULLS LAST`).
fn desc_nulls_last(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn top_by<'a>(
    rows: impl Iterator<Item = &'a EntityRow>,
    key: impl Fn(&EntityRow) -> Option<i64>,
    limit: usize,
) -> Vec<&'a EntityRow> {
    let mut ranked: Vec<&EntityRow> = rows.collect();
    ranked.sort_by(|a, b| desc_nulls_last(key(*a), key(*b)));
    ranked.truncate(limit);
    ranked
}

#[async_trait]
impl GraphSource for MemorySource {
    async fn top_entities(&self, limit: i64) -> StoreResult<Vec<EntityRow>> {
        self.record(View::Entities)?;
        let limit = usize::try_from(limit).unwrap_or(0);

        let by_employees = top_by(self.renderable(), |e| e.employees, limit);
        let by_followers = top_by(self.renderable(), |e| e.followers, limit);

        let mut union: Vec<EntityRow> = Vec::new();
        for row in by_employees.into_iter().chain(by_followers) {
            if !union.iter().any(|seen| seen.id == row.id) {
                union.push(row.clone());
            }
        }
        union.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(union)
    }

    async fn entities_excluding(&self, exclude: &[i64]) -> StoreResult<Vec<EntityRow>> {
        self.record(View::Entities)?;

        let mut rows: Vec<EntityRow> = self
            .renderable()
            .filter(|e| !exclude.contains(&e.id))
            .map(|e| EntityRow {
                id: e.id,
                name: e.name.clone(),
                nickname: e.nickname.clone(),
                followers: e.followers,
                employees: e.employees,
                entity_type: e.entity_type.clone(),
                ..Default::default()
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn bridges(&self, filter: &BridgeFilter) -> StoreResult<Vec<BridgeRow>> {
        self.record(View::Bridges)?;
        Ok(self
            .bridges
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn operations(&self) -> StoreResult<Vec<OperationRow>> {
        self.record(View::Operations)?;
        Ok(self.operations.clone())
    }

    async fn entity_locations(&self) -> StoreResult<Vec<LocationRow>> {
        self.record(View::LocationsWithCity)?;
        Ok(self.joined_locations())
    }

    async fn locations(&self) -> StoreResult<Vec<LocationRow>> {
        self.record(View::Locations)?;
        Ok(self.locations.clone())
    }

    async fn cities(&self) -> StoreResult<Vec<CityRow>> {
        self.record(View::Cities)?;
        Ok(self.cities.clone())
    }

    async fn city_locations(&self) -> StoreResult<Vec<CityLocationRow>> {
        self.record(View::Locations)?;

        let text = |fields: &serde_json::Map<String, Value>, key: &str| {
            fields.get(key).and_then(Value::as_str).map(str::to_string)
        };
        let float = |fields: &serde_json::Map<String, Value>, key: &str| {
            fields.get(key).and_then(Value::as_f64)
        };

        let mut rows: Vec<CityLocationRow> = Vec::new();
        for location in &self.locations {
            let city = self.city_of(location);
            let row = CityLocationRow {
                entity: location.entity_id,
                address: text(&location.fields, "address"),
                address_lat: float(&location.fields, "address_lat"),
                address_long: float(&location.fields, "address_long"),
                city_name: city.and_then(|c| c.city_name.clone()),
                state_name: city.and_then(|c| c.state_name.clone()),
                state_code: city.and_then(|c| c.state_code.clone()),
                country_name: city.and_then(|c| c.country_name.clone()),
                country_code: city.and_then(|c| c.country_code.clone()),
                city_lat: city.and_then(|c| c.city_lat),
                city_long: city.and_then(|c| c.city_long),
            };
            if !rows.contains(&row) {
                rows.push(row);
            }
        }

        // ORDER BY entity, nulls last
        rows.sort_by_key(|r| (r.entity.is_none(), r.entity));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i64, name: &str, employees: Option<i64>, followers: Option<i64>) -> EntityRow {
        EntityRow {
            render: Some(true),
            employees,
            followers,
            ..EntityRow::new(id, name)
        }
    }

    #[tokio::test]
    async fn top_entities_is_a_sorted_union() {
        let source = MemorySource::new().with_entities(vec![
            entity(1, "Zeta", Some(500), Some(10)),
            entity(2, "Alpha", Some(10), Some(900)),
            entity(3, "Mid", Some(400), Some(800)),
            entity(4, "Tiny", Some(1), Some(1)),
        ]);

        let top = source.top_entities(2).await.unwrap();
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn excluded_ids_never_come_back() {
        let source = MemorySource::new().with_entities(vec![
            entity(1, "A", None, None),
            entity(2, "B", None, None),
            EntityRow::new(3, "Hidden"),
        ]);

        let rows = source.entities_excluding(&[1]).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(rows[0].render, None);
    }

    #[tokio::test]
    async fn failing_view_is_recorded_and_errors() {
        let source = MemorySource::new().failing_on(View::Operations);
        assert!(source.operations().await.is_err());
        assert!(source.cities().await.is_ok());
        assert_eq!(source.calls(), vec![View::Operations, View::Cities]);
    }
}
