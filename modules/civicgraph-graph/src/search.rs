//! Lookup of entity ids by name, nickname, or place.
//!
//! Keys are lowercased. A place key is "City, State, Country" built from the
//! city-joined location rows, so searching "seattle" finds every entity with a
//! Seattle address.

use std::collections::{BTreeMap, BTreeSet};

use civicgraph_common::CityLocationRow;

use crate::vertex::VertexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchIndex {
    keys: BTreeMap<String, BTreeSet<i64>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index vertex names and nicknames, plus the place of every location
    /// that belongs to a vertex.
    pub fn build(vertices: &VertexMap, city_locations: &[CityLocationRow]) -> Self {
        let mut index = Self::new();

        for vertex in vertices.iter() {
            index.insert(&vertex.name, vertex.id);
            if let Some(nickname) = &vertex.nickname {
                index.insert(nickname, vertex.id);
            }
        }

        for row in city_locations {
            let Some(entity) = row.entity.filter(|id| vertices.contains(*id)) else {
                continue;
            };
            if let Some(key) = row.place_key() {
                index.insert(&key, entity);
            }
        }

        index
    }

    pub fn insert(&mut self, key: &str, id: i64) {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        self.keys.entry(key).or_default().insert(id);
    }

    /// Ids whose key equals `term`, case-insensitive, ascending.
    pub fn lookup(&self, term: &str) -> Vec<i64> {
        self.keys
            .get(&term.trim().to_lowercase())
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of every key starting with `prefix`, deduplicated, ascending.
    pub fn search_prefix(&self, prefix: &str) -> Vec<i64> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut ids = BTreeSet::new();
        for (key, matched) in self.keys.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            ids.extend(matched.iter().copied());
        }
        ids.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::process_vertices;
    use civicgraph_common::EntityRow;

    fn vertices() -> VertexMap {
        let mut acme = EntityRow::new(1, "Acme Labs");
        acme.nickname = Some("Acme".into());
        let rows = vec![acme, EntityRow::new(2, "Acme Foundation"), EntityRow::new(3, "Civic Co")];
        process_vertices(rows, &[], &[], vec![]).0
    }

    fn located(entity: i64, city: &str) -> CityLocationRow {
        CityLocationRow {
            entity: Some(entity),
            city_name: Some(city.into()),
            state_code: Some("WA".into()),
            country_code: Some("US".into()),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let index = SearchIndex::build(&vertices(), &[]);
        assert_eq!(index.lookup("acme"), vec![1]);
        assert_eq!(index.lookup("  ACME LABS "), vec![1]);
        assert!(index.lookup("nobody").is_empty());
    }

    #[test]
    fn prefix_search_dedupes_across_keys() {
        let index = SearchIndex::build(&vertices(), &[]);
        assert_eq!(index.search_prefix("acme"), vec![1, 2]);
        assert!(index.search_prefix("").is_empty());
    }

    #[test]
    fn place_keys_only_cover_known_vertices() {
        let rows = vec![located(1, "Seattle"), located(3, "Seattle"), located(42, "Seattle")];
        let index = SearchIndex::build(&vertices(), &rows);
        assert_eq!(index.lookup("seattle, wa, us"), vec![1, 3]);
        assert_eq!(index.search_prefix("Seattle"), vec![1, 3]);
    }
}
