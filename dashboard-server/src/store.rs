//! The in-memory records behind the development server, one collection per catalogue resource.

use crate::error::{StoreError, StoreResult};
use dashboard_core::catalogue::{CATALOGUE, CatalogueEntry};
use error_stack::{Report, ResultExt};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use sync_engine::Pagination;
use sync_engine::entity::{DEFAULT_ID_FIELD, Entity, EntityId};
use sync_engine::filter::{Bound, FilterOp, FilterValue, Filters};
use sync_engine::projection::{Projection, project};
use sync_engine::query::{LIMIT_PARAM, PAGE_PARAM, SEARCH_PARAM};
use tracing::{debug, warn};
use uuid::Uuid;

/// Numeric keys for `id` resources, uuids for document style `_id` resources.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum IdStrategy {
    Sequence,
    Uuid,
}

/// A parsed list request: `page`, `limit`, `search`, and field filters in their [`FilterOp`] form.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ListQuery {
    pub pagination: Pagination,
    pub filters: Filters,
}

impl ListQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut page = None;
        let mut limit = None;
        let mut filters = Filters::new();
        let mut ranges: BTreeMap<String, (Option<Bound>, Option<Bound>)> = BTreeMap::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                PAGE_PARAM => page = Some(parse_positive(PAGE_PARAM, value)?),
                LIMIT_PARAM => limit = Some(parse_positive(LIMIT_PARAM, value)?),
                SEARCH_PARAM => filters.set_search(value),
                key => match FilterOp::split(key) {
                    (field, FilterOp::Exact) => filters.merge([(field, FilterValue::exact(value))]),
                    (field, FilterOp::Contains) => filters.merge([(field, FilterValue::text(value))]),
                    (field, FilterOp::From) => {
                        ranges.entry(field.to_string()).or_default().0 = Some(parse_bound(key, value)?);
                    }
                    (field, FilterOp::To) => {
                        ranges.entry(field.to_string()).or_default().1 = Some(parse_bound(key, value)?);
                    }
                },
            }
        }
        filters.merge(
            ranges
                .into_iter()
                .map(|(field, (from, to))| (field, FilterValue::Range { from, to })),
        );

        let pagination = match limit {
            Some(limit) => Pagination::with_page_size(page.unwrap_or(1), limit),
            None => Pagination::unpaged(),
        };
        Ok(Self {
            pagination,
            filters,
        })
    }
}

fn parse_positive(name: &str, raw: &str) -> StoreResult<u64> {
    raw.trim()
        .parse::<u64>()
        .change_context_lazy(|| StoreError::Invalid(format!("{name} must be a positive number")))
        .attach_with(|| format!("received '{raw}'"))
}

fn parse_bound(name: &str, raw: &str) -> StoreResult<Bound> {
    Bound::parse(raw).ok_or_else(|| {
        Report::new(StoreError::Invalid(format!(
            "{name} must be a number or a YYYY-MM-DD date"
        )))
        .attach(format!("received '{raw}'"))
    })
}

pub struct Collection {
    entry: CatalogueEntry,
    ids: IdStrategy,
    records: Vec<Entity>,
    /// `None` once the sequence has reached `i64::MAX`.
    next_id: Option<i64>,
    protected: HashSet<EntityId>,
}

impl Collection {
    pub fn new(entry: CatalogueEntry) -> Self {
        let ids = if entry.descriptor().id_field() == DEFAULT_ID_FIELD {
            IdStrategy::Sequence
        } else {
            IdStrategy::Uuid
        };
        Self {
            entry,
            ids,
            records: Vec::new(),
            next_id: Some(1),
            protected: HashSet::new(),
        }
    }

    pub fn entry(&self) -> &CatalogueEntry {
        &self.entry
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn id_field(&self) -> &'static str {
        self.entry.descriptor().id_field()
    }

    /// Path segments are always text; sequence ids that parse as numbers are numbers.
    pub fn parse_id(&self, raw: &str) -> EntityId {
        match (self.ids, raw.parse::<i64>()) {
            (IdStrategy::Sequence, Ok(id)) => EntityId::Number(id),
            _ => EntityId::from(raw),
        }
    }

    fn generate_id(&mut self) -> StoreResult<EntityId> {
        match self.ids {
            IdStrategy::Sequence => {
                let id = self.next_id.ok_or_else(|| {
                    Report::new(StoreError::IdsExhausted)
                        .attach(format!("resource {}", self.entry.descriptor().path()))
                })?;
                self.next_id = id.checked_add(1);
                Ok(EntityId::Number(id))
            }
            IdStrategy::Uuid => Ok(EntityId::Text(Uuid::now_v7().to_string())),
        }
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        let id_field = self.id_field();
        self.records
            .iter()
            .position(|r| r.id_in(id_field).as_ref() == Some(id))
    }

    pub fn list(&self, query: &ListQuery) -> Projection {
        project(&self.records, &query.filters, None, &query.pagination)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.position(id).map(|i| &self.records[i])
    }

    /// Stores a new record under a fresh id. Any id in `attributes` is ignored.
    pub fn insert(&mut self, mut attributes: Map<String, Value>) -> StoreResult<Entity> {
        let id = self.generate_id()?;
        attributes.insert(self.id_field().to_string(), id.to_value());
        let entity = Entity::new(attributes);
        self.records.push(entity.clone());
        Ok(entity)
    }

    /// Shallow merges `attributes` into the record. The id cannot change.
    pub fn update(&mut self, id: &EntityId, attributes: Map<String, Value>) -> Option<Entity> {
        let position = self.position(id)?;
        let id_field = self.id_field();

        let mut merged = self.records[position].clone().into_attributes();
        merged.extend(attributes);
        merged.insert(id_field.to_string(), id.to_value());

        let entity = Entity::new(merged);
        self.records[position] = entity.clone();
        Some(entity)
    }

    /// What the record would look like after [`Collection::update`], without storing it.
    pub fn preview_update(
        &self,
        id: &EntityId,
        attributes: &Map<String, Value>,
    ) -> Option<Map<String, Value>> {
        let mut merged = self.get(id)?.attributes().clone();
        merged.extend(attributes.clone());
        Some(merged)
    }

    pub fn remove(&mut self, id: &EntityId) -> StoreResult<Option<Entity>> {
        if self.protected.contains(id) {
            return Err(Report::new(StoreError::Protected)
                .attach(format!("{} {id}", self.entry.descriptor().path())));
        }
        Ok(self.position(id).map(|i| self.records.remove(i)))
    }

    pub fn protect(&mut self, id: EntityId) {
        self.protected.insert(id);
    }

    /// Loads records as they are, keeping their ids. Records without a usable id get one.
    pub fn seed(&mut self, records: Vec<Value>) -> StoreResult<usize> {
        let id_field = self.id_field();
        let mut loaded = 0;
        for record in records {
            let Some(mut entity) = Entity::from_value(record) else {
                warn!(
                    resource = self.entry.descriptor().path(),
                    "skipping seed record that is not an object"
                );
                continue;
            };
            match entity.id_in(id_field) {
                Some(EntityId::Number(n)) => {
                    self.next_id = self.next_id.zip(n.checked_add(1)).map(|(next, after)| next.max(after));
                }
                Some(EntityId::Text(_)) => {}
                None => {
                    let id = self.generate_id()?;
                    entity = entity.with(id_field, id.to_value());
                }
            }
            self.records.push(entity);
            loaded += 1;
        }
        Ok(loaded)
    }
}

pub struct Store {
    collections: BTreeMap<&'static str, Collection>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// One empty collection per catalogue resource.
    pub fn new() -> Self {
        Self {
            collections: CATALOGUE
                .iter()
                .map(|entry| (entry.descriptor().path(), Collection::new(*entry)))
                .collect(),
        }
    }

    pub fn collection(&self, path: &str) -> StoreResult<&Collection> {
        self.collections
            .get(path)
            .ok_or_else(|| Report::new(StoreError::UnknownResource(path.to_string())))
    }

    pub fn collection_mut(&mut self, path: &str) -> StoreResult<&mut Collection> {
        self.collections
            .get_mut(path)
            .ok_or_else(|| Report::new(StoreError::UnknownResource(path.to_string())))
    }

    /// Marks `(path, id)` as in use, so that deleting it fails.
    pub fn protect(&mut self, path: &str, raw_id: &str) -> StoreResult<()> {
        let collection = self.collection_mut(path)?;
        let id = collection.parse_id(raw_id);
        debug!(resource = path, %id, "protecting record from deletion");
        collection.protect(id);
        Ok(())
    }

    /// `{ "<resource path>": [ records... ] }`
    pub fn seed(&mut self, data: Value) -> StoreResult<usize> {
        let Value::Object(resources) = data else {
            return Err(Report::new(StoreError::Invalid(
                "seed data must be an object keyed by resource".to_string(),
            )));
        };

        let mut loaded = 0;
        for (path, records) in resources {
            let Value::Array(records) = records else {
                warn!(resource = path, "seed data for resource is not an array, skipping");
                continue;
            };
            loaded += self.collection_mut(&path)?.seed(records)?;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn sequence_ids_continue_after_seeded_records() {
        let mut store = Store::new();
        store
            .seed(json!({"pipelines": [{"id": 7, "pipeline_name": "Sales"}]}))
            .unwrap();

        let pipelines = store.collection_mut("pipelines").unwrap();
        let created = pipelines
            .insert(object(json!({"id": 1, "pipeline_name": "Marketing"})))
            .unwrap();

        assert_eq!(Some(EntityId::Number(8)), created.id());
        assert_eq!(2, pipelines.len());
    }

    #[test]
    fn document_resources_get_uuid_ids() {
        let mut store = Store::new();
        let signatures = store.collection_mut("signatures").unwrap();

        let created = signatures.insert(object(json!({"title": "NDA"}))).unwrap();

        assert_eq!(IdStrategy::Uuid, signatures.id_strategy());
        assert!(matches!(created.id_in("_id"), Some(EntityId::Text(id)) if Uuid::parse_str(&id).is_ok()));
    }

    #[test]
    fn update_merges_and_keeps_the_id() {
        let mut store = Store::new();
        let holidays = store.collection_mut("holidays").unwrap();
        let created = holidays
            .insert(object(json!({"holiday_name": "Diwali", "leave_type": "Public"})))
            .unwrap();
        let id = created.id().unwrap();

        let updated = holidays
            .update(&id, object(json!({"id": 99, "leave_type": "Optional"})))
            .unwrap();

        assert_eq!(Some(id), updated.id());
        assert_eq!(Some(&json!("Diwali")), updated.get("holiday_name"));
        assert_eq!(Some(&json!("Optional")), updated.get("leave_type"));
    }

    #[test]
    fn protected_records_refuse_deletion() {
        let mut store = Store::new();
        store.seed(json!({"pipelines": [{"id": 5}]})).unwrap();
        store.protect("pipelines", "5").unwrap();

        let error = store
            .collection_mut("pipelines")
            .unwrap()
            .remove(&EntityId::Number(5))
            .unwrap_err();

        assert!(matches!(error.current_context(), StoreError::Protected));
        assert_eq!(1, store.collection("pipelines").unwrap().len());
    }

    #[test]
    fn unknown_resources_are_reported() {
        let store = Store::new();

        let error = store.collection("widgets").err().unwrap();

        assert!(matches!(error.current_context(), StoreError::UnknownResource(path) if path == "widgets"));
    }

    #[rstest]
    #[case(&[("page", "2"), ("limit", "2")], 1, 3)]
    #[case(&[("search", "mark")], 1, 1)]
    #[case(&[("status", "open")], 2, 2)]
    #[case(&[("subject", "printer")], 0, 0)]
    #[case(&[("subject[contains]", "printer")], 1, 1)]
    #[case(&[("id[from]", "2")], 2, 2)]
    #[case(&[("id[from]", "2"), ("id[to]", "2")], 1, 1)]
    #[case(&[("status", "open"), ("limit", "1")], 1, 2)]
    #[case(&[], 3, 3)]
    fn list_applies_query(
        #[case] pairs: &[(&str, &str)],
        #[case] rows: usize,
        #[case] total: usize,
    ) {
        let mut store = Store::new();
        store
            .seed(json!({"tickets": [
                {"id": 1, "subject": "Printer", "status": "open"},
                {"id": 2, "subject": "Marketing site down", "status": "closed"},
                {"id": 3, "subject": "VPN", "status": "open"},
            ]}))
            .unwrap();
        let query = ListQuery::from_pairs(pairs.iter().copied()).unwrap();

        let page = store.collection("tickets").unwrap().list(&query);

        assert_eq!(rows, page.rows.len());
        assert_eq!(total, page.total_count);
    }

    #[test]
    fn unparsable_range_bound_is_invalid() {
        let error = ListQuery::from_pairs([("paid_on[from]", "last week")]).unwrap_err();

        assert!(matches!(error.current_context(), StoreError::Invalid(m) if m.starts_with("paid_on[from]")));
    }

    #[test]
    fn seeded_max_id_exhausts_the_sequence() {
        let mut store = Store::new();
        store
            .seed(json!({"pipelines": [{"id": i64::MAX - 1}]}))
            .unwrap();
        let pipelines = store.collection_mut("pipelines").unwrap();

        let created = pipelines.insert(object(json!({"pipeline_name": "Last"}))).unwrap();
        assert_eq!(Some(EntityId::Number(i64::MAX)), created.id());

        let error = pipelines
            .insert(object(json!({"pipeline_name": "One too many"})))
            .unwrap_err();
        assert!(matches!(error.current_context(), StoreError::IdsExhausted));
        assert_eq!(2, pipelines.len());
    }

    #[test]
    fn seeding_the_largest_id_does_not_overflow() {
        let mut store = Store::new();

        let loaded = store
            .seed(json!({"pipelines": [{"id": i64::MAX, "pipeline_name": "Edge"}]}))
            .unwrap();

        assert_eq!(1, loaded);
        let error = store
            .collection_mut("pipelines")
            .unwrap()
            .insert(object(json!({"pipeline_name": "Next"})))
            .unwrap_err();
        assert!(matches!(error.current_context(), StoreError::IdsExhausted));
    }

    #[test]
    fn bad_limit_is_invalid() {
        let error = ListQuery::from_pairs([("limit", "ten")]).unwrap_err();

        assert!(matches!(error.current_context(), StoreError::Invalid(_)));
    }
}
