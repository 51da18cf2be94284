use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::store::{ListQuery, Store};
use dashboard_core::catalogue::CatalogueEntry;
use error_stack::{Report, ResultExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use sync_engine::entity::Entity;
use sync_engine::projection::Projection;
use tokio::sync::RwLock;
use tracing::{info, instrument};

#[derive(Clone, Default)]
pub struct ResourceService {
    store: Arc<RwLock<Store>>,
}

impl ResourceService {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    #[instrument(skip(self, query), name = "service#list")]
    pub async fn list(&self, resource: &str, query: ListQuery) -> StoreResult<Projection> {
        let store = self.store.read().await;
        let page = store.collection(resource)?.list(&query);
        metrics::increment_records_listed_by(page.rows.len());
        Ok(page)
    }

    #[instrument(skip(self), name = "service#get")]
    pub async fn get(&self, resource: &str, raw_id: &str) -> StoreResult<Entity> {
        let store = self.store.read().await;
        let collection = store.collection(resource)?;
        collection
            .get(&collection.parse_id(raw_id))
            .cloned()
            .ok_or_else(|| Report::new(StoreError::NotFound))
    }

    #[instrument(skip(self, body), name = "service#create")]
    pub async fn create(&self, resource: &str, body: Value) -> StoreResult<Entity> {
        let attributes = into_object(body)?;
        let mut store = self.store.write().await;
        let collection = store.collection_mut(resource)?;
        validate(collection.entry(), &attributes)?;

        let entity = collection.insert(attributes)?;
        info!(id = ?collection.entry().descriptor().id_of(&entity), "record created");
        metrics::increment_records_created();
        Ok(entity)
    }

    #[instrument(skip(self, body), name = "service#update")]
    pub async fn update(&self, resource: &str, raw_id: &str, body: Value) -> StoreResult<Entity> {
        let attributes = into_object(body)?;
        let mut store = self.store.write().await;
        let collection = store.collection_mut(resource)?;
        let id = collection.parse_id(raw_id);

        let merged = collection
            .preview_update(&id, &attributes)
            .ok_or_else(|| Report::new(StoreError::NotFound))?;
        validate(collection.entry(), &merged)?;

        let entity = collection
            .update(&id, attributes)
            .ok_or_else(|| Report::new(StoreError::NotFound))?;
        metrics::increment_records_updated();
        Ok(entity)
    }

    #[instrument(skip(self), name = "service#delete")]
    pub async fn delete(&self, resource: &str, raw_id: &str) -> StoreResult<Entity> {
        let mut store = self.store.write().await;
        let collection = store.collection_mut(resource)?;
        let id = collection.parse_id(raw_id);

        let entity = collection
            .remove(&id)?
            .ok_or_else(|| Report::new(StoreError::NotFound))?;
        info!(%id, "record deleted");
        metrics::increment_records_deleted();
        Ok(entity)
    }
}

fn into_object(body: Value) -> StoreResult<Map<String, Value>> {
    match body {
        Value::Object(attributes) => Ok(attributes),
        other => Err(
            Report::new(StoreError::Invalid(
                "request body must be a JSON object".to_string(),
            ))
            .attach(format!("received {other}")),
        ),
    }
}

/// Runs the same field rules the dashboard forms use.
fn validate(entry: &CatalogueEntry, attributes: &Map<String, Value>) -> StoreResult<()> {
    let schema = entry.form().change_context(StoreError::Schema)?;
    let errors = schema.validate(attributes);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Report::new(StoreError::Invalid(errors.to_string())))
    }
}
