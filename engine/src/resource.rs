use crate::entity::{DEFAULT_ID_FIELD, Entity, EntityId};
use crate::envelope::{self, CollectionAdapter, EntityAdapter, Page};
use crate::error::RequestError;
use crate::query::{CacheKey, QueryParams};
use crate::tag::Tag;
use serde_json::Value;

/// Everything the cache needs to know about one server resource:
/// where it lives, which tag it provides, and how its responses are normalized.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    path: &'static str,
    label: &'static str,
    tag: Tag,
    id_field: &'static str,
    collection_adapter: CollectionAdapter,
    entity_adapter: EntityAdapter,
}

impl ResourceDescriptor {
    /// `path` is the collection path segment (`/pipelines`), `label` the singular display
    /// name used in notifications, `tag` the type level invalidation tag.
    pub const fn new(path: &'static str, label: &'static str, tag: &'static str) -> Self {
        Self {
            path,
            label,
            tag: Tag::new(tag),
            id_field: DEFAULT_ID_FIELD,
            collection_adapter: envelope::collection,
            entity_adapter: envelope::entity,
        }
    }

    pub const fn with_id_field(mut self, id_field: &'static str) -> Self {
        self.id_field = id_field;
        self
    }

    pub const fn with_collection_adapter(mut self, adapter: CollectionAdapter) -> Self {
        self.collection_adapter = adapter;
        self
    }

    pub const fn with_entity_adapter(mut self, adapter: EntityAdapter) -> Self {
        self.entity_adapter = adapter;
        self
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn id_field(&self) -> &'static str {
        self.id_field
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn entity_tag(&self, id: EntityId) -> Tag {
        self.tag.with_id(id)
    }

    pub fn id_of(&self, entity: &Entity) -> Option<EntityId> {
        entity.id_in(self.id_field)
    }

    pub fn collection_key(&self, params: QueryParams) -> CacheKey {
        CacheKey::Collection {
            resource: self.path,
            params,
        }
    }

    pub fn entity_key(&self, id: EntityId) -> CacheKey {
        CacheKey::Entity {
            resource: self.path,
            id,
        }
    }

    pub fn adapt_collection(&self, body: Value) -> Result<Page, RequestError> {
        (self.collection_adapter)(body, self.path)
    }

    pub fn adapt_entity(&self, body: Value) -> Result<Entity, RequestError> {
        (self.entity_adapter)(body, self.path)
    }

    /// The tags a cache entry for `key` carries before any data arrived.
    pub fn base_tags(&self, key: &CacheKey) -> Vec<Tag> {
        match key {
            CacheKey::Collection { .. } => vec![self.tag.clone()],
            CacheKey::Entity { id, .. } => vec![self.entity_tag(id.clone())],
        }
    }

    /// Base tags plus one entity tag per record in `entities`, so that invalidating a
    /// single record also reaches every list it appears in.
    pub fn provided_tags<'a>(
        &self,
        key: &CacheKey,
        entities: impl IntoIterator<Item = &'a Entity>,
    ) -> Vec<Tag> {
        let mut tags = self.base_tags(key);
        tags.extend(
            entities
                .into_iter()
                .filter_map(|e| self.id_of(e))
                .map(|id| self.entity_tag(id)),
        );
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PIPELINES: ResourceDescriptor = ResourceDescriptor::new("pipelines", "Pipeline", "Pipelines");

    #[test]
    fn collection_provides_type_and_item_tags() {
        let key = PIPELINES.collection_key(QueryParams::new());
        let entities = [
            Entity::from_value(json!({"id": 1})).unwrap(),
            Entity::from_value(json!({"name": "no id"})).unwrap(),
        ];

        let tags = PIPELINES.provided_tags(&key, &entities);

        assert_eq!(
            vec![
                Tag::new("Pipelines"),
                Tag::new("Pipelines").with_id(EntityId::Number(1))
            ],
            tags
        );
    }

    #[test]
    fn custom_id_field_is_used_for_tags() {
        let descriptor = PIPELINES.with_id_field("_id");
        let key = descriptor.entity_key(EntityId::from("abc"));
        let entity = Entity::from_value(json!({"_id": "abc"})).unwrap();

        let tags = descriptor.provided_tags(&key, [&entity]);

        assert!(tags.iter().all(|t| t.id() == Some(&EntityId::from("abc"))));
    }
}
