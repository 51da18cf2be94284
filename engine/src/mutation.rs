use crate::cache::RemoteCache;
use crate::entity::{Entity, EntityId};
use crate::error::{MutationError, MutationResult, RequestError};
use crate::metrics;
use crate::resource::ResourceDescriptor;
use crate::tag::Tag;
use crate::transport::{Transport, Verb};
use error_stack::Report;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// One create, update or delete call, plus the tags that go stale once it succeeds.
///
/// The resource's own type tag is always declared. Mutations that affect other
/// resources (deleting a pipeline also drops its lead stages) add theirs with
/// [`Command::invalidating`].
#[derive(Debug, Clone)]
pub struct Command {
    verb: Verb,
    descriptor: ResourceDescriptor,
    id: Option<EntityId>,
    body: Option<Value>,
    invalidates: Vec<Tag>,
}

impl Command {
    pub fn create(descriptor: &ResourceDescriptor, body: Value) -> Self {
        Self::new(Verb::Create, descriptor, None, Some(body))
    }

    pub fn update(descriptor: &ResourceDescriptor, id: EntityId, body: Value) -> Self {
        Self::new(Verb::Update, descriptor, Some(id), Some(body))
    }

    pub fn delete(descriptor: &ResourceDescriptor, id: EntityId) -> Self {
        Self::new(Verb::Delete, descriptor, Some(id), None)
    }

    fn new(
        verb: Verb,
        descriptor: &ResourceDescriptor,
        id: Option<EntityId>,
        body: Option<Value>,
    ) -> Self {
        Self {
            verb,
            descriptor: descriptor.clone(),
            id,
            body,
            invalidates: vec![descriptor.tag().clone()],
        }
    }

    pub fn invalidating(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        for tag in tags {
            if !self.invalidates.contains(&tag) {
                self.invalidates.push(tag);
            }
        }
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.invalidates
    }

    fn error_context(&self) -> MutationError {
        match self.verb {
            Verb::Create => MutationError::Create,
            Verb::Update => MutationError::Update,
            Verb::Delete => MutationError::Delete,
        }
    }

    /// The entity a successful call resolves to when the server did not send one back.
    fn fallback_entity(&self) -> Entity {
        let id_field = self.descriptor.id_field();
        match (self.verb, &self.id) {
            (Verb::Delete, Some(id)) => Entity::tombstone(id_field, id),
            (_, id) => {
                let entity = self
                    .body
                    .clone()
                    .and_then(Entity::from_value)
                    .unwrap_or_default();
                match id {
                    Some(id) if entity.id_in(id_field).is_none() => {
                        entity.with(id_field, id.to_value())
                    }
                    _ => entity,
                }
            }
        }
    }
}

/// Issues commands over the cache's transport and invalidates their tags on success.
///
/// Commands are never serialized against each other and never retried.
pub struct MutationDispatcher<T> {
    cache: RemoteCache<T>,
}

impl<T> Clone for MutationDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<T> MutationDispatcher<T>
where
    T: Transport,
{
    pub fn new(cache: RemoteCache<T>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &RemoteCache<T> {
        &self.cache
    }

    /// Runs `command`. On success the declared tags are invalidated before this resolves;
    /// on failure the cache is left untouched.
    #[instrument(skip_all, name = "dispatcher#mutate", fields(verb = %command.verb, resource = command.descriptor.path()))]
    pub async fn mutate(&self, command: Command) -> MutationResult<Entity> {
        let timeout = self.cache.config().request_timeout;
        let call = self.cache.transport().send(
            command.verb,
            command.descriptor.path(),
            command.id.as_ref(),
            command.body.as_ref(),
        );

        let outcome = tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(RequestError::Timeout(timeout)))
            .and_then(|body| match command.descriptor.adapt_entity(body) {
                Ok(entity) => Ok(Some(entity)),
                Err(RequestError::Decode(reason)) => {
                    debug!(reason, "response carried no entity");
                    Ok(None)
                }
                Err(err) => Err(err),
            });

        let returned = match outcome {
            Ok(returned) => returned,
            Err(err) => {
                warn!(%err, "mutation failed, nothing invalidated");
                metrics::increment_mutations(command.verb, false);
                return Err(Report::new(err).change_context(command.error_context()));
            }
        };

        metrics::increment_mutations(command.verb, true);
        let invalidated = self.cache.invalidate(&command.invalidates);
        debug!(invalidated, "mutation succeeded");

        Ok(returned.unwrap_or_else(|| {
            if command.verb != Verb::Delete {
                warn!("server did not return the {} entity, falling back to the submitted body", command.verb.past_tense());
            }
            command.fallback_entity()
        }))
    }
}
