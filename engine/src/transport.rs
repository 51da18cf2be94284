use crate::entity::EntityId;
use crate::error::RequestError;
use crate::query::QueryParams;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type TransportResult<T> = Result<T, RequestError>;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Verb {
    Create,
    Update,
    Delete,
}

impl Verb {
    pub fn method(self) -> &'static str {
        match self {
            Verb::Create => "POST",
            Verb::Update => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Verb::Create => "created",
            Verb::Update => "updated",
            Verb::Delete => "deleted",
        }
    }
}

impl Display for Verb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// The REST boundary. Implementations return the raw response body; normalization
/// happens in the cache layer.
///
/// Every call is expected to carry the caller's credentials and to handle
/// re-authentication itself.
pub trait Transport: Send + Sync + 'static {
    /// `GET /{resource}?{params}`
    fn list(
        &self,
        resource: &str,
        params: &QueryParams,
    ) -> impl Future<Output = TransportResult<Value>> + Send;

    /// `GET /{resource}/{id}`
    fn get(
        &self,
        resource: &str,
        id: &EntityId,
    ) -> impl Future<Output = TransportResult<Value>> + Send;

    /// `POST /{resource}`, `PUT /{resource}/{id}` or `DELETE /{resource}/{id}`
    fn send(
        &self,
        verb: Verb,
        resource: &str,
        id: Option<&EntityId>,
        body: Option<&Value>,
    ) -> impl Future<Output = TransportResult<Value>> + Send;
}

impl<T> Transport for Arc<T>
where
    T: Transport,
{
    async fn list(&self, resource: &str, params: &QueryParams) -> TransportResult<Value> {
        (**self).list(resource, params).await
    }

    async fn get(&self, resource: &str, id: &EntityId) -> TransportResult<Value> {
        (**self).get(resource, id).await
    }

    async fn send(
        &self,
        verb: Verb,
        resource: &str,
        id: Option<&EntityId>,
        body: Option<&Value>,
    ) -> TransportResult<Value> {
        (**self).send(verb, resource, id, body).await
    }
}
