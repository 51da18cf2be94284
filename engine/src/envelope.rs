//! Normalization of response bodies at the cache boundary.
//!
//! The REST API answers either with an envelope `{ success, data, message }` or with a bare
//! array/object. Everything past this module only ever sees [`Entity`] values.

use crate::entity::Entity;
use crate::error::RequestError;
use serde_json::Value;
use tracing::warn;

const SUCCESS_FIELD: &str = "success";
const DATA_FIELD: &str = "data";
const MESSAGE_FIELD: &str = "message";
const TOTAL_FIELD: &str = "total";

pub type CollectionAdapter = fn(Value, &str) -> Result<Page, RequestError>;
pub type EntityAdapter = fn(Value, &str) -> Result<Entity, RequestError>;

/// One list response: its records plus the unpaged match count, when the server sent one.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Page {
    pub entities: Vec<Entity>,
    pub total: Option<usize>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Strips the `{ success, data, message }` envelope if there is one.
/// A `success: false` body is turned into [`RequestError::Rejected`].
pub fn unwrap_envelope(body: Value) -> Result<Value, RequestError> {
    let Value::Object(mut fields) = body else {
        return Ok(body);
    };

    let Some(success) = fields.get(SUCCESS_FIELD).and_then(Value::as_bool) else {
        return Ok(Value::Object(fields));
    };

    if !success {
        return Err(RequestError::Rejected {
            message: message_of(&fields),
        });
    }

    Ok(fields.remove(DATA_FIELD).unwrap_or(Value::Null))
}

/// The `message` field of an error body, if it has one.
pub fn error_message(body: &Value) -> Option<String> {
    body.as_object().and_then(message_of)
}

fn message_of(fields: &serde_json::Map<String, Value>) -> Option<String> {
    fields
        .get(MESSAGE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Default collection adapter.
///
/// Anything that is not an array is coerced to an empty collection, but loudly: the
/// backend contract says lists are arrays, so a different shape is worth a log line.
pub fn collection(body: Value, resource: &str) -> Result<Page, RequestError> {
    let total = total_of(&body);
    let data = unwrap_envelope(body)?;

    let items = match data {
        Value::Array(items) => items,
        other => {
            warn!(
                resource,
                received = value_kind(&other),
                "list response was not an array, treating it as an empty collection"
            );
            return Ok(Page::default());
        }
    };

    let received = items.len();
    let entities: Vec<Entity> = items.into_iter().filter_map(Entity::from_value).collect();

    if entities.len() != received {
        warn!(
            resource,
            dropped = received - entities.len(),
            "list response contained items that were not objects"
        );
    }

    Ok(Page { entities, total })
}

/// The envelope's `total`, ignored unless it is a non-negative integer.
fn total_of(body: &Value) -> Option<usize> {
    body.get(TOTAL_FIELD)
        .and_then(Value::as_u64)
        .and_then(|total| usize::try_from(total).ok())
}

/// Default single entity adapter.
pub fn entity(body: Value, resource: &str) -> Result<Entity, RequestError> {
    let data = unwrap_envelope(body)?;
    let kind = value_kind(&data);
    Entity::from_value(data)
        .ok_or_else(|| RequestError::Decode(format!("expected a {resource} object, got {kind}")))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
