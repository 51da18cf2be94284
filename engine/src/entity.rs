use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

pub const DEFAULT_ID_FIELD: &str = "id";

/// The stable identifier of a server owned record.
/// Backends hand out either integer keys or opaque strings (uuids, object ids).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityId::Number),
            Value::String(s) if !s.is_empty() => Some(EntityId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Number(n) => Value::from(*n),
            EntityId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{n}"),
            EntityId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Text(value)
    }
}

/// A single record of some resource. The attribute shape is fixed per resource but
/// not known to the cache, so it is kept as a JSON object.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Only JSON objects are entities.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(attributes) => Some(Self(attributes)),
            _ => None,
        }
    }

    /// What is left of a record after a delete whose response had no body.
    pub fn tombstone(id_field: &str, id: &EntityId) -> Self {
        let mut attributes = Map::new();
        attributes.insert(id_field.to_string(), id.to_value());
        Self(attributes)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id_in(DEFAULT_ID_FIELD)
    }

    pub fn id_in(&self, id_field: &str) -> Option<EntityId> {
        self.0.get(id_field).and_then(EntityId::from_value)
    }

    /// Looks up a field, following `.` separated paths into nested objects,
    /// e.g. `pipeline.pipeline_name`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        let mut segments = field.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}
