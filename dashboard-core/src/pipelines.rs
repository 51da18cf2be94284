use crate::Resource;
use crate::lead_stages;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;
use sync_engine::tag::Tag;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("pipelines", "Pipeline", "Pipelines");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub id: i64,
    pub pipeline_name: String,
}

pub enum PipelineFilter {
    Name(String),
}

impl ListFilter for PipelineFilter {
    fn field(&self) -> &'static str {
        match self {
            PipelineFilter::Name(_) => "pipeline_name",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            PipelineFilter::Name(name) => FilterValue::text(name),
        }
    }
}

pub struct Pipelines;

impl Resource for Pipelines {
    type Model = Pipeline;
    type Filter = PipelineFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new().field(
            "pipeline_name",
            [FieldRule::Required, FieldRule::MaxLength(100)],
        ))
    }

    /// Stages list their pipeline by name.
    fn invalidates() -> Vec<Tag> {
        vec![lead_stages::DESCRIPTOR.tag().clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use sync_engine::entity::Entity;

    #[test]
    fn decodes_a_pipeline() {
        let entity = Entity::from_value(json!({"id": 1, "pipeline_name": "Sales"})).unwrap();

        let pipeline = Pipelines::decode(&entity).unwrap();

        assert_eq!(
            Pipeline {
                id: 1,
                pipeline_name: "Sales".to_string()
            },
            pipeline
        );
    }

    #[test]
    fn name_is_required() {
        let errors = Pipelines::form().unwrap().validate(&Map::new());

        assert_eq!(["is required"], errors.get("pipeline_name"));
    }
}
