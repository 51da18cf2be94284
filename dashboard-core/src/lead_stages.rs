use crate::Resource;
use crate::pipelines;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;
use sync_engine::tag::Tag;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("lead-stages", "Lead stage", "LeadStages");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LeadStage {
    pub id: i64,
    pub stage_name: String,
    pub pipeline_id: i64,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub probability: Option<f64>,
}

pub enum LeadStageFilter {
    Name(String),
    Pipeline(i64),
}

impl ListFilter for LeadStageFilter {
    fn field(&self) -> &'static str {
        match self {
            LeadStageFilter::Name(_) => "stage_name",
            LeadStageFilter::Pipeline(_) => "pipeline_id",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            LeadStageFilter::Name(name) => FilterValue::text(name),
            LeadStageFilter::Pipeline(id) => FilterValue::exact(id),
        }
    }
}

pub struct LeadStages;

impl Resource for LeadStages {
    type Model = LeadStage;
    type Filter = LeadStageFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("stage_name", [FieldRule::Required, FieldRule::MaxLength(60)])
            .field("pipeline_id", [FieldRule::Required])
            .field(
                "probability",
                [FieldRule::pattern(r"^(100|\d{1,2})$", "a percentage between 0 and 100")?],
            ))
    }

    /// Pipelines show their stage count.
    fn invalidates() -> Vec<Tag> {
        vec![pipelines::DESCRIPTOR.tag().clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_engine::entity::{Entity, EntityId};
    use sync_engine::filter::Filters;
    use sync_engine::projection::project;
    use sync_engine::Pagination;

    #[test]
    fn pipeline_filter_matches_exactly() {
        let stages = [
            Entity::from_value(json!({"id": 1, "stage_name": "New", "pipeline_id": 1})).unwrap(),
            Entity::from_value(json!({"id": 2, "stage_name": "New", "pipeline_id": 11})).unwrap(),
        ];
        let mut filters = Filters::new();
        filters.apply(LeadStageFilter::Pipeline(1));

        let projection = project(&stages, &filters, None, &Pagination::unpaged());

        assert_eq!(1, projection.total_count);
        assert_eq!(Some(EntityId::Number(1)), projection.rows[0].id());
    }

    #[test]
    fn probability_must_be_a_percentage() {
        let schema = LeadStages::form().unwrap();
        let values = json!({"stage_name": "Won", "pipeline_id": 1, "probability": "120"});

        let errors = schema.validate(values.as_object().unwrap());

        assert_eq!(1, errors.len());
        assert_eq!(
            ["must be a percentage between 0 and 100"],
            errors.get("probability")
        );
    }
}
