use crate::Resource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{CrossFieldRule, FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("trainings", "Training", "Trainings");

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    Active,
    Inactive,
}

impl TrainingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrainingStatus::Active => "active",
            TrainingStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Training {
    pub id: i64,
    pub training_type: String,
    pub trainer: String,
    #[serde(default)]
    pub employees: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub cost: Option<f64>,
    pub status: TrainingStatus,
    #[serde(default)]
    pub description: Option<String>,
}

pub enum TrainingFilter {
    Type(String),
    Trainer(String),
    Status(TrainingStatus),
}

impl ListFilter for TrainingFilter {
    fn field(&self) -> &'static str {
        match self {
            TrainingFilter::Type(_) => "training_type",
            TrainingFilter::Trainer(_) => "trainer",
            TrainingFilter::Status(_) => "status",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            TrainingFilter::Type(training_type) => FilterValue::text(training_type),
            TrainingFilter::Trainer(trainer) => FilterValue::text(trainer),
            TrainingFilter::Status(status) => FilterValue::exact(status.as_str()),
        }
    }
}

pub struct Trainings;

impl Resource for Trainings {
    type Model = Training;
    type Filter = TrainingFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("training_type", [FieldRule::Required])
            .field("trainer", [FieldRule::Required])
            .field("start_date", [FieldRule::Required])
            .field("end_date", [FieldRule::Required])
            .field("cost", [FieldRule::pattern(r"^\d+(\.\d{1,2})?$", "an amount")?])
            .field(
                "status",
                [
                    FieldRule::Required,
                    FieldRule::one_of([
                        TrainingStatus::Active.as_str(),
                        TrainingStatus::Inactive.as_str(),
                    ]),
                ],
            )
            .field("description", [FieldRule::MaxLength(500)])
            .cross_field(CrossFieldRule::DateNotBefore {
                field: "end_date",
                other: "start_date",
            }))
    }
}
