use crate::Resource;
use crate::tickets::Priority;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{CrossFieldRule, FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("projects", "Project", "Projects");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Project {
    pub id: i64,
    pub project_name: String,
    pub client: String,
    pub start_date: NaiveDate,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub min_budget: Option<f64>,
    #[serde(default)]
    pub max_budget: Option<f64>,
    pub priority: Priority,
}

pub enum ProjectFilter {
    Name(String),
    Client(String),
    Priority(Priority),
    DueBetween(Option<NaiveDate>, Option<NaiveDate>),
}

impl ListFilter for ProjectFilter {
    fn field(&self) -> &'static str {
        match self {
            ProjectFilter::Name(_) => "project_name",
            ProjectFilter::Client(_) => "client",
            ProjectFilter::Priority(_) => "priority",
            ProjectFilter::DueBetween(..) => "deadline",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            ProjectFilter::Name(name) => FilterValue::text(name),
            ProjectFilter::Client(client) => FilterValue::text(client),
            ProjectFilter::Priority(priority) => FilterValue::exact(priority.as_str()),
            ProjectFilter::DueBetween(from, to) => FilterValue::date_range(from, to),
        }
    }
}

pub struct Projects;

impl Resource for Projects {
    type Model = Project;
    type Filter = ProjectFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("project_name", [FieldRule::Required, FieldRule::MaxLength(100)])
            .field("client", [FieldRule::Required])
            .field("start_date", [FieldRule::Required])
            .field("deadline", [FieldRule::Required])
            .field(
                "priority",
                [
                    FieldRule::Required,
                    FieldRule::one_of(Priority::ALL.map(Priority::as_str)),
                ],
            )
            .cross_field(CrossFieldRule::DateNotBefore {
                field: "deadline",
                other: "start_date",
            })
            .cross_field(CrossFieldRule::NotLessThan {
                field: "max_budget",
                other: "min_budget",
            }))
    }
}
