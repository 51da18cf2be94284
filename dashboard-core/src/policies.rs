use crate::Resource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("policies", "Policy", "Policies");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Policy {
    pub id: i64,
    pub policy_name: String,
    pub department: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

pub enum PolicyFilter {
    Name(String),
    Department(String),
    EffectiveBetween(Option<NaiveDate>, Option<NaiveDate>),
}

impl ListFilter for PolicyFilter {
    fn field(&self) -> &'static str {
        match self {
            PolicyFilter::Name(_) => "policy_name",
            PolicyFilter::Department(_) => "department",
            PolicyFilter::EffectiveBetween(..) => "effective_date",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            PolicyFilter::Name(name) => FilterValue::text(name),
            PolicyFilter::Department(department) => FilterValue::exact(department),
            PolicyFilter::EffectiveBetween(from, to) => FilterValue::date_range(from, to),
        }
    }
}

pub struct Policies;

impl Resource for Policies {
    type Model = Policy;
    type Filter = PolicyFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("policy_name", [FieldRule::Required, FieldRule::MaxLength(120)])
            .field("department", [FieldRule::Required])
            .field("description", [FieldRule::MaxLength(2000)]))
    }
}
