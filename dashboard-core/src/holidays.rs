use crate::Resource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{CrossFieldRule, FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("holidays", "Holiday", "Holidays");

pub const LEAVE_TYPES: [&str; 3] = ["Public", "Optional", "Company"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub id: i64,
    pub holiday_name: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub enum HolidayFilter {
    Name(String),
    LeaveType(String),
    /// Holidays starting within the range.
    Between(Option<NaiveDate>, Option<NaiveDate>),
}

impl ListFilter for HolidayFilter {
    fn field(&self) -> &'static str {
        match self {
            HolidayFilter::Name(_) => "holiday_name",
            HolidayFilter::LeaveType(_) => "leave_type",
            HolidayFilter::Between(..) => "start_date",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            HolidayFilter::Name(name) => FilterValue::text(name),
            HolidayFilter::LeaveType(leave_type) => FilterValue::exact(leave_type),
            HolidayFilter::Between(from, to) => FilterValue::date_range(from, to),
        }
    }
}

pub struct Holidays;

impl Resource for Holidays {
    type Model = Holiday;
    type Filter = HolidayFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("holiday_name", [FieldRule::Required, FieldRule::MaxLength(80)])
            .field(
                "leave_type",
                [FieldRule::Required, FieldRule::one_of(LEAVE_TYPES)],
            )
            .field("start_date", [FieldRule::Required])
            .field("end_date", [FieldRule::Required])
            .cross_field(CrossFieldRule::DateNotBefore {
                field: "end_date",
                other: "start_date",
            }))
    }
}
