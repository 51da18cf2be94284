use crate::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_engine::feature::FetchPolicy;
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor::new("tickets", "Ticket", "Tickets");

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    pub subject: String,
    #[serde(default)]
    pub assignee: Option<String>,
    pub priority: Priority,
    pub status: TicketStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub enum TicketFilter {
    Subject(String),
    Assignee(String),
    Status(TicketStatus),
    Priority(Priority),
}

impl ListFilter for TicketFilter {
    fn field(&self) -> &'static str {
        match self {
            TicketFilter::Subject(_) => "subject",
            TicketFilter::Assignee(_) => "assignee",
            TicketFilter::Status(_) => "status",
            TicketFilter::Priority(_) => "priority",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            TicketFilter::Subject(subject) => FilterValue::text(subject),
            TicketFilter::Assignee(assignee) => FilterValue::text(assignee),
            TicketFilter::Status(status) => FilterValue::exact(status.as_str()),
            TicketFilter::Priority(priority) => FilterValue::exact(priority.as_str()),
        }
    }
}

pub struct Tickets;

impl Resource for Tickets {
    type Model = Ticket;
    type Filter = TicketFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field(
                "subject",
                [FieldRule::Required, FieldRule::MinLength(3), FieldRule::MaxLength(120)],
            )
            .field(
                "priority",
                [
                    FieldRule::Required,
                    FieldRule::one_of(Priority::ALL.map(Priority::as_str)),
                ],
            )
            .field(
                "status",
                [
                    FieldRule::Required,
                    FieldRule::one_of(TicketStatus::ALL.map(TicketStatus::as_str)),
                ],
            ))
    }

    /// The ticket queue is large; the server pages and filters it.
    fn fetch_policy() -> FetchPolicy {
        FetchPolicy::ServerPaged
    }
}
