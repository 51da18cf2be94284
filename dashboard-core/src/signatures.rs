use crate::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

/// Signature requests come from a document store keyed by `_id`.
pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("signatures", "Signature request", "Signatures").with_id_field("_id");

pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Draft,
    Sent,
    Signed,
    Declined,
}

impl SignatureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::Draft => "draft",
            SignatureStatus::Sent => "sent",
            SignatureStatus::Signed => "signed",
            SignatureStatus::Declined => "declined",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignatureRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub signer_name: String,
    pub signer_email: String,
    pub status: SignatureStatus,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

pub enum SignatureFilter {
    Title(String),
    Signer(String),
    Status(SignatureStatus),
}

impl ListFilter for SignatureFilter {
    fn field(&self) -> &'static str {
        match self {
            SignatureFilter::Title(_) => "title",
            SignatureFilter::Signer(_) => "signer_name",
            SignatureFilter::Status(_) => "status",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            SignatureFilter::Title(title) => FilterValue::text(title),
            SignatureFilter::Signer(signer) => FilterValue::text(signer),
            SignatureFilter::Status(status) => FilterValue::exact(status.as_str()),
        }
    }
}

pub struct Signatures;

impl Resource for Signatures {
    type Model = SignatureRequest;
    type Filter = SignatureFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field("title", [FieldRule::Required, FieldRule::MaxLength(150)])
            .field("signer_name", [FieldRule::Required])
            .field(
                "signer_email",
                [
                    FieldRule::Required,
                    FieldRule::pattern(EMAIL_PATTERN, "a valid email address")?,
                ],
            ))
    }
}
