use crate::Resource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sync_engine::feature::FetchPolicy;
use sync_engine::filter::{FilterValue, ListFilter};
use sync_engine::form::{FieldRule, FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("payments", "Payment", "Payments");

pub const INVOICE_PATTERN: &str = r"^INV-\d{4,}$";
pub const AMOUNT_PATTERN: &str = r"^\d+(\.\d{1,2})?$";
pub const METHODS: [&str; 4] = ["Cash", "Card", "Bank transfer", "Cheque"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub invoice_number: String,
    pub client: String,
    pub amount: f64,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub method: Option<String>,
}

pub enum PaymentFilter {
    Client(String),
    Invoice(String),
    Method(String),
    Amount(Option<f64>, Option<f64>),
    PaidBetween(Option<NaiveDate>, Option<NaiveDate>),
}

impl ListFilter for PaymentFilter {
    fn field(&self) -> &'static str {
        match self {
            PaymentFilter::Client(_) => "client",
            PaymentFilter::Invoice(_) => "invoice_number",
            PaymentFilter::Method(_) => "method",
            PaymentFilter::Amount(..) => "amount",
            PaymentFilter::PaidBetween(..) => "payment_date",
        }
    }

    fn into_value(self) -> FilterValue {
        match self {
            PaymentFilter::Client(client) => FilterValue::text(client),
            PaymentFilter::Invoice(invoice) => FilterValue::text(invoice),
            PaymentFilter::Method(method) => FilterValue::exact(method),
            PaymentFilter::Amount(from, to) => FilterValue::number_range(from, to),
            PaymentFilter::PaidBetween(from, to) => FilterValue::date_range(from, to),
        }
    }
}

pub struct Payments;

impl Resource for Payments {
    type Model = Payment;
    type Filter = PaymentFilter;

    fn descriptor() -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn form() -> FormResult<FormSchema> {
        Ok(FormSchema::new()
            .field(
                "invoice_number",
                [
                    FieldRule::Required,
                    FieldRule::pattern(INVOICE_PATTERN, "an invoice number like INV-0001")?,
                ],
            )
            .field("client", [FieldRule::Required])
            .field(
                "amount",
                [
                    FieldRule::Required,
                    FieldRule::pattern(AMOUNT_PATTERN, "an amount with at most two decimals")?,
                ],
            )
            .field("payment_date", [FieldRule::Required])
            .field("method", [FieldRule::one_of(METHODS)]))
    }

    fn fetch_policy() -> FetchPolicy {
        FetchPolicy::ServerPaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};
    use sync_engine::entity::Entity;
    use sync_engine::filter::Filters;

    #[rstest]
    #[case(json!({"invoice_number": "INV-0042", "client": "Acme", "amount": "19.99", "payment_date": "2026-02-01"}), &[])]
    #[case(json!({"invoice_number": "INV-42", "client": "Acme", "amount": 20, "payment_date": "2026-02-01"}), &["invoice_number"])]
    #[case(json!({"invoice_number": "INV-0042", "client": "Acme", "amount": "19.999", "payment_date": "2026-02-01"}), &["amount"])]
    #[case(json!({"invoice_number": "INV-0042", "amount": "1", "method": "Barter"}), &["client", "method", "payment_date"])]
    fn payment_form(#[case] values: Value, #[case] failing: &[&str]) {
        let errors = Payments::form().unwrap().validate(values.as_object().unwrap());

        let fields: Vec<_> = errors.iter().map(|(field, _)| field).collect();
        assert_eq!(failing, fields.as_slice());
    }

    #[test]
    fn amount_range_is_inclusive() {
        let payments: Vec<_> = [10.0, 20.0, 30.5]
            .into_iter()
            .filter_map(|amount| Entity::from_value(json!({"amount": amount})))
            .collect();
        let mut filters = Filters::new();
        filters.apply(PaymentFilter::Amount(Some(20.0), Some(30.5)));

        let matching = payments.iter().filter(|p| filters.matches(p)).count();

        assert_eq!(2, matching);
    }
}
