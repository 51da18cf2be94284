use crate::entity::Entity;
use crate::query::QueryParams;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeMap;

/// A typed filter of one resource, e.g. `TicketFilter::Status(..)`.
///
/// Each variant names the entity field it applies to. Applying a filter whose value is
/// empty removes that field's filter.
pub trait ListFilter {
    fn field(&self) -> &'static str;
    fn into_value(self) -> FilterValue;
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Bound {
    Number(f64),
    Date(NaiveDate),
}

impl Bound {
    /// `YYYY-MM-DD` is a date, anything else that parses as a number is a number.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Bound::Date)
            .ok()
            .or_else(|| raw.parse::<f64>().ok().filter(|n| n.is_finite()).map(Bound::Number))
    }

    fn to_param(self) -> String {
        match self {
            Bound::Number(n) => n.to_string(),
            Bound::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a filter travels as a query parameter. Plain `field=value` is an exact match,
/// the other operators are suffixed to the field: `subject[contains]=vpn`,
/// `amount[from]=10`, `amount[to]=99`.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FilterOp {
    Exact,
    Contains,
    From,
    To,
}

impl FilterOp {
    const SUFFIXED: [FilterOp; 3] = [FilterOp::Contains, FilterOp::From, FilterOp::To];

    fn suffix(self) -> &'static str {
        match self {
            FilterOp::Exact => "",
            FilterOp::Contains => "[contains]",
            FilterOp::From => "[from]",
            FilterOp::To => "[to]",
        }
    }

    pub fn param(self, field: &str) -> String {
        format!("{field}{}", self.suffix())
    }

    /// Splits a query key into its field and operator.
    pub fn split(key: &str) -> (&str, FilterOp) {
        Self::SUFFIXED
            .into_iter()
            .find_map(|op| {
                key.strip_suffix(op.suffix())
                    .filter(|field| !field.is_empty())
                    .map(|field| (field, op))
            })
            .unwrap_or((key, FilterOp::Exact))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum FilterValue {
    /// Case insensitive substring.
    Text(String),
    /// Inclusive on both ends; an open end is `None`.
    Range {
        from: Option<Bound>,
        to: Option<Bound>,
    },
    Exact(Value),
}

impl FilterValue {
    pub fn text(needle: impl Into<String>) -> Self {
        FilterValue::Text(needle.into())
    }

    pub fn exact(value: impl Into<Value>) -> Self {
        FilterValue::Exact(value.into())
    }

    pub fn number_range(from: Option<f64>, to: Option<f64>) -> Self {
        FilterValue::Range {
            from: from.map(Bound::Number),
            to: to.map(Bound::Number),
        }
    }

    pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        FilterValue::Range {
            from: from.map(Bound::Date),
            to: to.map(Bound::Date),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Text(needle) => needle.trim().is_empty(),
            FilterValue::Range { from, to } => from.is_none() && to.is_none(),
            FilterValue::Exact(Value::Null) => true,
            FilterValue::Exact(Value::String(s)) => s.trim().is_empty(),
            FilterValue::Exact(_) => false,
        }
    }

    /// Whether an entity's `value` for the filtered field passes. Absent or mistyped
    /// values never match.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return false;
        };

        match self {
            FilterValue::Text(needle) => text_of(value)
                .is_some_and(|text| contains_ignore_case(&text, needle.trim())),
            FilterValue::Range { from, to } => {
                let above = from.is_none_or(|from| {
                    compare_bound(value, &from).is_some_and(|o| o.is_ge())
                });
                let below =
                    to.is_none_or(|to| compare_bound(value, &to).is_some_and(|o| o.is_le()));
                above && below
            }
            FilterValue::Exact(expected) => exact_eq(value, expected),
        }
    }

    /// The query parameters that ask a server for the same filter on `field`.
    fn query_pairs(&self, field: &str) -> Vec<(String, String)> {
        match self {
            FilterValue::Text(needle) => {
                vec![(FilterOp::Contains.param(field), needle.trim().to_string())]
            }
            FilterValue::Range { from, to } => [(FilterOp::From, from), (FilterOp::To, to)]
                .into_iter()
                .filter_map(|(op, bound)| bound.map(|b| (op.param(field), b.to_param())))
                .collect(),
            FilterValue::Exact(value) => match value {
                Value::String(s) => vec![(field.to_string(), s.clone())],
                Value::Number(_) | Value::Bool(_) => vec![(field.to_string(), value.to_string())],
                _ => Vec::new(),
            },
        }
    }
}

/// The filter map of one list view, plus its free text search.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Filters {
    fields: BTreeMap<String, FilterValue>,
    search: Option<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.merge([(field, value)]);
        self
    }

    /// Shallow merge: every given field replaces the existing one, empty values remove it,
    /// fields not mentioned are kept.
    pub fn merge<I, K>(&mut self, partial: I)
    where
        I: IntoIterator<Item = (K, FilterValue)>,
        K: Into<String>,
    {
        for (field, value) in partial {
            let field = field.into();
            if value.is_empty() {
                self.fields.remove(&field);
            } else {
                self.fields.insert(field, value);
            }
        }
    }

    pub fn apply<F: ListFilter>(&mut self, filter: F) {
        let field = filter.field();
        self.merge([(field, filter.into_value())]);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then(|| search.trim().to_string());
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.search.is_none()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.search = None;
    }

    /// An entity matches when it passes the search and every field filter.
    pub fn matches(&self, entity: &Entity) -> bool {
        let searched = self
            .search
            .as_deref()
            .is_none_or(|needle| matches_search(entity, needle));

        searched
            && self
                .fields
                .iter()
                .all(|(field, filter)| filter.matches(entity.get(field)))
    }

    /// Adds the search and every field filter to `params`, see [`FilterOp`].
    pub fn to_query(&self, mut params: QueryParams) -> QueryParams {
        if let Some(search) = &self.search {
            params = params.search(search.clone());
        }
        for (field, filter) in &self.fields {
            for (key, value) in filter.query_pairs(field) {
                params = params.with(key, value);
            }
        }
        params
    }
}

fn matches_search(entity: &Entity, needle: &str) -> bool {
    entity.attributes().values().any(|value| match value {
        Value::String(_) | Value::Number(_) => {
            text_of(value).is_some_and(|text| contains_ignore_case(&text, needle))
        }
        _ => false,
    })
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_bound(value: &Value, bound: &Bound) -> Option<std::cmp::Ordering> {
    match bound {
        Bound::Number(bound) => as_number(value)?.partial_cmp(bound),
        Bound::Date(bound) => Some(parse_date(value)?.cmp(bound)),
    }
}

fn exact_eq(value: &Value, expected: &Value) -> bool {
    match (value, expected) {
        (Value::Number(_), Value::Number(_) | Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            matches!((as_number(value), as_number(expected)), (Some(a), Some(b)) if a == b)
        }
        _ => value == expected,
    }
}

/// Numbers and numeric strings.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `YYYY-MM-DD`, RFC 3339, or an RFC 3339 timestamp without offset.
pub(crate) fn parse_date(value: &Value) -> Option<NaiveDate> {
    let raw = value.as_str()?.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).unwrap()
    }

    #[rstest]
    #[case::substring(json!("Diwali"), "diw", true)]
    #[case::no_substring(json!("Christmas"), "diw", false)]
    #[case::number_as_text(json!(2024), "02", true)]
    #[case::array_never_matches(json!(["Diwali"]), "diw", false)]
    fn text_filter(#[case] value: Value, #[case] needle: &str, #[case] expected: bool) {
        assert_eq!(expected, FilterValue::text(needle).matches(Some(&value)));
    }

    #[rstest]
    #[case::inside(json!("2024-11-01"), true)]
    #[case::lower_edge(json!("2024-10-01"), true)]
    #[case::upper_edge_rfc3339(json!("2024-12-31T18:30:00.000Z"), true)]
    #[case::before(json!("2024-09-30"), false)]
    #[case::malformed(json!("next week"), false)]
    fn date_range_filter(#[case] value: Value, #[case] expected: bool) {
        let filter = FilterValue::date_range(
            NaiveDate::from_ymd_opt(2024, 10, 1),
            NaiveDate::from_ymd_opt(2024, 12, 31),
        );
        assert_eq!(expected, filter.matches(Some(&value)));
    }

    #[rstest]
    #[case::number(json!(150), true)]
    #[case::numeric_string(json!("99.5"), false)]
    #[case::open_upper_end(json!(1_000_000), true)]
    fn number_range_filter(#[case] value: Value, #[case] expected: bool) {
        let filter = FilterValue::number_range(Some(100.0), None);
        assert_eq!(expected, filter.matches(Some(&value)));
    }

    #[rstest]
    #[case::same_string(json!("open"), json!("open"), true)]
    #[case::case_matters(json!("Open"), json!("open"), false)]
    #[case::numbers_numerically(json!(5.0), json!(5), true)]
    #[case::numeric_query_string(json!(5), json!("5"), true)]
    #[case::bools(json!(true), json!(true), true)]
    fn exact_filter(#[case] value: Value, #[case] expected: Value, #[case] matches: bool) {
        assert_eq!(matches, FilterValue::Exact(expected).matches(Some(&value)));
    }

    #[test]
    fn missing_field_never_matches() {
        assert!(!FilterValue::text("x").matches(None));
        assert!(!FilterValue::number_range(None, Some(1.0)).matches(Some(&Value::Null)));
    }

    #[test]
    fn merge_is_shallow_and_empty_values_remove() {
        let mut filters = Filters::new().with("status", FilterValue::exact("open"));
        filters.merge([("priority", FilterValue::exact("high"))]);
        assert_eq!(2, filters.len());

        filters.merge([("status", FilterValue::text(""))]);
        assert_eq!(None, filters.get("status"));
        assert_eq!(Some(&FilterValue::exact("high")), filters.get("priority"));
    }

    #[test]
    fn search_matches_any_top_level_text() {
        let mut filters = Filters::new();
        filters.set_search("  MARK ");

        assert!(filters.matches(&entity(json!({"id": 1, "pipeline_name": "Marketing"}))));
        assert!(!filters.matches(&entity(json!({"id": 2, "nested": {"name": "Marketing"}}))));
        assert_eq!(Some("MARK"), filters.search());
    }

    #[test]
    fn server_side_params_keep_the_filter_kind() {
        let filters = Filters::new()
            .with("status", FilterValue::exact("open"))
            .with("subject", FilterValue::text(" printer "))
            .with("amount", FilterValue::number_range(Some(1.5), None))
            .with(
                "paid_on",
                FilterValue::date_range(None, NaiveDate::from_ymd_opt(2024, 3, 1)),
            );

        let params = filters.to_query(QueryParams::new());

        let extra: Vec<_> = params
            .extra()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            vec![
                ("amount[from]", "1.5"),
                ("paid_on[to]", "2024-03-01"),
                ("status", "open"),
                ("subject[contains]", "printer"),
            ],
            extra
        );
    }

    #[rstest]
    #[case("subject[contains]", ("subject", FilterOp::Contains))]
    #[case("amount[from]", ("amount", FilterOp::From))]
    #[case("amount[to]", ("amount", FilterOp::To))]
    #[case("status", ("status", FilterOp::Exact))]
    #[case("[contains]", ("[contains]", FilterOp::Exact))]
    fn query_keys_split_into_field_and_operator(#[case] key: &str, #[case] expected: (&str, FilterOp)) {
        assert_eq!(expected, FilterOp::split(key));
    }

    #[rstest]
    #[case("2024-03-01", Some(Bound::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())))]
    #[case(" 12.5 ", Some(Bound::Number(12.5)))]
    #[case("NaN", None)]
    #[case("soon", None)]
    fn bounds_parse(#[case] raw: &str, #[case] expected: Option<Bound>) {
        assert_eq!(expected, Bound::parse(raw));
    }
}
