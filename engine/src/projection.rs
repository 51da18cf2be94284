use crate::Pagination;
use crate::entity::Entity;
use crate::filter::{Filters, as_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }

    /// Missing values go last in both directions.
    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        match (sort_key(a.get(&self.field)), sort_key(b.get(&self.field))) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => match self.direction {
                Direction::Asc => a.cmp(&b),
                Direction::Desc => b.cmp(&a),
            },
        }
    }
}

/// What a table renders: one page of rows and the number of rows across all pages.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Projection {
    pub rows: Vec<Entity>,
    pub total_count: usize,
}

/// Filters, sorts and pages `entities` without touching them.
///
/// The sort is stable, so rows that compare equal keep their arrival order.
pub fn project(
    entities: &[Entity],
    filters: &Filters,
    sort: Option<&Sort>,
    pagination: &Pagination,
) -> Projection {
    let mut matched: Vec<&Entity> = entities.iter().filter(|e| filters.matches(e)).collect();

    if let Some(sort) = sort {
        matched.sort_by(|a, b| sort.compare(a, b));
    }

    let total_count = matched.len();
    let (start, end) = pagination.bounds(total_count);

    Projection {
        rows: matched[start..end].iter().map(|e| (*e).clone()).collect(),
        total_count,
    }
}

#[derive(Debug, PartialEq)]
enum SortKey {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Bool(_) => 0,
            SortKey::Number(_) => 1,
            SortKey::Text(_) => 2,
        }
    }
}

fn sort_key(value: Option<&Value>) -> Option<SortKey> {
    match value? {
        Value::Bool(b) => Some(SortKey::Bool(*b)),
        number @ Value::Number(_) => as_number(number).map(SortKey::Number),
        Value::String(s) => Some(SortKey::Text(s.to_lowercase())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterValue;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn entities(values: Value) -> Vec<Entity> {
        serde_json::from_value(values).unwrap()
    }

    fn ids(projection: &Projection) -> Vec<i64> {
        projection
            .rows
            .iter()
            .filter_map(|e| e.get("id").and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn text_filter_is_case_insensitive_substring() {
        let holidays = entities(json!([
            {"id": 1, "holiday_name": "Diwali"},
            {"id": 2, "holiday_name": "Christmas"}
        ]));
        let filters = Filters::new().with("holiday_name", FilterValue::text("Diw"));

        let projection = project(&holidays, &filters, None, &Pagination::unpaged());

        assert_eq!(vec![1], ids(&projection));
        assert_eq!(1, projection.total_count);
    }

    #[test]
    fn no_filters_returns_everything_in_arrival_order() {
        let pipelines = entities(json!([{"id": 1, "pipeline_name": "Sales"}]));

        let projection = project(&pipelines, &Filters::new(), None, &Pagination::unpaged());

        assert_eq!(pipelines, projection.rows);
        assert_eq!(1, projection.total_count);
    }

    #[rstest]
    #[case::ascending(Sort::asc("name"), vec![3, 1, 4, 2])]
    #[case::descending(Sort::desc("name"), vec![1, 4, 3, 2])]
    fn sort_is_stable_and_puts_missing_last(#[case] sort: Sort, #[case] expected: Vec<i64>) {
        let rows = entities(json!([
            {"id": 1, "name": "beta"},
            {"id": 2, "name": null},
            {"id": 3, "name": "Alpha"},
            {"id": 4, "name": "Beta"}
        ]));

        let projection = project(&rows, &Filters::new(), Some(&sort), &Pagination::unpaged());

        assert_eq!(expected, ids(&projection));
    }

    #[test]
    fn numbers_sort_numerically() {
        let rows = entities(json!([
            {"id": 1, "amount": 100},
            {"id": 2, "amount": 20.5},
            {"id": 3, "amount": 3}
        ]));

        let projection = project(&rows, &Filters::new(), Some(&Sort::asc("amount")), &Pagination::unpaged());

        assert_eq!(vec![3, 2, 1], ids(&projection));
    }

    #[rstest]
    #[case::first_page(1, vec![1, 2])]
    #[case::page_zero_is_first_page(0, vec![1, 2])]
    #[case::last_partial_page(3, vec![5])]
    #[case::past_the_end(9, vec![])]
    fn pagination_is_one_based(#[case] page: u64, #[case] expected: Vec<i64>) {
        let rows = entities(json!([{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}, {"id": 5}]));

        let projection = project(&rows, &Filters::new(), None, &Pagination::with_page_size(page, 2));

        assert_eq!(expected, ids(&projection));
        assert_eq!(5, projection.total_count);
    }

    #[test]
    fn total_count_is_filtered_but_unpaged() {
        let rows = entities(json!([
            {"id": 1, "status": "open"},
            {"id": 2, "status": "closed"},
            {"id": 3, "status": "open"},
            {"id": 4}
        ]));
        let filters = Filters::new().with("status", FilterValue::exact("open"));

        let projection = project(&rows, &filters, None, &Pagination::with_page_size(1, 1));

        assert_eq!(vec![1], ids(&projection));
        assert_eq!(2, projection.total_count);
    }

    fn arb_entity() -> impl Strategy<Value = Entity> {
        (
            any::<i64>(),
            proptest::option::of("[a-zA-Z ]{0,8}"),
            proptest::option::of(-1000i64..1000),
        )
            .prop_map(|(id, name, amount)| {
                let mut entity = Entity::default().with("id", id);
                if let Some(name) = name {
                    entity = entity.with("name", name);
                }
                if let Some(amount) = amount {
                    entity = entity.with("amount", amount);
                }
                entity
            })
    }

    proptest! {
        #[test]
        fn projection_is_pure(
            rows in proptest::collection::vec(arb_entity(), 0..40),
            needle in "[a-z]{0,2}",
            descending in any::<bool>(),
            page in 0u64..6,
            page_size in 1u64..10,
        ) {
            let before = rows.clone();
            let filters = Filters::new().with("name", FilterValue::text(needle));
            let sort = if descending { Sort::desc("amount") } else { Sort::asc("name") };
            let pagination = Pagination::with_page_size(page, page_size);

            let first = project(&rows, &filters, Some(&sort), &pagination);
            let second = project(&rows, &filters, Some(&sort), &pagination);

            prop_assert_eq!(&before, &rows);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.rows.len() as u64 <= page_size);
            prop_assert!(first.total_count <= rows.len());
        }
    }
}
