use crate::Pagination;
use crate::entity::{Entity, EntityId};
use crate::error::UiStateError;
use crate::filter::{FilterValue, Filters, ListFilter};
use crate::projection::{Direction, Sort};
use error_stack::Report;

#[derive(Debug, PartialEq, Clone, Default)]
pub enum ModalMode {
    #[default]
    Closed,
    Creating,
    /// Holds a snapshot of the entity; editing it never touches the cache.
    Editing(Entity),
}

/// What a submit of the open modal should do.
#[derive(Debug, PartialEq, Clone)]
pub enum SubmitTarget {
    Create,
    Update(EntityId),
}

/// Ephemeral state of one feature's list view and modal. Owned by that feature only.
#[derive(Debug, PartialEq, Clone)]
pub struct UiState {
    modal: ModalMode,
    filters: Filters,
    sort: Option<Sort>,
    pagination: Pagination,
}

impl UiState {
    pub fn new(default_page_size: u64) -> Self {
        Self {
            modal: ModalMode::Closed,
            filters: Filters::new(),
            sort: None,
            pagination: Pagination::with_page_size(1, default_page_size),
        }
    }

    /// `None` opens the modal for creating, `Some` for editing that entity.
    /// Opening an already open modal re-targets it.
    pub fn open(&mut self, entity: Option<Entity>) {
        self.modal = match entity {
            Some(entity) => ModalMode::Editing(entity),
            None => ModalMode::Creating,
        };
    }

    pub fn close(&mut self) {
        self.modal = ModalMode::Closed;
    }

    pub fn modal(&self) -> &ModalMode {
        &self.modal
    }

    pub fn is_modal_open(&self) -> bool {
        self.modal != ModalMode::Closed
    }

    pub fn selected_entity(&self) -> Option<&Entity> {
        match &self.modal {
            ModalMode::Editing(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn set_filters<I, K>(&mut self, partial: I)
    where
        I: IntoIterator<Item = (K, FilterValue)>,
        K: Into<String>,
    {
        self.filters.merge(partial);
        self.reset_page();
    }

    pub fn apply_filter<F: ListFilter>(&mut self, filter: F) {
        self.filters.apply(filter);
        self.reset_page();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filters.set_search(search);
        self.reset_page();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.reset_page();
    }

    pub fn set_sort(&mut self, field: impl Into<String>, direction: Direction) {
        self.sort = Some(Sort::new(field, direction));
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    pub fn set_page(&mut self, page: u64) {
        self.pagination.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: u64) {
        self.pagination.page_size = Some(page_size.max(1));
        self.reset_page();
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Fails fast when the modal is closed: there is nothing to submit.
    pub fn begin_submit(&self, id_field: &str) -> Result<SubmitTarget, Report<UiStateError>> {
        match &self.modal {
            ModalMode::Closed => Err(Report::new(UiStateError::ModalClosed)),
            ModalMode::Creating => Ok(SubmitTarget::Create),
            ModalMode::Editing(entity) => entity
                .id_in(id_field)
                .map(SubmitTarget::Update)
                .ok_or_else(|| {
                    Report::new(UiStateError::MissingId)
                        .attach(format!("expected an id in field '{id_field}'"))
                }),
        }
    }

    fn reset_page(&mut self) {
        self.pagination = self.pagination.first_page();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn holiday() -> Entity {
        Entity::from_value(json!({"id": 3, "holiday_name": "Diwali"})).unwrap()
    }

    #[rstest]
    #[case::from_creating(None)]
    #[case::from_editing(Some(holiday()))]
    fn close_always_resets_the_modal(#[case] opened_with: Option<Entity>) {
        let mut state = UiState::new(10);
        state.open(opened_with);
        assert!(state.is_modal_open());

        state.close();

        assert!(!state.is_modal_open());
        assert_eq!(None, state.selected_entity());
        assert_eq!(&ModalMode::Closed, state.modal());
    }

    #[test]
    fn filter_changes_merge_and_reset_the_page() {
        let mut state = UiState::new(10);
        state.set_page(4);

        state.set_filters([("status", FilterValue::exact("open"))]);
        assert_eq!(1, state.pagination().page);

        state.set_page(2);
        state.set_filters([("priority", FilterValue::exact("high"))]);

        assert_eq!(1, state.pagination().page);
        assert_eq!(Some(&FilterValue::exact("open")), state.filters().get("status"));
        assert_eq!(Some(&FilterValue::exact("high")), state.filters().get("priority"));
    }

    #[test]
    fn page_size_change_resets_the_page() {
        let mut state = UiState::new(10);
        state.set_page(3);

        state.set_page_size(25);

        assert_eq!(Pagination::with_page_size(1, 25), *state.pagination());
    }

    #[test]
    fn sort_and_page_do_not_touch_filters() {
        let mut state = UiState::new(10);
        state.set_search("diw");
        state.set_sort("holiday_date", Direction::Desc);
        state.set_page(2);

        assert_eq!(Some("diw"), state.filters().search());
        assert_eq!(Some(&Sort::desc("holiday_date")), state.sort());
        assert_eq!(2, state.pagination().page);
    }

    #[test]
    fn reopening_retargets_the_modal() {
        let mut state = UiState::new(10);
        state.open(Some(holiday()));
        state.open(None);

        assert_eq!(&ModalMode::Creating, state.modal());
    }

    #[test]
    fn submit_targets_follow_the_modal() {
        let mut state = UiState::new(10);
        let closed = state.begin_submit("id").unwrap_err();
        assert!(matches!(closed.current_context(), UiStateError::ModalClosed));

        state.open(None);
        assert_eq!(SubmitTarget::Create, state.begin_submit("id").unwrap());

        state.open(Some(holiday()));
        assert_eq!(
            SubmitTarget::Update(EntityId::Number(3)),
            state.begin_submit("id").unwrap()
        );

        let missing = state.begin_submit("_id").unwrap_err();
        assert!(matches!(missing.current_context(), UiStateError::MissingId));
    }
}
