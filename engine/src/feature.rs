//! One list-and-modal feature of the dashboard, wired together once for every resource.

use crate::cache::{EntrySnapshot, LiveQuery, Status};
use crate::entity::{Entity, EntityId};
use crate::form::{CommandSurface, FormResult, FormSchema, Notification, SubmitOutcome};
use crate::mutation::{Command, MutationDispatcher};
use crate::projection::{Projection, project};
use crate::query::QueryParams;
use crate::resource::ResourceDescriptor;
use crate::tag::Tag;
use crate::transport::{Transport, Verb};
use crate::ui_state::UiState;
use crate::Pagination;
use serde_json::{Map, Value};
use tracing::{info, instrument};

/// Where filtering and pagination happen.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum FetchPolicy {
    /// Load the whole collection once and page it locally.
    #[default]
    All,
    /// Send page, limit, search and exact filters to the server; one cache entry per page.
    ServerPaged,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ViewState {
    /// Nothing loaded yet.
    Loading,
    /// The load failed. `projection` holds whatever was loaded before, if anything.
    Failed {
        message: String,
        projection: Projection,
    },
    Ready(Projection),
}

pub struct FeatureModule<T> {
    descriptor: ResourceDescriptor,
    policy: FetchPolicy,
    ui: UiState,
    surface: CommandSurface,
    query: LiveQuery<T>,
    dispatcher: MutationDispatcher<T>,
    invalidates: Vec<Tag>,
}

impl<T> FeatureModule<T>
where
    T: Transport,
{
    pub fn new(
        dispatcher: MutationDispatcher<T>,
        descriptor: &ResourceDescriptor,
        schema: FormSchema,
    ) -> Self {
        let default_page_size = dispatcher.cache().config().default_page_size;
        Self {
            descriptor: descriptor.clone(),
            policy: FetchPolicy::default(),
            ui: UiState::new(default_page_size),
            surface: CommandSurface::new(schema),
            query: LiveQuery::new(dispatcher.cache().clone(), descriptor.clone()),
            dispatcher,
            invalidates: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Tags of other resources every mutation of this feature also invalidates.
    pub fn invalidating(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.invalidates.extend(tags);
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn is_submitting(&self) -> bool {
        self.surface.is_submitting()
    }

    /// Starts following the collection. Idempotent.
    pub fn mount(&mut self) {
        self.sync_query();
    }

    /// Changes filters, search, sort or pagination. Under [`FetchPolicy::ServerPaged`]
    /// the query follows the new params right away.
    pub fn update_ui(&mut self, update: impl FnOnce(&mut UiState)) {
        update(&mut self.ui);
        self.sync_query();
    }

    pub fn open(&mut self, entity: Option<Entity>) {
        self.ui.open(entity);
    }

    pub fn close(&mut self) {
        self.ui.close();
    }

    pub fn snapshot(&self) -> Option<EntrySnapshot> {
        self.query.snapshot()
    }

    /// What the list should render right now.
    pub fn view(&self) -> ViewState {
        match self.query.snapshot() {
            Some(snapshot) => self.view_of(&snapshot),
            None => ViewState::Loading,
        }
    }

    /// Waits for the current load to settle and returns the resulting view.
    pub async fn settled(&mut self) -> ViewState {
        self.sync_query();
        match self.query.settled().await {
            Some(snapshot) => self.view_of(&snapshot),
            None => ViewState::Loading,
        }
    }

    /// The explicit retry action of a failed view.
    pub fn retry(&mut self) -> bool {
        self.sync_query();
        self.query.refetch()
    }

    pub async fn submit(&mut self, values: &Map<String, Value>) -> FormResult<SubmitOutcome> {
        self.surface
            .submit(
                &mut self.ui,
                &self.dispatcher,
                &self.descriptor,
                values,
                &self.invalidates,
            )
            .await
    }

    #[instrument(skip_all, name = "feature#delete", fields(resource = self.descriptor.path(), %id))]
    pub async fn delete(&mut self, id: EntityId) -> Notification {
        let command = Command::delete(&self.descriptor, id).invalidating(self.invalidates.iter().cloned());
        let result = self.dispatcher.mutate(command).await;
        if result.is_ok() {
            info!("deleted");
        }
        Notification::for_mutation(self.descriptor.label(), Verb::Delete, &result)
    }

    fn query_params(&self) -> QueryParams {
        match self.policy {
            FetchPolicy::All => QueryParams::new(),
            FetchPolicy::ServerPaged => self
                .ui
                .filters()
                .to_query(QueryParams::new().paged(*self.ui.pagination())),
        }
    }

    fn sync_query(&mut self) {
        let params = self.query_params();
        self.query.set_params(params);
    }

    fn view_of(&self, snapshot: &EntrySnapshot) -> ViewState {
        let projection = self.project(snapshot);
        match snapshot.status {
            Status::Uninitialized => ViewState::Loading,
            Status::Loading if snapshot.data.is_none() => ViewState::Loading,
            Status::Error => ViewState::Failed {
                message: snapshot
                    .error
                    .as_ref()
                    .map(|e| e.user_message())
                    .unwrap_or_default(),
                projection,
            },
            Status::Loading | Status::Success => ViewState::Ready(projection),
        }
    }

    fn project(&self, snapshot: &EntrySnapshot) -> Projection {
        let pagination = match self.policy {
            FetchPolicy::All => *self.ui.pagination(),
            FetchPolicy::ServerPaged => Pagination::unpaged(),
        };
        let mut projection = project(
            snapshot.entities(),
            self.ui.filters(),
            self.ui.sort(),
            &pagination,
        );
        // a server paged entry holds one page; the count of all matches comes from the server
        if self.policy == FetchPolicy::ServerPaged {
            if let Some(total) = snapshot.server_total() {
                projection.total_count = total;
            }
        }
        projection
    }
}
