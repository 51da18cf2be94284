use serde::Serialize;
use serde::de::DeserializeOwned;
use sync_engine::context::SyncContext;
use sync_engine::entity::Entity;
use sync_engine::feature::{FeatureModule, FetchPolicy};
use sync_engine::filter::ListFilter;
use sync_engine::form::{FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;
use sync_engine::tag::Tag;
use sync_engine::transport::Transport;

pub mod catalogue;
pub mod holidays;
pub mod lead_stages;
pub mod payments;
pub mod pipelines;
pub mod policies;
pub mod projects;
pub mod signatures;
pub mod tickets;
pub mod trainings;

/// One server resource of the dashboard: its typed record, its list filters and how
/// its feature module is put together.
pub trait Resource {
    type Model: Serialize + DeserializeOwned;
    type Filter: ListFilter;

    fn descriptor() -> &'static ResourceDescriptor;

    fn form() -> FormResult<FormSchema>;

    fn fetch_policy() -> FetchPolicy {
        FetchPolicy::All
    }

    /// Tags of other resources that go stale whenever this one is mutated.
    fn invalidates() -> Vec<Tag> {
        Vec::new()
    }

    fn decode(entity: &Entity) -> Result<Self::Model, serde_json::Error> {
        entity.decode()
    }
}

/// Builds the feature module of `R` on `context`.
pub fn feature<R, T>(context: &SyncContext<T>) -> FormResult<FeatureModule<T>>
where
    R: Resource,
    T: Transport,
{
    catalogue::CatalogueEntry::of::<R>().feature(context)
}
