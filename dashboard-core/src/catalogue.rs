use crate::Resource;
use crate::holidays::Holidays;
use crate::lead_stages::LeadStages;
use crate::payments::Payments;
use crate::pipelines::Pipelines;
use crate::policies::Policies;
use crate::projects::Projects;
use crate::signatures::Signatures;
use crate::tickets::Tickets;
use crate::trainings::Trainings;
use sync_engine::context::SyncContext;
use sync_engine::feature::{FeatureModule, FetchPolicy};
use sync_engine::form::{FormResult, FormSchema};
use sync_engine::resource::ResourceDescriptor;
use sync_engine::tag::Tag;
use sync_engine::transport::Transport;

/// Type erased view of a [`Resource`], for code that only knows a resource by its path.
#[derive(Copy, Clone)]
pub struct CatalogueEntry {
    descriptor: fn() -> &'static ResourceDescriptor,
    form: fn() -> FormResult<FormSchema>,
    fetch_policy: fn() -> FetchPolicy,
    invalidates: fn() -> Vec<Tag>,
}

impl CatalogueEntry {
    pub const fn of<R: Resource>() -> Self {
        Self {
            descriptor: R::descriptor,
            form: R::form,
            fetch_policy: R::fetch_policy,
            invalidates: R::invalidates,
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        (self.descriptor)()
    }

    pub fn form(&self) -> FormResult<FormSchema> {
        (self.form)()
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        (self.fetch_policy)()
    }

    pub fn invalidates(&self) -> Vec<Tag> {
        (self.invalidates)()
    }

    pub fn feature<T: Transport>(&self, context: &SyncContext<T>) -> FormResult<FeatureModule<T>> {
        Ok(context
            .feature(self.descriptor(), self.form()?)
            .with_policy(self.fetch_policy())
            .invalidating(self.invalidates()))
    }
}

pub static CATALOGUE: [CatalogueEntry; 9] = [
    CatalogueEntry::of::<Pipelines>(),
    CatalogueEntry::of::<LeadStages>(),
    CatalogueEntry::of::<Holidays>(),
    CatalogueEntry::of::<Trainings>(),
    CatalogueEntry::of::<Tickets>(),
    CatalogueEntry::of::<Payments>(),
    CatalogueEntry::of::<Signatures>(),
    CatalogueEntry::of::<Policies>(),
    CatalogueEntry::of::<Projects>(),
];

pub fn find(path: &str) -> Option<&'static CatalogueEntry> {
    let path = path.trim_matches('/');
    CATALOGUE.iter().find(|e| e.descriptor().path() == path)
}

pub fn paths() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|e| e.descriptor().path())
}
