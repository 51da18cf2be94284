use crate::cache::RemoteCache;
use crate::config::SyncConfig;
use crate::feature::FeatureModule;
use crate::form::FormSchema;
use crate::mutation::MutationDispatcher;
use crate::resource::ResourceDescriptor;
use crate::transport::Transport;
use tokio::task::JoinHandle;
use tracing::debug;

/// One cache and one dispatcher over one transport. Construct one per application
/// (or per test) and hand it to every feature.
pub struct SyncContext<T> {
    dispatcher: MutationDispatcher<T>,
    sweeper: Option<JoinHandle<()>>,
}

impl<T> SyncContext<T>
where
    T: Transport,
{
    pub fn new(transport: T, config: SyncConfig) -> Self {
        Self {
            dispatcher: MutationDispatcher::new(RemoteCache::new(transport, config)),
            sweeper: None,
        }
    }

    /// Spawns the idle entry sweeper. Requires a tokio runtime.
    pub fn with_sweeper(mut self) -> Self {
        if self.sweeper.is_none() {
            debug!(interval = ?self.config().sweep_interval, "starting cache sweeper");
            self.sweeper = Some(self.cache().spawn_sweeper());
        }
        self
    }

    pub fn cache(&self) -> &RemoteCache<T> {
        self.dispatcher.cache()
    }

    pub fn dispatcher(&self) -> &MutationDispatcher<T> {
        &self.dispatcher
    }

    pub fn config(&self) -> &SyncConfig {
        self.cache().config()
    }

    pub fn feature(&self, descriptor: &ResourceDescriptor, schema: FormSchema) -> FeatureModule<T> {
        FeatureModule::new(self.dispatcher.clone(), descriptor, schema)
    }
}

impl<T> Drop for SyncContext<T> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
