//! Read-through cache of server collections and entities.
//!
//! # Request protocol
//!
//! 1. A caller subscribes to a key. If the entry is absent, errored or stale, the
//!    subscriber that notices it starts a request and every later subscriber attaches to it.
//! 2. The request runs as its own task, so dropping a caller never strands an entry in
//!    `Loading`.
//! 3. Every started request takes a fresh generation. When a response arrives, it is only
//!    applied if its generation is still the entry's current one; older responses are dropped.
//! 4. The new state is published on the entry's `watch` channel.
//!
//! The entry map sits behind a plain mutex that is never held across an `.await`.

use crate::config::SyncConfig;
use crate::entity::{Entity, EntityId};
use crate::error::{CacheError, CacheResult, RequestError};
use crate::metrics;
use crate::query::{CacheKey, QueryParams};
use crate::resource::ResourceDescriptor;
use crate::tag::Tag;
use crate::transport::Transport;
use error_stack::Report;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Status {
    Uninitialized,
    Loading,
    Success,
    Error,
}

#[derive(Debug, PartialEq, Clone)]
pub enum EntryData {
    Collection {
        entities: Arc<[Entity]>,
        /// Unpaged match count reported by the server.
        total: Option<usize>,
    },
    Entity(Arc<Entity>),
}

impl EntryData {
    pub fn entities(&self) -> &[Entity] {
        match self {
            EntryData::Collection { entities, .. } => entities,
            EntryData::Entity(entity) => std::slice::from_ref(entity.as_ref()),
        }
    }
}

/// What subscribers see of an entry at one point in time.
#[derive(Debug, PartialEq, Clone)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub status: Status,
    pub stale: bool,
    /// Last successfully loaded data. Kept while reloading and after a failed reload.
    pub data: Option<EntryData>,
    pub error: Option<RequestError>,
    pub generation: u64,
}

impl EntrySnapshot {
    fn uninitialized(key: CacheKey) -> Self {
        Self {
            key,
            status: Status::Uninitialized,
            stale: false,
            data: None,
            error: None,
            generation: 0,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, Status::Success | Status::Error)
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    /// Empty until the first successful load.
    pub fn entities(&self) -> &[Entity] {
        self.data.as_ref().map(EntryData::entities).unwrap_or(&[])
    }

    pub fn server_total(&self) -> Option<usize> {
        match &self.data {
            Some(EntryData::Collection { total, .. }) => *total,
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&Entity> {
        match &self.data {
            Some(EntryData::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    /// For call sites that want `?` instead of branching on the status.
    pub fn into_result(self) -> CacheResult<EntryData> {
        let EntrySnapshot {
            key,
            status,
            data,
            error,
            ..
        } = self;

        match (status, data, error) {
            (Status::Error, _, Some(error)) => {
                let context = match key {
                    CacheKey::Collection { .. } => CacheError::Fetch,
                    CacheKey::Entity { .. } => CacheError::FetchOne,
                };
                Err(Report::new(error).change_context(context))
            }
            (_, Some(data), _) => Ok(data),
            _ => Err(Report::new(CacheError::Empty)),
        }
    }
}

struct Entry {
    descriptor: ResourceDescriptor,
    status: Status,
    stale: bool,
    data: Option<EntryData>,
    error: Option<RequestError>,
    tags: Vec<Tag>,
    generation: u64,
    subscribers: usize,
    idle_since: Option<Instant>,
    tx: watch::Sender<EntrySnapshot>,
}

impl Entry {
    fn new(descriptor: &ResourceDescriptor, key: &CacheKey) -> Self {
        let (tx, _) = watch::channel(EntrySnapshot::uninitialized(key.clone()));
        Self {
            descriptor: descriptor.clone(),
            status: Status::Uninitialized,
            stale: false,
            data: None,
            error: None,
            tags: descriptor.base_tags(key),
            generation: 0,
            subscribers: 0,
            idle_since: None,
            tx,
        }
    }

    fn snapshot(&self, key: &CacheKey) -> EntrySnapshot {
        EntrySnapshot {
            key: key.clone(),
            status: self.status,
            stale: self.stale,
            data: self.data.clone(),
            error: self.error.clone(),
            generation: self.generation,
        }
    }

    fn publish(&self, key: &CacheKey) {
        self.tx.send_replace(self.snapshot(key));
    }

    fn needs_request(&self) -> bool {
        match self.status {
            Status::Loading => false,
            Status::Success => self.stale,
            Status::Uninitialized | Status::Error => true,
        }
    }

    fn begin_request(&mut self, generation: u64) {
        self.generation = generation;
        self.status = Status::Loading;
    }

    /// Abandons an in flight request nobody is waiting for.
    fn supersede(&mut self, generation: u64) {
        self.generation = generation;
        self.status = if self.data.is_some() {
            Status::Success
        } else {
            Status::Uninitialized
        };
    }

    fn carries_any(&self, invalidating: &[Tag]) -> bool {
        self.tags
            .iter()
            .any(|tag| invalidating.iter().any(|i| tag.invalidated_by(i)))
    }
}

struct Inner<T> {
    transport: T,
    config: SyncConfig,
    generations: AtomicU64,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

/// Cheap to clone; every clone shares the same entries.
pub struct RemoteCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RemoteCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> RemoteCache<T> {
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Current state of an entry without subscribing to it or starting a request.
    pub fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.entries().get(key).map(|e| e.snapshot(key))
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.entries().get(key).map_or(0, |e| e.subscribers)
    }

    /// Evicts every entry that has had no subscribers for at least the idle grace period.
    pub fn sweep(&self) -> usize {
        let grace = self.inner.config.idle_grace;
        let now = Instant::now();

        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, entry| {
            let evict = entry.subscribers == 0
                && entry
                    .idle_since
                    .is_some_and(|since| now.duration_since(since) >= grace);
            if evict {
                debug!(%key, "evicting idle cache entry");
            }
            !evict
        });
        let evicted = before - entries.len();
        drop(entries);

        metrics::increment_evicted_by(evicted);
        evicted
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn release(&self, key: &CacheKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.idle_since = Some(Instant::now());
            }
        }
    }
}

impl<T> RemoteCache<T>
where
    T: Transport,
{
    pub fn new(transport: T, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                generations: AtomicU64::new(0),
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribes to a collection, starting a request if the entry has no fresh data and
    /// none is in flight. Must be called from within a tokio runtime.
    pub fn subscribe(&self, descriptor: &ResourceDescriptor, params: QueryParams) -> Subscription<T> {
        self.subscribe_key(descriptor, descriptor.collection_key(params))
    }

    pub fn subscribe_one(&self, descriptor: &ResourceDescriptor, id: EntityId) -> Subscription<T> {
        self.subscribe_key(descriptor, descriptor.entity_key(id))
    }

    /// Fetch-if-absent. Concurrent fetches of the same key share one network call and
    /// resolve to the same snapshot.
    #[instrument(skip_all, name = "cache#fetch", fields(resource = descriptor.path()))]
    pub async fn fetch(&self, descriptor: &ResourceDescriptor, params: QueryParams) -> EntrySnapshot {
        self.subscribe(descriptor, params).settled().await
    }

    #[instrument(skip_all, name = "cache#fetch_one", fields(resource = descriptor.path(), %id))]
    pub async fn fetch_one(&self, descriptor: &ResourceDescriptor, id: EntityId) -> EntrySnapshot {
        self.subscribe_one(descriptor, id).settled().await
    }

    /// Marks every entry carrying one of `tags` stale. Entries somebody is subscribed to
    /// are refetched right away, the rest on their next subscription.
    /// Returns the number of entries invalidated.
    #[instrument(skip_all, name = "cache#invalidate", fields(tags = %tags.iter().join(",")))]
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        if tags.is_empty() {
            return 0;
        }

        let mut refetch = Vec::new();
        let mut invalidated = 0;
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut() {
                if !entry.carries_any(tags) {
                    continue;
                }
                invalidated += 1;
                entry.stale = true;

                let generation = self.next_generation();
                if entry.subscribers > 0 {
                    entry.begin_request(generation);
                    refetch.push((entry.descriptor.clone(), key.clone(), generation));
                } else if entry.status == Status::Loading {
                    entry.supersede(generation);
                }
                entry.publish(key);
            }
        }

        debug!(invalidated, refetching = refetch.len(), "invalidated cache entries");
        metrics::increment_invalidated_by(invalidated);

        for (descriptor, key, generation) in refetch {
            self.spawn_request(descriptor, key, generation);
        }

        invalidated
    }

    /// Starts a new request for an existing entry regardless of its state, superseding any
    /// request in flight. This is the explicit "retry" action of a failed view.
    pub fn refetch(&self, key: &CacheKey) -> bool {
        let request = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            let generation = self.next_generation();
            entry.begin_request(generation);
            entry.publish(key);
            (entry.descriptor.clone(), generation)
        };

        let (descriptor, generation) = request;
        self.spawn_request(descriptor, key.clone(), generation);
        true
    }

    /// Spawns a task that sweeps the cache every `sweep_interval` until the cache is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = inner.upgrade() else {
                    debug!("cache dropped, stopping sweeper");
                    break;
                };
                RemoteCache { inner }.sweep();
            }
        })
    }

    fn subscribe_key(&self, descriptor: &ResourceDescriptor, key: CacheKey) -> Subscription<T> {
        let (rx, request) = {
            let mut entries = self.entries();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(descriptor, &key));
            entry.subscribers += 1;
            entry.idle_since = None;

            let request = if entry.needs_request() {
                let generation = self.next_generation();
                entry.begin_request(generation);
                entry.publish(&key);
                Some((entry.descriptor.clone(), generation))
            } else {
                if entry.status == Status::Loading {
                    metrics::increment_deduplicated_fetches(key.resource());
                }
                None
            };

            (entry.tx.subscribe(), request)
        };

        if let Some((descriptor, generation)) = request {
            self.spawn_request(descriptor, key.clone(), generation);
        }

        Subscription {
            cache: self.clone(),
            key,
            rx,
        }
    }

    fn spawn_request(&self, descriptor: ResourceDescriptor, key: CacheKey, generation: u64) {
        let cache = self.clone();
        tokio::spawn(async move {
            let outcome = cache.request(&descriptor, &key).await;
            cache.complete(&descriptor, &key, generation, outcome);
        });
    }

    async fn request(
        &self,
        descriptor: &ResourceDescriptor,
        key: &CacheKey,
    ) -> Result<EntryData, RequestError> {
        metrics::increment_network_fetches(key.resource());
        debug!(%key, "requesting");

        let timeout = self.inner.config.request_timeout;
        let call = async {
            match key {
                CacheKey::Collection { resource, params } => {
                    let body = self.inner.transport.list(resource, params).await?;
                    descriptor
                        .adapt_collection(body)
                        .map(|page| EntryData::Collection {
                            entities: page.entities.into(),
                            total: page.total,
                        })
                }
                CacheKey::Entity { resource, id } => {
                    let body = self.inner.transport.get(resource, id).await?;
                    descriptor
                        .adapt_entity(body)
                        .map(|entity| EntryData::Entity(Arc::new(entity)))
                }
            }
        };

        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(RequestError::Timeout(timeout)))
    }

    fn complete(
        &self,
        descriptor: &ResourceDescriptor,
        key: &CacheKey,
        generation: u64,
        outcome: Result<EntryData, RequestError>,
    ) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            debug!(%key, "entry was evicted before its response arrived");
            return;
        };

        if entry.generation != generation {
            debug!(
                %key,
                generation,
                current = entry.generation,
                "discarding response of a superseded request"
            );
            metrics::increment_stale_responses(key.resource());
            return;
        }

        match outcome {
            Ok(data) => {
                entry.tags = descriptor.provided_tags(key, data.entities());
                entry.data = Some(data);
                entry.status = Status::Success;
                entry.stale = false;
                entry.error = None;
            }
            Err(error) => {
                warn!(%key, %error, "request failed");
                entry.status = Status::Error;
                entry.error = Some(error);
            }
        }

        entry.publish(key);
    }
}

/// Keeps an entry alive and delivers its change notifications.
/// Dropping it releases the entry, which may then be swept once idle long enough.
pub struct Subscription<T> {
    cache: RemoteCache<T>,
    key: CacheKey,
    rx: watch::Receiver<EntrySnapshot>,
}

impl<T> Subscription<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next change of the entry.
    pub async fn changed(&mut self) -> Option<EntrySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the entry is no longer loading.
    pub async fn settled(&mut self) -> EntrySnapshot {
        let settled = self
            .rx
            .wait_for(EntrySnapshot::is_settled)
            .await
            .map(|snapshot| snapshot.clone());

        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}

impl<T> Subscription<T>
where
    T: Transport,
{
    pub fn refetch(&self) -> bool {
        self.cache.refetch(&self.key)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

/// A view slot whose query parameters change over time, e.g. a paginated table.
/// It always follows the most recently requested params; responses for params it moved
/// away from land in their own entries and never reach this view.
pub struct LiveQuery<T> {
    cache: RemoteCache<T>,
    descriptor: ResourceDescriptor,
    current: Option<Subscription<T>>,
    generation: u64,
}

impl<T> LiveQuery<T>
where
    T: Transport,
{
    pub fn new(cache: RemoteCache<T>, descriptor: ResourceDescriptor) -> Self {
        Self {
            cache,
            descriptor,
            current: None,
            generation: 0,
        }
    }

    /// Points the query at `params` and returns the query's generation.
    /// Pointing it at the params it already follows is a no-op.
    pub fn set_params(&mut self, params: QueryParams) -> u64 {
        if let Some(current) = &self.current {
            if matches!(current.key(), CacheKey::Collection { params: p, .. } if *p == params) {
                return self.generation;
            }
        }
        self.generation += 1;
        self.current = Some(self.cache.subscribe(&self.descriptor, params));
        self.generation
    }

    /// Bumped every time the query moves to different params.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn params(&self) -> Option<&QueryParams> {
        match self.current.as_ref()?.key() {
            CacheKey::Collection { params, .. } => Some(params),
            CacheKey::Entity { .. } => None,
        }
    }

    pub fn snapshot(&self) -> Option<EntrySnapshot> {
        self.current.as_ref().map(Subscription::snapshot)
    }

    pub async fn settled(&mut self) -> Option<EntrySnapshot> {
        Some(self.current.as_mut()?.settled().await)
    }

    pub async fn changed(&mut self) -> Option<EntrySnapshot> {
        self.current.as_mut()?.changed().await
    }

    pub fn refetch(&self) -> bool {
        self.current.as_ref().is_some_and(Subscription::refetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pagination;
    use crate::test_support::{PIPELINES, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    fn cache(transport: &Arc<ScriptedTransport>) -> RemoteCache<Arc<ScriptedTransport>> {
        RemoteCache::new(Arc::clone(transport), SyncConfig::default())
    }

    fn names(snapshot: &EntrySnapshot) -> Vec<&str> {
        snapshot
            .entities()
            .iter()
            .filter_map(|e| e.get("pipeline_name").and_then(|v| v.as_str()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_loads_and_normalizes() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            json!({"success": true, "data": [{"id": 1, "pipeline_name": "Sales"}]}),
        ));
        let cache = cache(&transport);

        let snapshot = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(Status::Success, snapshot.status);
        assert_eq!(vec!["Sales"], names(&snapshot));
        assert_eq!(1, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_share_one_request() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_after(Duration::from_millis(100), json!([{"id": 1, "pipeline_name": "Sales"}])),
        );
        let cache = cache(&transport);

        let mut fetches = JoinSet::new();
        for _ in 0..5 {
            let cache = cache.clone();
            fetches.spawn(async move { cache.fetch(&PIPELINES, QueryParams::new()).await });
        }
        let snapshots = fetches.join_all().await;

        assert_eq!(1, transport.calls());
        assert_eq!(5, snapshots.len());
        assert!(snapshots.iter().all(|s| *s == snapshots[0]));
        assert_eq!(Status::Success, snapshots[0].status);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served_without_a_request() {
        let transport = Arc::new(ScriptedTransport::new().respond(json!([{"id": 1}])));
        let cache = cache(&transport);

        let first = cache.fetch(&PIPELINES, QueryParams::new()).await;
        let second = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(first, second);
        assert_eq!(1, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn different_params_are_different_entries() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!([{"id": 1}]))
                .respond(json!([{"id": 2}])),
        );
        let cache = cache(&transport);

        cache
            .fetch(&PIPELINES, QueryParams::new().paged(Pagination::with_page_size(1, 1)))
            .await;
        cache
            .fetch(&PIPELINES, QueryParams::new().paged(Pagination::with_page_size(2, 1)))
            .await;

        assert_eq!(2, transport.calls());
        assert_eq!(2, cache.len());
    }

    #[tokio::test(start_paused = true)]
    async fn response_of_a_superseded_request_is_discarded() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_after(Duration::from_millis(500), json!([{"id": 1, "pipeline_name": "old"}]))
                .respond_after(Duration::from_millis(10), json!([{"id": 1, "pipeline_name": "new"}])),
        );
        let cache = cache(&transport);

        let mut subscription = cache.subscribe(&PIPELINES, QueryParams::new());
        tokio::task::yield_now().await;
        cache.invalidate(&[PIPELINES.tag().clone()]);

        let settled = subscription.settled().await;
        assert_eq!(vec!["new"], names(&settled));

        tokio::time::sleep(Duration::from_secs(1)).await;

        let after = subscription.snapshot();
        assert_eq!(vec!["new"], names(&after));
        assert_eq!(settled.generation, after.generation);
        assert_eq!(2, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn live_query_follows_the_latest_params() {
        let page_one = QueryParams::new().paged(Pagination::with_page_size(1, 1));
        let page_two = QueryParams::new().paged(Pagination::with_page_size(2, 1));
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_after(Duration::from_millis(500), json!([{"id": 1, "pipeline_name": "page one"}]))
                .respond_after(Duration::from_millis(10), json!([{"id": 2, "pipeline_name": "page two"}])),
        );
        let cache = cache(&transport);
        let mut query = LiveQuery::new(cache.clone(), PIPELINES.clone());

        assert_eq!(1, query.set_params(page_one.clone()));
        tokio::task::yield_now().await;
        assert_eq!(2, query.set_params(page_two.clone()));
        assert_eq!(2, query.set_params(page_two.clone()));

        let settled = query.settled().await.unwrap();
        assert_eq!(vec!["page two"], names(&settled));

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(vec!["page two"], names(&query.snapshot().unwrap()));
        assert_eq!(Some(&page_two), query.params());
        assert_eq!(0, cache.subscriber_count(&PIPELINES.collection_key(page_one)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_refetches_subscribed_and_marks_idle_entries() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!([{"id": 1}]))
                .respond(json!([{"id": 1}]))
                .respond_after(Duration::from_millis(50), json!([{"id": 1}, {"id": 2}])),
        );
        let cache = cache(&transport);
        let searched = QueryParams::new().search("sal");

        let mut watched = cache.subscribe(&PIPELINES, QueryParams::new());
        watched.settled().await;
        cache.fetch(&PIPELINES, searched.clone()).await;

        let invalidated = cache.invalidate(&[PIPELINES.tag().clone()]);
        assert_eq!(2, invalidated);

        let subscribed = cache.peek(watched.key()).unwrap();
        assert!(subscribed.stale);
        assert_eq!(Status::Loading, subscribed.status);

        let idle = cache.peek(&PIPELINES.collection_key(searched.clone())).unwrap();
        assert!(idle.stale);
        assert_eq!(Status::Success, idle.status);

        let refreshed = watched.settled().await;
        assert_eq!(2, refreshed.entities().len());
        assert!(!refreshed.stale);
        assert_eq!(3, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_idle_entry_is_refetched_on_next_access() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!([{"id": 1}]))
                .respond(json!([{"id": 1}, {"id": 2}])),
        );
        let cache = cache(&transport);

        cache.fetch(&PIPELINES, QueryParams::new()).await;
        cache.invalidate(&[PIPELINES.tag().clone()]);
        assert_eq!(1, transport.calls());

        let snapshot = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(2, snapshot.entities().len());
        assert_eq!(2, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn entity_tag_reaches_lists_containing_it() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!([{"id": 1}]))
                .respond(json!([{"id": 2}])),
        );
        let cache = cache(&transport);
        let other = QueryParams::new().search("x");

        cache.fetch(&PIPELINES, QueryParams::new()).await;
        cache.fetch(&PIPELINES, other.clone()).await;

        let invalidated = cache.invalidate(&[PIPELINES.entity_tag(EntityId::Number(1))]);

        assert_eq!(1, invalidated);
        assert!(cache.peek(&PIPELINES.collection_key(QueryParams::new())).unwrap().stale);
        assert!(!cache.peek(&PIPELINES.collection_key(other)).unwrap().stale);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reload_keeps_previous_data() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!([{"id": 1, "pipeline_name": "Sales"}]))
                .fail(RequestError::Network("connection reset".to_string())),
        );
        let cache = cache(&transport);

        cache.fetch(&PIPELINES, QueryParams::new()).await;
        cache.invalidate(&[PIPELINES.tag().clone()]);
        let snapshot = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(Status::Error, snapshot.status);
        assert_eq!(
            Some(RequestError::Network("connection reset".to_string())),
            snapshot.error
        );
        assert_eq!(vec!["Sales"], names(&snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_times_out_into_an_error() {
        let transport = Arc::new(
            ScriptedTransport::new().respond_after(Duration::from_secs(120), json!([])),
        );
        let config = SyncConfig::default().with_request_timeout(Duration::from_secs(5));
        let cache = RemoteCache::new(Arc::clone(&transport), config);

        let snapshot = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(Status::Error, snapshot.status);
        assert_eq!(Some(RequestError::Timeout(Duration::from_secs(5))), snapshot.error);
    }

    #[tokio::test(start_paused = true)]
    async fn errored_entry_is_retried_on_next_fetch() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(RequestError::server(500, None))
                .respond(json!([{"id": 1}])),
        );
        let cache = cache(&transport);

        let failed = cache.fetch(&PIPELINES, QueryParams::new()).await;
        let retried = cache.fetch(&PIPELINES, QueryParams::new()).await;

        assert_eq!(Status::Error, failed.status);
        assert_eq!(Status::Success, retried.status);
        assert_eq!(2, transport.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_are_notified_of_changes() {
        let transport = Arc::new(
            ScriptedTransport::new().respond_after(Duration::from_millis(20), json!([{"id": 1}])),
        );
        let cache = cache(&transport);

        let mut subscription = cache.subscribe(&PIPELINES, QueryParams::new());
        assert_eq!(Status::Loading, subscription.snapshot().status);

        let changed = subscription.changed().await.unwrap();
        assert_eq!(Status::Success, changed.status);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_one_loads_a_single_entity() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(json!({"success": true, "data": {"id": 7, "pipeline_name": "Renewals"}})),
        );
        let cache = cache(&transport);

        let snapshot = cache.fetch_one(&PIPELINES, EntityId::Number(7)).await;

        assert_eq!(
            Some(&json!("Renewals")),
            snapshot.entity().and_then(|e| e.get("pipeline_name"))
        );
        assert_eq!(Some("pipelines/7".to_string()), transport.last_path());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entries_are_swept_after_the_grace_period() {
        let transport = Arc::new(ScriptedTransport::new().respond(json!([])));
        let config = SyncConfig::default().with_idle_grace(Duration::from_secs(60));
        let cache = RemoteCache::new(Arc::clone(&transport), config);

        cache.fetch(&PIPELINES, QueryParams::new()).await;
        assert_eq!(1, cache.len());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(0, cache.sweep());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(1, cache.sweep());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribed_entries_are_never_swept() {
        let transport = Arc::new(ScriptedTransport::new().respond(json!([])));
        let config = SyncConfig::default().with_idle_grace(Duration::ZERO);
        let cache = RemoteCache::new(Arc::clone(&transport), config);

        let mut subscription = cache.subscribe(&PIPELINES, QueryParams::new());
        subscription.settled().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(0, cache.sweep());
        drop(subscription);
        assert_eq!(1, cache.sweep());
    }

    #[tokio::test(start_paused = true)]
    async fn error_snapshot_converts_into_report() {
        let transport = Arc::new(
            ScriptedTransport::new().fail(RequestError::server(404, Some("gone".to_string()))),
        );
        let cache = cache(&transport);

        let report = cache
            .fetch(&PIPELINES, QueryParams::new())
            .await
            .into_result()
            .unwrap_err();

        assert!(matches!(report.current_context(), CacheError::Fetch));
        assert_eq!("gone", crate::error::user_message(&report));
    }
}
