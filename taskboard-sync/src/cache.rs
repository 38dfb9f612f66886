/// Remote collection cache.
///
/// Holds the last known value of each REST collection, keyed by collection
/// URL. Writes are optimistic: they replace the cached value at once and
/// notify subscribers, without a network call. `revalidate` refetches a
/// collection and overwrites whatever is cached with server truth, which is
/// also how a failed optimistic write is discarded.
///
/// Each key carries counters so that overlapping gestures do not clobber
/// each other: a revalidation response is dropped when a local write landed
/// on the key after the fetch started, or when a fetch started later has
/// already been applied.
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use taskboard_core::{Board, Collections, Column, Task};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::RemoteError;
use crate::remote::{self, Remote};
use crate::resource::{Collection, Resource, ResourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// Local write not yet confirmed by the server.
    Optimistic,
    /// Value fetched from the server.
    Revalidated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Updated {
        key: ResourceKey,
        version: u64,
        origin: UpdateOrigin,
    },
    /// An operation failed and its optimistic writes were discarded.
    Reverted { operation: String, message: String },
}

/// What happened to a revalidation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    Applied { version: u64 },
    /// Superseded by a newer write or fetch; the response was dropped.
    Stale,
}

#[derive(Debug, Default)]
struct Entry {
    value: Option<Collection>,
    /// Bumped on every applied change; reported to subscribers.
    version: u64,
    /// Local writes so far.
    writes: u64,
    /// Fetches started so far.
    fetches: u64,
    /// Sequence number of the newest fetch whose response was applied.
    applied_fetch: u64,
}

pub struct CollectionCache {
    remote: Arc<dyn Remote>,
    entries: RwLock<HashMap<ResourceKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
}

impl CollectionCache {
    pub fn new(remote: Arc<dyn Remote>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            remote,
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<ResourceKey, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<ResourceKey, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn remote(&self) -> &Arc<dyn Remote> {
        &self.remote
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Subscriber events as a stream. Events missed by a lagging consumer are
    /// skipped.
    pub fn updates(&self) -> impl Stream<Item = CacheEvent> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }

    fn publish(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    pub fn is_loaded(&self, key: ResourceKey) -> bool {
        self.read_entries()
            .get(&key)
            .is_some_and(|e| e.value.is_some())
    }

    pub fn version(&self, key: ResourceKey) -> u64 {
        self.read_entries().get(&key).map_or(0, |e| e.version)
    }

    /// Cloned collection, or `None` while it is pending.
    pub fn get<R: Resource>(&self) -> Option<Vec<R>> {
        self.read::<R, _>(|items| items.map(<[R]>::to_vec))
    }

    /// Borrow a collection without cloning it.
    pub fn read<R: Resource, T>(&self, f: impl FnOnce(Option<&[R]>) -> T) -> T {
        let entries = self.read_entries();
        let items = entries
            .get(&R::KEY)
            .and_then(|e| e.value.as_ref())
            .and_then(R::items);
        f(items)
    }

    pub fn find<R: Resource>(&self, id: &str) -> Option<R> {
        self.read::<R, _>(|items| items?.iter().find(|item| item.id() == id).cloned())
    }

    /// Borrow all three collections at once.
    pub fn with_collections<T>(&self, f: impl FnOnce(Collections<'_>) -> T) -> T {
        let entries = self.read_entries();
        let slot = |key: ResourceKey| entries.get(&key).and_then(|e| e.value.as_ref());
        f(Collections {
            boards: slot(ResourceKey::Boards).and_then(Board::items),
            columns: slot(ResourceKey::Columns).and_then(Column::items),
            tasks: slot(ResourceKey::Tasks).and_then(Task::items),
        })
    }

    /// Optimistic write. Applies `updater` to the cached collection, bumps the
    /// key's version and notifies subscribers before returning. A collection
    /// that has not loaded yet is left alone and `None` is returned.
    pub fn mutate<R: Resource>(&self, updater: impl FnOnce(&mut Vec<R>)) -> Option<u64> {
        let version = {
            let mut entries = self.write_entries();
            let entry = entries.entry(R::KEY).or_default();
            let items = entry.value.as_mut().and_then(R::items_mut)?;
            updater(items);
            entry.writes += 1;
            entry.version += 1;
            entry.version
        };
        log::debug!(target: "taskboard.cache", "Optimistic write to {} (v{})", R::KEY, version);
        self.publish(CacheEvent::Updated {
            key: R::KEY,
            version,
            origin: UpdateOrigin::Optimistic,
        });
        Some(version)
    }

    /// Write then, when `revalidate` is set, refetch from the server.
    pub async fn set<R: Resource>(
        &self,
        updater: impl FnOnce(&mut Vec<R>),
        revalidate: bool,
    ) -> Result<Option<Revalidation>, RemoteError> {
        self.mutate(updater);
        if revalidate {
            self.revalidate(R::KEY).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Refetch `key` and overwrite the cached value with the response, unless
    /// the response has been superseded meanwhile.
    pub async fn revalidate(&self, key: ResourceKey) -> Result<Revalidation, RemoteError> {
        let (writes_at_start, fetch_seq) = {
            let mut entries = self.write_entries();
            let entry = entries.entry(key).or_default();
            entry.fetches += 1;
            (entry.writes, entry.fetches)
        };

        let fetched = match remote::fetch_collection(self.remote.as_ref(), key).await {
            Ok(collection) => collection,
            Err(e) => {
                log::warn!(target: "taskboard.cache", "Revalidating {} failed: {}", key, e);
                return Err(e);
            }
        };

        let version = {
            let mut entries = self.write_entries();
            let entry = entries.entry(key).or_default();
            if entry.writes != writes_at_start || entry.applied_fetch > fetch_seq {
                log::debug!(
                    target: "taskboard.cache",
                    "Dropping stale response for {} (fetch #{})",
                    key,
                    fetch_seq
                );
                return Ok(Revalidation::Stale);
            }
            entry.value = Some(fetched);
            entry.applied_fetch = fetch_seq;
            entry.version += 1;
            entry.version
        };

        self.publish(CacheEvent::Updated {
            key,
            version,
            origin: UpdateOrigin::Revalidated,
        });
        Ok(Revalidation::Applied { version })
    }

    /// Fetch all three collections concurrently.
    pub async fn load_all(&self) -> Result<(), RemoteError> {
        let results = join_all(ResourceKey::ALL.map(|key| self.revalidate(key))).await;
        results.into_iter().try_for_each(|r| r.map(|_| ()))
    }

    /// Rewrite a temporary id to its server-assigned id in every loaded
    /// collection, as one write per touched collection.
    pub fn reconcile_id(&self, temp_id: &str, server_id: &str) -> usize {
        let mut touched = Vec::new();
        let mut total = 0;
        {
            let mut entries = self.write_entries();
            for (key, entry) in entries.iter_mut() {
                let Some(value) = entry.value.as_mut() else {
                    continue;
                };
                let n = value.rewrite_id(temp_id, server_id);
                if n > 0 {
                    entry.writes += 1;
                    entry.version += 1;
                    touched.push((*key, entry.version));
                    total += n;
                }
            }
        }
        for (key, version) in touched {
            self.publish(CacheEvent::Updated {
                key,
                version,
                origin: UpdateOrigin::Optimistic,
            });
        }
        log::debug!(
            target: "taskboard.cache",
            "Reconciled {} -> {} ({} reference(s))",
            temp_id,
            server_id,
            total
        );
        total
    }

    /// Announce a discarded operation to subscribers.
    pub fn notify_reverted(&self, operation: &str, message: &str) {
        self.publish(CacheEvent::Reverted {
            operation: operation.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use std::time::Duration;

    fn column(id: &str, tasks: &[&str]) -> Column {
        Column {
            id: id.into(),
            board_id: "b1".into(),
            archived: false,
            name: id.into(),
            task_ids: tasks.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn setup() -> (Arc<MemoryRemote>, CollectionCache) {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed(ResourceKey::Columns, &[column("a", &["t1", "t2"])]);
        let cache = CollectionCache::new(remote.clone(), 16);
        (remote, cache)
    }

    #[tokio::test]
    async fn test_pending_until_revalidated() {
        let (_remote, cache) = setup();
        assert!(cache.get::<Column>().is_none());
        assert_eq!(cache.mutate::<Column>(|cols| cols.clear()), None);

        let r = cache.revalidate(ResourceKey::Columns).await.unwrap();
        assert_eq!(r, Revalidation::Applied { version: 1 });
        assert_eq!(cache.get::<Column>().unwrap().len(), 1);
        assert!(cache.is_loaded(ResourceKey::Columns));
    }

    #[tokio::test]
    async fn test_optimistic_write_notifies_and_revalidate_restores() {
        let (_remote, cache) = setup();
        cache.revalidate(ResourceKey::Columns).await.unwrap();
        let mut rx = cache.subscribe();

        cache.mutate::<Column>(|cols| cols[0].task_ids.reverse());
        assert_eq!(cache.find::<Column>("a").unwrap().task_ids, vec!["t2", "t1"]);
        assert_eq!(
            rx.try_recv().unwrap(),
            CacheEvent::Updated {
                key: ResourceKey::Columns,
                version: 2,
                origin: UpdateOrigin::Optimistic,
            }
        );

        cache.revalidate(ResourceKey::Columns).await.unwrap();
        assert_eq!(cache.find::<Column>("a").unwrap().task_ids, vec!["t1", "t2"]);
        assert!(matches!(
            rx.try_recv().unwrap(),
            CacheEvent::Updated {
                origin: UpdateOrigin::Revalidated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_writes_apply_in_call_order() {
        let (_remote, cache) = setup();
        cache.revalidate(ResourceKey::Columns).await.unwrap();
        cache.mutate::<Column>(|cols| cols[0].name = "first".into());
        cache.mutate::<Column>(|cols| cols[0].name = "second".into());
        assert_eq!(cache.find::<Column>("a").unwrap().name, "second");
        assert_eq!(cache.version(ResourceKey::Columns), 3);
    }

    #[tokio::test]
    async fn test_response_older_than_local_write_is_dropped() {
        let (remote, cache) = setup();
        cache.revalidate(ResourceKey::Columns).await.unwrap();
        remote.set_delay(Duration::from_millis(50));

        let (result, _) = tokio::join!(cache.revalidate(ResourceKey::Columns), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.mutate::<Column>(|cols| cols[0].task_ids = vec!["t2".into(), "t1".into()])
        });

        assert_eq!(result.unwrap(), Revalidation::Stale);
        assert_eq!(cache.find::<Column>("a").unwrap().task_ids, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_value() {
        let (remote, cache) = setup();
        cache.revalidate(ResourceKey::Columns).await.unwrap();
        cache.mutate::<Column>(|cols| cols[0].name = "local".into());
        remote.set_offline(true);
        assert!(cache.revalidate(ResourceKey::Columns).await.is_err());
        assert_eq!(cache.find::<Column>("a").unwrap().name, "local");
    }

    #[tokio::test]
    async fn test_set_with_revalidate_returns_server_state() {
        let (_remote, cache) = setup();
        cache.load_all().await.unwrap();
        let r = cache
            .set::<Column>(|cols| cols.push(column("tmp-x", &[])), true)
            .await
            .unwrap();
        assert!(matches!(r, Some(Revalidation::Applied { .. })));
        assert!(cache.find::<Column>("tmp-x").is_none());
        assert!(cache.is_loaded(ResourceKey::Tasks));
    }

    #[tokio::test]
    async fn test_reconcile_rewrites_every_reference() {
        let (_remote, cache) = setup();
        cache.load_all().await.unwrap();
        cache.mutate::<Column>(|cols| {
            cols.push(column("tmp-c", &["tmp-t"]));
            cols[0].task_ids.push("tmp-t".into());
        });
        assert_eq!(cache.reconcile_id("tmp-t", "t9"), 2);
        assert_eq!(cache.find::<Column>("tmp-c").unwrap().task_ids, vec!["t9"]);
        assert_eq!(cache.find::<Column>("a").unwrap().task_ids, vec!["t1", "t2", "t9"]);
    }

    #[tokio::test]
    async fn test_updates_stream() {
        let (_remote, cache) = setup();
        let updates = cache.updates();
        tokio::pin!(updates);
        cache.revalidate(ResourceKey::Columns).await.unwrap();
        cache.notify_reverted("move task", "offline");
        assert!(matches!(updates.next().await, Some(CacheEvent::Updated { .. })));
        assert_eq!(
            updates.next().await,
            Some(CacheEvent::Reverted {
                operation: "move task".into(),
                message: "offline".into(),
            })
        );
    }
}
