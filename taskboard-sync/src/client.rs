/// Sync client: the cache plus the remote it revalidates from.
///
/// Reorder and CRUD operations live in `engine` and `ops` as further `impl`
/// blocks. Every operation writes the cache first, then persists, then either
/// confirms or revalidates what it touched. Persistence failures come back
/// inside [`Outcome`], never as `Err`.
use futures_util::future::join_all;
use std::sync::Arc;
use taskboard_core::{aggregate, BoardViewState};

use crate::cache::CollectionCache;
use crate::config::ClientConfig;
use crate::error::{RemoteError, SyncError};
use crate::remote::{HttpRemote, Remote};
use crate::resource::{Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub viewer: Option<String>,
    pub revalidate_on_success: bool,
    pub event_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            viewer: None,
            revalidate_on_success: true,
            event_capacity: 256,
        }
    }
}

impl From<&ClientConfig> for SyncSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            viewer: config.viewer.clone(),
            revalidate_on_success: config.revalidate_on_success,
            event_capacity: config.event_capacity,
        }
    }
}

/// How an operation ended.
#[derive(Debug, Clone)]
pub enum Outcome<T = ()> {
    /// Persisted; carries the confirmed value.
    Applied(T),
    /// Nothing to do.
    Noop,
    /// Persisting failed; the optimistic writes were discarded.
    Reverted(SyncError),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, Outcome::Reverted(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(v) => Outcome::Applied(f(v)),
            Outcome::Noop => Outcome::Noop,
            Outcome::Reverted(e) => Outcome::Reverted(e),
        }
    }
}

pub struct SyncClient {
    pub(crate) cache: Arc<CollectionCache>,
    settings: SyncSettings,
}

impl SyncClient {
    pub fn new(remote: Arc<dyn Remote>, settings: SyncSettings) -> Self {
        let cache = Arc::new(CollectionCache::new(remote, settings.event_capacity));
        Self { cache, settings }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        let remote = HttpRemote::from_config(config)?;
        Ok(Self::new(Arc::new(remote), SyncSettings::from(config)))
    }

    pub fn cache(&self) -> &Arc<CollectionCache> {
        &self.cache
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub(crate) fn remote(&self) -> &dyn Remote {
        self.cache.remote().as_ref()
    }

    pub async fn load_all(&self) -> Result<(), RemoteError> {
        self.cache.load_all().await
    }

    /// Aggregate the current cache contents for `selected`.
    pub fn board_view(&self, selected: Option<&str>) -> BoardViewState {
        let viewer = self.settings.viewer.as_deref();
        self.cache
            .with_collections(|collections| aggregate(selected, viewer, collections))
    }

    pub(crate) fn require_loaded(&self, key: ResourceKey) -> Result<(), SyncError> {
        if self.cache.is_loaded(key) {
            Ok(())
        } else {
            Err(SyncError::NotLoaded(key))
        }
    }

    pub(crate) fn require<R: Resource>(
        &self,
        id: &str,
        missing: impl FnOnce(String) -> SyncError,
    ) -> Result<R, SyncError> {
        self.require_loaded(R::KEY)?;
        self.cache.find::<R>(id).ok_or_else(|| missing(id.to_string()))
    }

    /// Refetch `keys` after a confirmed write, if configured to.
    pub(crate) async fn confirm(&self, keys: &[ResourceKey]) {
        if !self.settings.revalidate_on_success {
            return;
        }
        for result in join_all(keys.iter().map(|k| self.cache.revalidate(*k))).await {
            if let Err(e) = result {
                log::debug!(target: "taskboard.sync", "Post-write refetch failed: {}", e);
            }
        }
    }

    /// Discard optimistic writes to `keys` by refetching them, and announce
    /// the failure to subscribers.
    pub(crate) async fn revert<T>(
        &self,
        operation: &str,
        keys: &[ResourceKey],
        error: RemoteError,
    ) -> Outcome<T> {
        log::warn!(target: "taskboard.sync", "{} failed, revalidating: {}", operation, error);
        for (key, result) in keys
            .iter()
            .zip(join_all(keys.iter().map(|k| self.cache.revalidate(*k))).await)
        {
            if let Err(e) = result {
                log::error!(
                    target: "taskboard.sync",
                    "Could not revalidate {} after failed {}: {}",
                    key,
                    operation,
                    e
                );
            }
        }
        self.cache.notify_reverted(operation, &error.to_string());
        Outcome::Reverted(SyncError::Remote(error))
    }
}
