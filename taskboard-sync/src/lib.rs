//! Taskboard sync: versioned collection cache, REST transport, optimistic
//! reorder engine and CRUD operations over boards, columns and tasks.
pub mod cache;
pub mod client;
pub mod config;
mod engine;
pub mod error;
mod ops;
pub mod remote;
pub mod resource;

pub use cache::{CacheEvent, CollectionCache, Revalidation, UpdateOrigin};
pub use client::{Outcome, SyncClient, SyncSettings};
pub use config::{default_config_path, load_config, ClientConfig};
pub use error::{RemoteError, SyncError};
pub use remote::{HttpRemote, MemoryRemote, Remote};
pub use resource::{Collection, Resource, ResourceKey};
