/// REST transport.
///
/// The backend exposes one collection per resource:
///
///   GET    /boards | /columns | /tasks       -> flat JSON array
///   POST   /boards | /columns | /tasks       -> created entity (server id)
///   PUT    /{collection}/{id}                -> full replace by id
///   DELETE /{collection}/{id}                -> delete
///
/// [`Remote`] is the raw JSON transport; the free functions below give typed
/// access on top of it.
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

use crate::error::RemoteError;
use crate::resource::{Collection, Resource, ResourceKey};

pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

/// Characters escaped in an id path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'\\');

#[async_trait]
pub trait Remote: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, RemoteError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

/// `/columns/{id}` with the id percent-encoded.
pub fn entity_path(key: ResourceKey, id: &str) -> String {
    format!("{}/{}", key.path(), utf8_percent_encode(id, SEGMENT))
}

/// Some backend routes wrap payloads as `{ "items": ..., "message": ... }`.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("items") => {
            map.remove("items").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub async fn fetch_collection(remote: &dyn Remote, key: ResourceKey) -> Result<Collection, RemoteError> {
    let body = unwrap_envelope(remote.get(key.path()).await?);
    Collection::decode(key, body).map_err(|e| RemoteError::decode(key.path(), e))
}

/// POST a new entity. The client-side id is not sent; the server assigns one.
pub async fn create<R: Resource>(remote: &dyn Remote, entity: &R) -> Result<R, RemoteError> {
    let path = R::KEY.path();
    let mut body = serde_json::to_value(entity).map_err(|e| RemoteError::decode(path, e))?;
    if let Value::Object(map) = &mut body {
        map.remove("id");
    }
    let created = with_entity_id(unwrap_envelope(remote.post(path, &body).await?));
    serde_json::from_value(created).map_err(|e| RemoteError::decode(path, e))
}

/// Document-store backends may answer with `_id` only; copy it to `id`.
fn with_entity_id(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("id") => {
            if let Some(id) = map.remove("_id") {
                map.insert("id".to_string(), id);
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// PUT the complete entity, replacing the stored one.
pub async fn replace<R: Resource>(remote: &dyn Remote, entity: &R) -> Result<(), RemoteError> {
    let path = entity_path(R::KEY, entity.id());
    let body = serde_json::to_value(entity).map_err(|e| RemoteError::decode(&path, e))?;
    remote.put(&path, &body).await?;
    Ok(())
}

pub async fn remove<R: Resource>(remote: &dyn Remote, id: &str) -> Result<(), RemoteError> {
    remote.delete(&entity_path(R::KEY, id)).await
}
