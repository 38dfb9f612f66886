/// In-process REST backend.
///
/// Stores each collection as plain JSON objects and answers the same routes
/// as the HTTP backend: server-assigned ids on POST, full replace on PUT.
/// Failures and latency can be injected so callers can exercise their
/// recovery paths.
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::Remote;
use crate::error::RemoteError;
use crate::resource::ResourceKey;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<ResourceKey, Vec<Value>>,
    next_id: u64,
    /// Number of upcoming writes (POST/PUT/DELETE) that fail.
    failing_writes: usize,
    offline: bool,
    delay: Duration,
    log: Vec<String>,
}

#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace a collection's stored contents.
    pub fn seed<T: serde::Serialize>(&self, key: ResourceKey, items: &[T]) {
        let values = items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect();
        self.state().collections.insert(key, values);
    }

    /// Stored contents of a collection, decoded.
    pub fn snapshot<T: serde::de::DeserializeOwned>(&self, key: ResourceKey) -> Vec<T> {
        self.state()
            .collections
            .get(&key)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.state().failing_writes = count;
    }

    /// Fail every request, reads included, while set.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Delay every response.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Requests seen so far, as `METHOD /path`.
    pub fn requests(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn clear_requests(&self) {
        self.state().log.clear();
    }

    /// Log the request, apply latency and injected failures.
    async fn admit(&self, method: &str, path: &str, write: bool) -> Result<(), RemoteError> {
        let delay = {
            let mut state = self.state();
            state.log.push(format!("{} {}", method, path));
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.offline {
            return Err(RemoteError::Unavailable(format!("{} {}", method, path)));
        }
        if write && state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(RemoteError::Unavailable(format!("{} {}", method, path)));
        }
        Ok(())
    }
}

/// Split `/tasks/abc` into the collection key and the decoded id.
fn parse_path(path: &str) -> Result<(ResourceKey, Option<String>), RemoteError> {
    let path = path.split('?').next().unwrap_or(path);
    let trimmed = path.trim_start_matches('/');
    let (collection, id) = match trimmed.split_once('/') {
        Some((c, id)) => (c, Some(percent_decode_str(id).decode_utf8_lossy().into_owned())),
        None => (trimmed, None),
    };
    let key = ResourceKey::from_path(&format!("/{}", collection))
        .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
    Ok((key, id))
}

fn id_of(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

#[async_trait]
impl Remote for MemoryRemote {
    async fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.admit("GET", path, false).await?;
        let (key, id) = parse_path(path)?;
        let state = self.state();
        let items = state.collections.get(&key).cloned().unwrap_or_default();
        match id {
            None => Ok(Value::Array(items)),
            Some(id) => items
                .into_iter()
                .find(|v| id_of(v) == Some(id.as_str()))
                .ok_or_else(|| RemoteError::NotFound(path.to_string())),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.admit("POST", path, true).await?;
        let (key, id) = parse_path(path)?;
        if id.is_some() {
            return Err(RemoteError::Status {
                method: "POST",
                path: path.to_string(),
                status: 405,
                body: String::new(),
            });
        }
        let mut entity = body.clone();
        let Value::Object(map) = &mut entity else {
            return Err(RemoteError::Status {
                method: "POST",
                path: path.to_string(),
                status: 400,
                body: "expected a JSON object".to_string(),
            });
        };

        let mut state = self.state();
        state.next_id += 1;
        let new_id = format!("{:06x}", state.next_id);
        map.insert("id".to_string(), Value::String(new_id));
        state.collections.entry(key).or_default().push(entity.clone());
        Ok(entity)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.admit("PUT", path, true).await?;
        let (key, id) = parse_path(path)?;
        let id = id.ok_or_else(|| RemoteError::NotFound(path.to_string()))?;

        let mut entity = body.clone();
        if let Value::Object(map) = &mut entity {
            map.insert("id".to_string(), Value::String(id.clone()));
        }

        let mut state = self.state();
        let items = state.collections.entry(key).or_default();
        let slot = items
            .iter_mut()
            .find(|v| id_of(v) == Some(id.as_str()))
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        *slot = entity.clone();
        Ok(entity)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.admit("DELETE", path, true).await?;
        let (key, id) = parse_path(path)?;
        let id = id.ok_or_else(|| RemoteError::NotFound(path.to_string()))?;

        let mut state = self.state();
        let items = state.collections.entry(key).or_default();
        let before = items.len();
        items.retain(|v| id_of(v) != Some(id.as_str()));
        if items.len() == before {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        Ok(())
    }
}
