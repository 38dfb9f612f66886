/// The three REST collections and typed access to them.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use taskboard_core::{Board, Column, Task};

/// Cache key: one per collection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKey {
    Boards,
    Columns,
    Tasks,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 3] = [ResourceKey::Boards, ResourceKey::Columns, ResourceKey::Tasks];

    /// Collection URL, e.g. `/columns`.
    pub fn path(self) -> &'static str {
        match self {
            ResourceKey::Boards => "/boards",
            ResourceKey::Columns => "/columns",
            ResourceKey::Tasks => "/tasks",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path() == path)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A cached collection value.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    Boards(Vec<Board>),
    Columns(Vec<Column>),
    Tasks(Vec<Task>),
}

impl Collection {
    pub fn key(&self) -> ResourceKey {
        match self {
            Collection::Boards(_) => ResourceKey::Boards,
            Collection::Columns(_) => ResourceKey::Columns,
            Collection::Tasks(_) => ResourceKey::Tasks,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Collection::Boards(v) => v.len(),
            Collection::Columns(v) => v.len(),
            Collection::Tasks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a GET response for `key`.
    pub fn decode(key: ResourceKey, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match key {
            ResourceKey::Boards => Collection::Boards(serde_json::from_value(value)?),
            ResourceKey::Columns => Collection::Columns(serde_json::from_value(value)?),
            ResourceKey::Tasks => Collection::Tasks(serde_json::from_value(value)?),
        })
    }

    /// Rewrite every occurrence of id `from` to `to`: entity ids as well as
    /// references held in id sequences and owner fields.
    pub fn rewrite_id(&mut self, from: &str, to: &str) -> usize {
        match self {
            Collection::Boards(v) => v.iter_mut().map(|b| b.rewrite_id(from, to)).sum(),
            Collection::Columns(v) => v.iter_mut().map(|c| c.rewrite_id(from, to)).sum(),
            Collection::Tasks(v) => v.iter_mut().map(|t| t.rewrite_id(from, to)).sum(),
        }
    }
}

/// An entity type stored under one [`ResourceKey`].
pub trait Resource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KEY: ResourceKey;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Replace `from` with `to` wherever this entity mentions it; returns the
    /// number of replacements.
    fn rewrite_id(&mut self, from: &str, to: &str) -> usize;

    fn wrap(items: Vec<Self>) -> Collection;

    fn items(collection: &Collection) -> Option<&[Self]>;

    fn items_mut(collection: &mut Collection) -> Option<&mut Vec<Self>>;
}

fn rewrite_one(slot: &mut String, from: &str, to: &str) -> usize {
    if *slot == from {
        *slot = to.to_string();
        1
    } else {
        0
    }
}

fn rewrite_seq(seq: &mut [String], from: &str, to: &str) -> usize {
    seq.iter_mut().map(|s| rewrite_one(s, from, to)).sum()
}

impl Resource for Board {
    const KEY: ResourceKey = ResourceKey::Boards;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn rewrite_id(&mut self, from: &str, to: &str) -> usize {
        rewrite_one(&mut self.id, from, to) + rewrite_seq(&mut self.column_ids, from, to)
    }

    fn wrap(items: Vec<Self>) -> Collection {
        Collection::Boards(items)
    }

    fn items(collection: &Collection) -> Option<&[Self]> {
        match collection {
            Collection::Boards(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn items_mut(collection: &mut Collection) -> Option<&mut Vec<Self>> {
        match collection {
            Collection::Boards(v) => Some(v),
            _ => None,
        }
    }
}

impl Resource for Column {
    const KEY: ResourceKey = ResourceKey::Columns;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn rewrite_id(&mut self, from: &str, to: &str) -> usize {
        rewrite_one(&mut self.id, from, to)
            + rewrite_one(&mut self.board_id, from, to)
            + rewrite_seq(&mut self.task_ids, from, to)
    }

    fn wrap(items: Vec<Self>) -> Collection {
        Collection::Columns(items)
    }

    fn items(collection: &Collection) -> Option<&[Self]> {
        match collection {
            Collection::Columns(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn items_mut(collection: &mut Collection) -> Option<&mut Vec<Self>> {
        match collection {
            Collection::Columns(v) => Some(v),
            _ => None,
        }
    }
}

impl Resource for Task {
    const KEY: ResourceKey = ResourceKey::Tasks;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn rewrite_id(&mut self, from: &str, to: &str) -> usize {
        rewrite_one(&mut self.id, from, to)
    }

    fn wrap(items: Vec<Self>) -> Collection {
        Collection::Tasks(items)
    }

    fn items(collection: &Collection) -> Option<&[Self]> {
        match collection {
            Collection::Tasks(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn items_mut(collection: &mut Collection) -> Option<&mut Vec<Self>> {
        match collection {
            Collection::Tasks(v) => Some(v),
            _ => None,
        }
    }
}
