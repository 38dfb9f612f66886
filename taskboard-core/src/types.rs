use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix of ids minted on the client before the server has assigned one.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Whether an id was minted locally and still awaits its server id.
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    #[serde(alias = "baixa")]
    Low,
    #[serde(alias = "média", alias = "media")]
    Medium,
    #[serde(alias = "alta")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    /// Assigned users. `{ "name": .. }` entries are read as their name.
    #[serde(default, deserialize_with = "assignee::deserialize")]
    pub assignee: Vec<String>,
    #[serde(default, with = "due_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
}

/// An ordered bucket of tasks. The position of a task belongs to the column
/// holding its id, not to the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub board_id: String,
    #[serde(default)]
    pub archived: bool,
    pub name: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

/// The backend stores the column list twice, as `ordered` (display order)
/// and `columnIds` (membership). Both are read, `ordered` wins, and both are
/// written back so a full-replace PUT keeps them in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoardWire", into = "BoardWire")]
pub struct Board {
    pub id: String,
    pub name: String,
    pub archived: bool,
    pub user_ids: Vec<String>,
    /// Authoritative column order.
    pub column_ids: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardWire {
    id: String,
    name: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    users_ids: Vec<String>,
    #[serde(default)]
    ordered: Option<Vec<String>>,
    #[serde(default)]
    column_ids: Option<Vec<String>>,
}

impl From<BoardWire> for Board {
    fn from(wire: BoardWire) -> Self {
        Board {
            id: wire.id,
            name: wire.name,
            archived: wire.archived,
            user_ids: wire.users_ids,
            column_ids: wire.ordered.or(wire.column_ids).unwrap_or_default(),
        }
    }
}

impl From<Board> for BoardWire {
    fn from(board: Board) -> Self {
        BoardWire {
            id: board.id,
            name: board.name,
            archived: board.archived,
            users_ids: board.user_ids,
            ordered: Some(board.column_ids.clone()),
            column_ids: Some(board.column_ids),
        }
    }
}

impl Board {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|u| u == user_id)
    }
}

/// Fields the caller supplies when creating a task; the id is assigned later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    pub priority: Priority,
    pub categories: BTreeSet<String>,
    pub description: String,
    pub assignee: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub reporter: Option<String>,
}

impl TaskDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            name: self.name,
            archived: false,
            priority: self.priority,
            categories: self.categories,
            description: self.description,
            assignee: self.assignee,
            due_date: self.due_date,
            reporter: self.reporter,
        }
    }
}

mod assignee {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Plain(String),
        Named {
            #[serde(default)]
            name: Option<String>,
        },
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let entries: Option<Vec<Entry>> = Option::deserialize(d)?;
        Ok(entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Plain(s) => Some(s),
                Entry::Named { name } => name,
            })
            .collect())
    }
}

/// Due dates travel as `DD/MM/YYYY`; ISO dates are accepted on input.
mod due_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const WIRE_FORMAT: &str = "%d/%m/%Y";
    const ISO_FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(WIRE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        let Some(raw) = raw else { return Ok(None) };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        // Full timestamps keep only their date part.
        let date_part = raw.split('T').next().unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, WIRE_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(date_part, ISO_FORMAT))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
