/// Board aggregation.
///
/// Boards, columns and tasks are fetched as three flat, independent
/// collections. The view for one board is rebuilt from them whenever the
/// selection or any of the collections changes; it is never mutated itself.
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::types::{Board, Column, Task};

/// Denormalized projection of one board: the board's own fields plus its
/// active columns and the tasks they reference, indexed by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub columns: HashMap<String, Column>,
    pub tasks: HashMap<String, Task>,
}

/// Result of aggregating the current collections for a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardViewState {
    Ready(BoardView),
    /// A collection the view depends on has not been fetched yet.
    NotLoaded,
    /// Nothing selected, or the selection is unknown, archived or not visible
    /// to the viewer.
    NotFound,
}

impl BoardViewState {
    pub fn view(&self) -> Option<&BoardView> {
        match self {
            BoardViewState::Ready(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<BoardView> {
        match self {
            BoardViewState::Ready(view) => Some(view),
            _ => None,
        }
    }
}

/// Inputs to [`aggregate`]. Each collection is `None` until it has loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collections<'a> {
    pub boards: Option<&'a [Board]>,
    pub columns: Option<&'a [Column]>,
    pub tasks: Option<&'a [Task]>,
}

/// Build the view for `selected`.
///
/// When `viewer` is given, the board must list that user among its members.
/// A task id referenced by a column but missing from `tasks` is left out of
/// the view; a missing lookup means "not loaded yet", not "deleted".
pub fn aggregate(
    selected: Option<&str>,
    viewer: Option<&str>,
    collections: Collections<'_>,
) -> BoardViewState {
    let Some(selected) = selected else {
        return BoardViewState::NotFound;
    };
    let Some(boards) = collections.boards else {
        return BoardViewState::NotLoaded;
    };

    let board = boards
        .iter()
        .find(|b| b.id == selected && !b.archived && viewer.map_or(true, |u| b.has_member(u)));
    let Some(board) = board else {
        return BoardViewState::NotFound;
    };

    let Some(all_columns) = collections.columns else {
        return BoardViewState::NotLoaded;
    };

    let columns: HashMap<String, Column> = all_columns
        .iter()
        .filter(|c| c.board_id == board.id && !c.archived)
        .map(|c| (c.id.clone(), c.clone()))
        .collect();

    let referenced: HashSet<&str> = columns
        .values()
        .flat_map(|c| c.task_ids.iter().map(String::as_str))
        .collect();

    let tasks: HashMap<String, Task> = collections
        .tasks
        .unwrap_or_default()
        .iter()
        .filter(|t| referenced.contains(t.id.as_str()))
        .map(|t| (t.id.clone(), t.clone()))
        .collect();

    if collections.tasks.is_some() && tasks.len() < referenced.len() {
        log::debug!(
            target: "taskboard.aggregate",
            "Board {}: {} referenced task(s) not loaded yet",
            board.id,
            referenced.len() - tasks.len()
        );
    }

    BoardViewState::Ready(BoardView {
        board: board.clone(),
        columns,
        tasks,
    })
}

impl BoardView {
    /// Active columns in board order. Ids in the board's sequence without an
    /// active column (archived, other board, not loaded) are skipped.
    pub fn ordered_columns(&self) -> Vec<&Column> {
        self.board
            .column_ids
            .iter()
            .filter_map(|id| self.columns.get(id))
            .collect()
    }

    /// Renderable tasks of a column in sequence order: archived tasks and ids
    /// that have not loaded are skipped.
    pub fn column_tasks(&self, column_id: &str) -> Vec<&Task> {
        self.columns
            .get(column_id)
            .map(|c| {
                c.task_ids
                    .iter()
                    .filter_map(|id| self.tasks.get(id))
                    .filter(|t| !t.archived)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Translate a position in [`column_tasks`](Self::column_tasks) into a
    /// position in the column's full sequence, which also holds archived and
    /// unloaded ids. Positions past the visible end map to the sequence end.
    pub fn sequence_index(&self, column_id: &str, visible_index: usize) -> usize {
        let Some(column) = self.columns.get(column_id) else {
            return visible_index;
        };
        self.column_tasks(column_id)
            .get(visible_index)
            .and_then(|task| column.task_ids.iter().position(|id| *id == task.id))
            .unwrap_or(column.task_ids.len())
    }

    /// Archived tasks paired with the column that still lists them, in board
    /// then sequence order. These are the candidates for unarchiving.
    pub fn archived_tasks(&self) -> Vec<(&Task, &str)> {
        self.ordered_columns()
            .into_iter()
            .flat_map(move |c| {
                c.task_ids
                    .iter()
                    .filter_map(move |id| self.tasks.get(id))
                    .filter(|t| t.archived)
                    .map(move |t| (t, c.id.as_str()))
            })
            .collect()
    }

    /// The active column whose sequence holds `task_id`.
    pub fn column_of_task(&self, task_id: &str) -> Option<&Column> {
        self.columns
            .values()
            .find(|c| c.task_ids.iter().any(|t| t == task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(id: &str, cols: &[&str]) -> Board {
        Board {
            id: id.into(),
            name: format!("Board {}", id),
            archived: false,
            user_ids: vec!["u1".into()],
            column_ids: cols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn column(id: &str, board_id: &str, tasks: &[&str]) -> Column {
        Column {
            id: id.into(),
            board_id: board_id.into(),
            archived: false,
            name: id.to_uppercase(),
            task_ids: tasks.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn task(id: &str) -> Task {
        crate::types::TaskDraft::named(id).into_task(id.into())
    }

    fn fixture() -> (Vec<Board>, Vec<Column>, Vec<Task>) {
        let boards = vec![board("b1", &["a", "b", "z"]), board("b2", &["c"])];
        let mut archived = column("z", "b1", &["t4"]);
        archived.archived = true;
        let columns = vec![
            column("a", "b1", &["t1", "t2"]),
            column("b", "b1", &["t3", "ghost"]),
            archived,
            column("c", "b2", &["t5"]),
        ];
        let tasks = ["t1", "t2", "t3", "t4", "t5", "orphan"]
            .iter()
            .map(|id| task(id))
            .collect();
        (boards, columns, tasks)
    }

    fn collections<'a>(
        boards: &'a [Board],
        columns: &'a [Column],
        tasks: &'a [Task],
    ) -> Collections<'a> {
        Collections {
            boards: Some(boards),
            columns: Some(columns),
            tasks: Some(tasks),
        }
    }

    #[test]
    fn test_view_holds_exactly_active_columns_and_their_tasks() {
        let (boards, columns, tasks) = fixture();
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();

        let mut col_ids: Vec<_> = view.columns.keys().cloned().collect();
        col_ids.sort();
        assert_eq!(col_ids, vec!["a", "b"]);

        let mut task_ids: Vec<_> = view.tasks.keys().cloned().collect();
        task_ids.sort();
        assert_eq!(task_ids, vec!["t1", "t2", "t3"]);
        assert_eq!(view.board.name, "Board b1");
    }

    #[test]
    fn test_missing_task_is_omitted_not_fatal() {
        let (boards, columns, tasks) = fixture();
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();
        assert!(!view.tasks.contains_key("ghost"));
        let names: Vec<_> = view.column_tasks("b").iter().map(|t| t.id.clone()).collect();
        assert_eq!(names, vec!["t3"]);
    }

    #[test]
    fn test_no_selection_and_unknown_board_are_not_found() {
        let (boards, columns, tasks) = fixture();
        let c = collections(&boards, &columns, &tasks);
        assert_eq!(aggregate(None, None, c), BoardViewState::NotFound);
        assert_eq!(aggregate(Some("nope"), None, c), BoardViewState::NotFound);
    }

    #[test]
    fn test_unloaded_collections() {
        let (boards, columns, _) = fixture();
        assert_eq!(
            aggregate(Some("b1"), None, Collections::default()),
            BoardViewState::NotLoaded
        );
        let only_boards = Collections {
            boards: Some(&boards),
            ..Default::default()
        };
        assert_eq!(aggregate(Some("b1"), None, only_boards), BoardViewState::NotLoaded);

        let no_tasks = Collections {
            boards: Some(&boards),
            columns: Some(&columns),
            tasks: None,
        };
        let view = aggregate(Some("b1"), None, no_tasks).into_view().unwrap();
        assert_eq!(view.columns.len(), 2);
        assert!(view.tasks.is_empty());
    }

    #[test]
    fn test_archived_board_and_member_scoping() {
        let (mut boards, columns, tasks) = fixture();
        assert!(aggregate(Some("b1"), Some("u1"), collections(&boards, &columns, &tasks))
            .view()
            .is_some());
        assert_eq!(
            aggregate(Some("b1"), Some("u2"), collections(&boards, &columns, &tasks)),
            BoardViewState::NotFound
        );
        boards[0].archived = true;
        assert_eq!(
            aggregate(Some("b1"), None, collections(&boards, &columns, &tasks)),
            BoardViewState::NotFound
        );
    }

    #[test]
    fn test_archiving_column_drops_it_but_keeps_board_order() {
        let (boards, mut columns, tasks) = fixture();
        columns[0].archived = true;
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();
        assert!(!view.columns.contains_key("a"));
        assert_eq!(view.board.column_ids, vec!["a", "b", "z"]);
        let ordered: Vec<_> = view.ordered_columns().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ordered, vec!["b"]);
        assert!(!view.tasks.contains_key("t1"));
    }

    #[test]
    fn test_column_tasks_skip_archived() {
        let (boards, columns, mut tasks) = fixture();
        tasks[1].archived = true;
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();
        assert!(view.tasks.contains_key("t2"));
        let visible: Vec<_> = view.column_tasks("a").iter().map(|t| t.id.clone()).collect();
        assert_eq!(visible, vec!["t1"]);
        assert_eq!(view.column_of_task("t2").map(|c| c.id.as_str()), Some("a"));
    }

    #[test]
    fn test_archived_tasks_listed_with_their_column() {
        let (boards, columns, mut tasks) = fixture();
        tasks[2].archived = true;
        tasks[1].archived = true;
        tasks[3].archived = true;
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();
        let archived: Vec<_> = view
            .archived_tasks()
            .into_iter()
            .map(|(t, col)| (t.id.as_str(), col))
            .collect();
        assert_eq!(archived, vec![("t2", "a"), ("t3", "b")]);
    }

    #[test]
    fn test_sequence_index_skips_hidden_tasks() {
        let (boards, mut columns, mut tasks) = fixture();
        columns[0].task_ids = vec!["t1".into(), "t2".into(), "t3".into()];
        columns[1].task_ids = vec!["ghost".into()];
        tasks[1].archived = true;
        let view = aggregate(Some("b1"), None, collections(&boards, &columns, &tasks))
            .into_view()
            .unwrap();

        assert_eq!(view.sequence_index("a", 0), 0);
        assert_eq!(view.sequence_index("a", 1), 2);
        assert_eq!(view.sequence_index("a", 2), 3);
        assert_eq!(view.sequence_index("a", 9), 3);
        assert_eq!(view.sequence_index("b", 0), 1);
    }
}
