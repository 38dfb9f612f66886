/// Drag-and-drop reordering.
///
/// A drop is turned into a plan against the current [`BoardView`]: the new
/// column order for the board, or the new task sequence of one or two
/// columns. Planning writes nothing; executing a plan is the caller's job.
///
/// Every move is a single-element splice: the id is removed at the source
/// index and the dragged id inserted at the destination index, so everything
/// between the two positions shifts by one.
use serde::{Deserialize, Serialize};

use crate::aggregate::BoardView;
use crate::types::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DragKind {
    Column,
    Task,
}

/// A droppable zone (a column id, or the board for column drags) and a
/// position inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropLocation {
    pub droppable_id: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(droppable_id: impl Into<String>, index: usize) -> Self {
        Self {
            droppable_id: droppable_id.into(),
            index,
        }
    }
}

/// The drag-end event raised by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropResult {
    pub draggable_id: String,
    #[serde(rename = "type")]
    pub kind: DragKind,
    pub source: DropLocation,
    /// `None` when the item was dropped outside any droppable.
    pub destination: Option<DropLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReorderPlan {
    Noop,
    /// New column order for a board.
    Columns {
        board_id: String,
        column_ids: Vec<String>,
    },
    /// One column with its reordered task sequence.
    SameColumn { column: Column },
    /// Source and destination columns, both with updated sequences.
    CrossColumn { source: Column, destination: Column },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReorderError {
    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Expected {expected} at index {index}, found {found}")]
    DraggedIdMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Column not in view: {0}")]
    UnknownColumn(String),
}

/// Remove the id at `from` and insert `id` at `to`.
///
/// `to` is the index in the resulting sequence; values past the end append.
/// The id at `from` must be `id`, otherwise the caller is working from a
/// stale sequence.
pub fn move_id(seq: &[String], from: usize, to: usize, id: &str) -> Result<Vec<String>, ReorderError> {
    let mut out = seq.to_vec();
    take_at(&mut out, from, id)?;
    let to = to.min(out.len());
    out.insert(to, id.to_string());
    Ok(out)
}

/// Move `id` from index `from` of `source` to index `to` of `destination`.
pub fn transfer_id(
    source: &[String],
    destination: &[String],
    from: usize,
    to: usize,
    id: &str,
) -> Result<(Vec<String>, Vec<String>), ReorderError> {
    let mut src = source.to_vec();
    take_at(&mut src, from, id)?;
    let mut dst = destination.to_vec();
    let to = to.min(dst.len());
    dst.insert(to, id.to_string());
    Ok((src, dst))
}

fn take_at(seq: &mut Vec<String>, index: usize, id: &str) -> Result<(), ReorderError> {
    match seq.get(index) {
        None => Err(ReorderError::IndexOutOfRange {
            index,
            len: seq.len(),
        }),
        Some(found) if found != id => Err(ReorderError::DraggedIdMismatch {
            index,
            expected: id.to_string(),
            found: found.clone(),
        }),
        Some(_) => {
            seq.remove(index);
            Ok(())
        }
    }
}

/// Compute the writes a drop requires.
pub fn plan_drop(view: &BoardView, drop: &DropResult) -> Result<ReorderPlan, ReorderError> {
    let Some(destination) = &drop.destination else {
        return Ok(ReorderPlan::Noop);
    };
    let source = &drop.source;
    if destination.droppable_id == source.droppable_id && destination.index == source.index {
        return Ok(ReorderPlan::Noop);
    }

    match drop.kind {
        DragKind::Column => {
            let column_ids = move_id(
                &view.board.column_ids,
                source.index,
                destination.index,
                &drop.draggable_id,
            )?;
            Ok(ReorderPlan::Columns {
                board_id: view.board.id.clone(),
                column_ids,
            })
        }
        DragKind::Task => {
            let src = view_column(view, &source.droppable_id)?;
            let dst = view_column(view, &destination.droppable_id)?;

            if src.id == dst.id {
                let task_ids =
                    move_id(&src.task_ids, source.index, destination.index, &drop.draggable_id)?;
                return Ok(ReorderPlan::SameColumn {
                    column: Column {
                        task_ids,
                        ..src.clone()
                    },
                });
            }

            let (src_ids, dst_ids) = transfer_id(
                &src.task_ids,
                &dst.task_ids,
                source.index,
                destination.index,
                &drop.draggable_id,
            )?;
            Ok(ReorderPlan::CrossColumn {
                source: Column {
                    task_ids: src_ids,
                    ..src.clone()
                },
                destination: Column {
                    task_ids: dst_ids,
                    ..dst.clone()
                },
            })
        }
    }
}

fn view_column<'a>(view: &'a BoardView, id: &str) -> Result<&'a Column, ReorderError> {
    view.columns
        .get(id)
        .ok_or_else(|| ReorderError::UnknownColumn(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Board;
    use std::collections::HashMap;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn view(columns: Vec<(&str, Vec<&str>)>) -> BoardView {
        let board = Board {
            id: "b1".into(),
            name: "Board".into(),
            archived: false,
            user_ids: vec![],
            column_ids: columns.iter().map(|(id, _)| id.to_string()).collect(),
        };
        let columns: HashMap<String, Column> = columns
            .iter()
            .map(|(id, tasks)| {
                (
                    id.to_string(),
                    Column {
                        id: id.to_string(),
                        board_id: "b1".into(),
                        archived: false,
                        name: id.to_string(),
                        task_ids: ids(&tasks),
                    },
                )
            })
            .collect();
        BoardView {
            board,
            columns,
            tasks: HashMap::new(),
        }
    }

    fn drop_event(kind: DragKind, id: &str, from: (&str, usize), to: Option<(&str, usize)>) -> DropResult {
        DropResult {
            draggable_id: id.into(),
            kind,
            source: DropLocation::new(from.0, from.1),
            destination: to.map(|(d, i)| DropLocation::new(d, i)),
        }
    }

    #[test]
    fn test_move_last_column_to_front() {
        let v = view(vec![("A", vec![]), ("B", vec![]), ("C", vec![])]);
        let plan = plan_drop(&v, &drop_event(DragKind::Column, "C", ("board", 2), Some(("board", 0)))).unwrap();
        assert_eq!(
            plan,
            ReorderPlan::Columns {
                board_id: "b1".into(),
                column_ids: ids(&["C", "A", "B"]),
            }
        );
    }

    #[test]
    fn test_drop_on_own_position_is_noop() {
        let v = view(vec![("A", vec![]), ("B", vec![])]);
        let plan = plan_drop(&v, &drop_event(DragKind::Column, "B", ("board", 1), Some(("board", 1)))).unwrap();
        assert_eq!(plan, ReorderPlan::Noop);
    }

    #[test]
    fn test_drop_outside_is_noop() {
        let v = view(vec![("A", vec!["t1"])]);
        let plan = plan_drop(&v, &drop_event(DragKind::Task, "t1", ("A", 0), None)).unwrap();
        assert_eq!(plan, ReorderPlan::Noop);
    }

    #[test]
    fn test_cross_column_move_into_empty_column() {
        let v = view(vec![("A", vec!["t1", "t2"]), ("B", vec![])]);
        let plan = plan_drop(&v, &drop_event(DragKind::Task, "t1", ("A", 0), Some(("B", 0)))).unwrap();
        match plan {
            ReorderPlan::CrossColumn { source, destination } => {
                assert_eq!(source.id, "A");
                assert_eq!(source.task_ids, ids(&["t2"]));
                assert_eq!(destination.id, "B");
                assert_eq!(destination.task_ids, ids(&["t1"]));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_same_column_move_down() {
        let v = view(vec![("A", vec!["t1", "t2", "t3", "t4"])]);
        let plan = plan_drop(&v, &drop_event(DragKind::Task, "t1", ("A", 0), Some(("A", 2)))).unwrap();
        match plan {
            ReorderPlan::SameColumn { column } => {
                assert_eq!(column.task_ids, ids(&["t2", "t3", "t1", "t4"]));
                assert_eq!(column.name, "A");
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_same_column_moves_preserve_ids() {
        let seq = ids(&["a", "b", "c", "d", "e"]);
        for from in 0..seq.len() {
            for to in 0..seq.len() {
                let moved = move_id(&seq, from, to, &seq[from]).unwrap();
                assert_eq!(moved.len(), seq.len());
                assert_eq!(moved[to], seq[from]);
                let mut sorted = moved.clone();
                sorted.sort();
                assert_eq!(sorted, seq, "from {} to {}", from, to);
            }
        }
    }

    #[test]
    fn test_transfer_touches_each_column_once() {
        let src = ids(&["a", "b", "c"]);
        let dst = ids(&["x", "y"]);
        for from in 0..src.len() {
            for to in 0..=dst.len() {
                let (s, d) = transfer_id(&src, &dst, from, to, &src[from]).unwrap();
                let id = &src[from];
                assert!(!s.contains(id));
                assert_eq!(d.iter().filter(|t| *t == id).count(), 1);
                assert_eq!(d[to], *id);
                let others: Vec<_> = src.iter().filter(|t| *t != id).cloned().collect();
                assert_eq!(s, others);
                let kept: Vec<_> = d.iter().filter(|t| *t != id).cloned().collect();
                assert_eq!(kept, dst);
            }
        }
    }

    #[test]
    fn test_destination_past_end_appends() {
        let moved = move_id(&ids(&["a", "b", "c"]), 0, 10, "a").unwrap();
        assert_eq!(moved, ids(&["b", "c", "a"]));
    }

    #[test]
    fn test_stale_drag_is_rejected() {
        let v = view(vec![("A", vec!["t1", "t2"]), ("B", vec![])]);
        let err = plan_drop(&v, &drop_event(DragKind::Task, "t2", ("A", 0), Some(("B", 0)))).unwrap_err();
        assert!(matches!(err, ReorderError::DraggedIdMismatch { index: 0, .. }));

        let err = plan_drop(&v, &drop_event(DragKind::Task, "t1", ("A", 5), Some(("B", 0)))).unwrap_err();
        assert_eq!(err, ReorderError::IndexOutOfRange { index: 5, len: 2 });

        let err = plan_drop(&v, &drop_event(DragKind::Task, "t1", ("A", 0), Some(("Z", 0)))).unwrap_err();
        assert_eq!(err, ReorderError::UnknownColumn("Z".into()));
    }

    #[test]
    fn test_drop_result_wire_shape() {
        let json = r#"{"draggableId":"t1","type":"TASK","source":{"droppableId":"A","index":0},"destination":null}"#;
        let d: DropResult = serde_json::from_str(json).unwrap();
        assert_eq!(d.kind, DragKind::Task);
        assert!(d.destination.is_none());
    }
}
