//! Domain core for taskboard: entity types, board aggregation and drag-drop
//! reorder planning. No I/O lives here.
pub mod aggregate;
pub mod reorder;
pub mod types;

pub use aggregate::{aggregate, BoardView, BoardViewState, Collections};
pub use reorder::{plan_drop, DragKind, DropLocation, DropResult, ReorderError, ReorderPlan};
pub use types::{Board, Column, Priority, Task, TaskDraft};
