/// Reorder engine: executes drag-drop plans against the cache and backend.
///
/// Column drags rewrite the board's `ordered` sequence and PUT the board.
/// Task drags rewrite one or two columns' `taskIds` and PUT each touched
/// column; for a cross-column move both PUTs must succeed or the whole column
/// collection is refetched. There is no undo log: a failed write is
/// discarded by revalidating.
use futures_util::future::try_join_all;
use taskboard_core::{plan_drop, Board, Column, DropResult, ReorderPlan};

use crate::client::{Outcome, SyncClient};
use crate::error::SyncError;
use crate::remote;
use crate::resource::ResourceKey;

impl SyncClient {
    /// Handle a drag-end event for the board `board_id`.
    ///
    /// Stale or malformed drops are rejected with `Err` before anything is
    /// written.
    pub async fn apply_drop(&self, board_id: &str, drop: &DropResult) -> Result<Outcome, SyncError> {
        let view = self
            .board_view(Some(board_id))
            .into_view()
            .ok_or_else(|| SyncError::ViewUnavailable(board_id.to_string()))?;
        let plan = plan_drop(&view, drop)?;
        log::debug!(
            target: "taskboard.engine",
            "Drop of {} on board {}: {:?}",
            drop.draggable_id,
            board_id,
            plan
        );
        Ok(self.execute_plan(plan).await)
    }

    pub async fn execute_plan(&self, plan: ReorderPlan) -> Outcome {
        match plan {
            ReorderPlan::Noop => Outcome::Noop,
            ReorderPlan::Columns {
                board_id,
                column_ids,
            } => self.reorder_columns(&board_id, column_ids).await,
            ReorderPlan::SameColumn { column } => {
                self.write_task_orders("move task", vec![column]).await
            }
            ReorderPlan::CrossColumn {
                source,
                destination,
            } => {
                self.write_task_orders("move task between columns", vec![source, destination])
                    .await
            }
        }
    }

    async fn reorder_columns(&self, board_id: &str, column_ids: Vec<String>) -> Outcome {
        self.cache.mutate::<Board>(|boards| {
            if let Some(board) = boards.iter_mut().find(|b| b.id == board_id) {
                board.column_ids = column_ids;
            }
        });

        let Some(board) = self.cache.find::<Board>(board_id) else {
            return Outcome::Noop;
        };

        match remote::replace(self.remote(), &board).await {
            Ok(()) => {
                self.confirm(&[ResourceKey::Boards]).await;
                Outcome::Applied(())
            }
            Err(e) => self.revert("move column", &[ResourceKey::Boards], e).await,
        }
    }

    /// Write the task sequences of `planned` into the cache, then PUT each
    /// column as currently cached.
    async fn write_task_orders(&self, operation: &str, planned: Vec<Column>) -> Outcome {
        self.cache.mutate::<Column>(|columns| {
            for column in columns.iter_mut() {
                if let Some(p) = planned.iter().find(|p| p.id == column.id) {
                    column.task_ids = p.task_ids.clone();
                }
            }
        });

        let to_persist: Vec<Column> = planned
            .iter()
            .filter_map(|p| self.cache.find::<Column>(&p.id))
            .collect();

        let writes = to_persist.iter().map(|c| remote::replace(self.remote(), c));
        match try_join_all(writes).await {
            Ok(_) => {
                self.confirm(&[ResourceKey::Columns]).await;
                Outcome::Applied(())
            }
            Err(e) => self.revert(operation, &[ResourceKey::Columns], e).await,
        }
    }
}
