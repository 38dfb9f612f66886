/// Board, column and task CRUD.
///
/// Creates mint a `tmp-` id, insert the entity and its reference into the
/// cache, POST it and then rewrite the temporary id to the server's id
/// everywhere it appears. Updates and archive toggles PUT the full entity.
/// Archiving a column leaves it in the board's `ordered` list; the view skips
/// it. Deletes purge the id from its owner before the DELETE; deleting a
/// board deletes its columns too.
use futures_util::future::try_join_all;
use taskboard_core::types::{is_temp_id, TEMP_ID_PREFIX};
use taskboard_core::{Board, Column, Task, TaskDraft};
use uuid::Uuid;

use crate::client::{Outcome, SyncClient};
use crate::error::{RemoteError, SyncError};
use crate::remote;
use crate::resource::{Resource, ResourceKey};

fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4().simple())
}

fn valid_name(name: &str) -> Result<String, SyncError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SyncError::EmptyName);
    }
    Ok(name.to_string())
}

fn settled(id: &str) -> Result<(), SyncError> {
    if is_temp_id(id) {
        return Err(SyncError::PendingId(id.to_string()));
    }
    Ok(())
}

impl SyncClient {
    // ── Boards ──────────────────────────────────────────────────────────

    pub async fn create_board(
        &self,
        name: &str,
        members: Vec<String>,
    ) -> Result<Outcome<Board>, SyncError> {
        let name = valid_name(name)?;
        self.require_loaded(ResourceKey::Boards)?;

        let board = Board {
            id: temp_id(),
            name,
            archived: false,
            user_ids: members,
            column_ids: Vec::new(),
        };
        let pending = board.clone();
        self.cache.mutate::<Board>(|boards| boards.push(pending));

        match self.post_pending(&board).await {
            Ok(created) => {
                self.confirm(&[ResourceKey::Boards]).await;
                Ok(Outcome::Applied(created))
            }
            Err(e) => Ok(self.revert("create board", &[ResourceKey::Boards], e).await),
        }
    }

    pub async fn rename_board(&self, id: &str, name: &str) -> Result<Outcome<Board>, SyncError> {
        let name = valid_name(name)?;
        self.update_entity::<Board>("rename board", id, SyncError::UnknownBoard, |b| {
            b.name = name
        })
        .await
    }

    pub async fn set_board_archived(
        &self,
        id: &str,
        archived: bool,
    ) -> Result<Outcome<Board>, SyncError> {
        self.update_entity::<Board>("archive board", id, SyncError::UnknownBoard, |b| {
            b.archived = archived
        })
        .await
    }

    /// Delete a board together with its columns. Columns go first so a
    /// failure part way never leaves columns pointing at a missing board.
    pub async fn delete_board(&self, id: &str) -> Result<Outcome, SyncError> {
        let board = self.require::<Board>(id, SyncError::UnknownBoard)?;
        settled(id)?;
        self.require_loaded(ResourceKey::Columns)?;

        let mut column_ids: Vec<String> = board.column_ids.clone();
        self.cache.read::<Column, _>(|columns| {
            for c in columns.unwrap_or_default() {
                if c.board_id == id && !column_ids.contains(&c.id) {
                    column_ids.push(c.id.clone());
                }
            }
        });
        column_ids.retain(|c| !is_temp_id(c));

        self.cache.mutate::<Column>(|columns| {
            columns.retain(|c| c.board_id != id && !column_ids.contains(&c.id))
        });
        self.cache
            .mutate::<Board>(|boards| boards.retain(|b| b.id != id));

        let keys = [ResourceKey::Boards, ResourceKey::Columns];
        let deletes = column_ids.iter().map(|c| async move {
            match remote::remove::<Column>(self.remote(), c).await {
                Err(RemoteError::NotFound(_)) => Ok(()),
                other => other,
            }
        });
        if let Err(e) = try_join_all(deletes).await {
            return Ok(self.revert("delete board", &keys, e).await);
        }
        match remote::remove::<Board>(self.remote(), id).await {
            Ok(()) => {
                log::info!(
                    target: "taskboard.ops",
                    "Deleted board {} with {} column(s)",
                    id,
                    column_ids.len()
                );
                self.confirm(&keys).await;
                Ok(Outcome::Applied(()))
            }
            Err(e) => Ok(self.revert("delete board", &keys, e).await),
        }
    }

    // ── Columns ─────────────────────────────────────────────────────────

    /// Create a column at the end of the board's column order.
    pub async fn create_column(
        &self,
        board_id: &str,
        name: &str,
    ) -> Result<Outcome<Column>, SyncError> {
        let name = valid_name(name)?;
        self.require_loaded(ResourceKey::Columns)?;
        self.require::<Board>(board_id, SyncError::UnknownBoard)?;
        settled(board_id)?;

        let column = Column {
            id: temp_id(),
            board_id: board_id.to_string(),
            archived: false,
            name,
            task_ids: Vec::new(),
        };
        let pending = column.clone();
        let temp = column.id.clone();
        self.cache.mutate::<Column>(|columns| columns.push(pending));
        self.cache.mutate::<Board>(|boards| {
            if let Some(b) = boards.iter_mut().find(|b| b.id == board_id) {
                b.column_ids.push(temp);
            }
        });

        let keys = [ResourceKey::Columns, ResourceKey::Boards];
        let created = match self.post_pending(&column).await {
            Ok(c) => c,
            Err(e) => return Ok(self.revert("create column", &keys, e).await),
        };
        Ok(self
            .persist_owner::<Board>("create column", board_id, &keys)
            .await
            .map(|()| created))
    }

    pub async fn rename_column(&self, id: &str, name: &str) -> Result<Outcome<Column>, SyncError> {
        let name = valid_name(name)?;
        self.update_entity::<Column>("rename column", id, SyncError::UnknownColumn, |c| {
            c.name = name
        })
        .await
    }

    /// Soft delete. The board keeps the id in its order so unarchiving puts
    /// the column back where it was.
    pub async fn set_column_archived(
        &self,
        id: &str,
        archived: bool,
    ) -> Result<Outcome<Column>, SyncError> {
        self.update_entity::<Column>("archive column", id, SyncError::UnknownColumn, |c| {
            c.archived = archived
        })
        .await
    }

    pub async fn delete_column(&self, id: &str) -> Result<Outcome, SyncError> {
        let column = self.require::<Column>(id, SyncError::UnknownColumn)?;
        settled(id)?;

        self.cache
            .mutate::<Column>(|columns| columns.retain(|c| c.id != id));
        self.cache.mutate::<Board>(|boards| {
            if let Some(b) = boards.iter_mut().find(|b| b.id == column.board_id) {
                b.column_ids.retain(|c| c != id);
            }
        });

        let keys = [ResourceKey::Columns, ResourceKey::Boards];
        if let Err(e) = remote::remove::<Column>(self.remote(), id).await {
            return Ok(self.revert("delete column", &keys, e).await);
        }
        Ok(self
            .persist_owner::<Board>("delete column", &column.board_id, &keys)
            .await)
    }

    // ── Tasks ───────────────────────────────────────────────────────────

    /// Create a task at the bottom of `column_id`.
    pub async fn create_task(
        &self,
        column_id: &str,
        draft: TaskDraft,
    ) -> Result<Outcome<Task>, SyncError> {
        let name = valid_name(&draft.name)?;
        self.require_loaded(ResourceKey::Tasks)?;
        self.require::<Column>(column_id, SyncError::UnknownColumn)?;
        settled(column_id)?;

        let task = TaskDraft { name, ..draft }.into_task(temp_id());
        let pending = task.clone();
        let temp = task.id.clone();
        self.cache.mutate::<Task>(|tasks| tasks.push(pending));
        self.cache.mutate::<Column>(|columns| {
            if let Some(c) = columns.iter_mut().find(|c| c.id == column_id) {
                c.task_ids.push(temp);
            }
        });

        let keys = [ResourceKey::Tasks, ResourceKey::Columns];
        let created = match self.post_pending(&task).await {
            Ok(t) => t,
            Err(e) => return Ok(self.revert("create task", &keys, e).await),
        };
        Ok(self
            .persist_owner::<Column>("create task", column_id, &keys)
            .await
            .map(|()| created))
    }

    /// Replace a task with `task`, matched by id.
    pub async fn update_task(&self, task: Task) -> Result<Outcome<Task>, SyncError> {
        let name = valid_name(&task.name)?;
        let id = task.id.clone();
        self.update_entity::<Task>("update task", &id, SyncError::UnknownTask, |t| {
            *t = Task { name, ..task }
        })
        .await
    }

    pub async fn set_task_archived(
        &self,
        id: &str,
        archived: bool,
    ) -> Result<Outcome<Task>, SyncError> {
        self.update_entity::<Task>("archive task", id, SyncError::UnknownTask, |t| {
            t.archived = archived
        })
        .await
    }

    pub async fn delete_task(&self, id: &str) -> Result<Outcome, SyncError> {
        self.require::<Task>(id, SyncError::UnknownTask)?;
        settled(id)?;
        let owner = self.cache.read::<Column, _>(|columns| {
            columns.and_then(|cs| {
                cs.iter()
                    .find(|c| c.task_ids.iter().any(|t| t == id))
                    .map(|c| c.id.clone())
            })
        });

        self.cache.mutate::<Task>(|tasks| tasks.retain(|t| t.id != id));
        self.cache.mutate::<Column>(|columns| {
            for c in columns.iter_mut() {
                c.task_ids.retain(|t| t != id);
            }
        });

        let keys = [ResourceKey::Tasks, ResourceKey::Columns];
        if let Err(e) = remote::remove::<Task>(self.remote(), id).await {
            return Ok(self.revert("delete task", &keys, e).await);
        }
        match owner {
            Some(column_id) => Ok(self
                .persist_owner::<Column>("delete task", &column_id, &keys)
                .await),
            None => {
                self.confirm(&keys).await;
                Ok(Outcome::Applied(()))
            }
        }
    }

    // ── Shared flows ────────────────────────────────────────────────────

    /// POST an entity already cached under a temporary id, then swap in the
    /// server id everywhere the temporary one is referenced.
    async fn post_pending<R: Resource>(&self, entity: &R) -> Result<R, RemoteError> {
        let created = remote::create(self.remote(), entity).await?;
        let refs = self.cache.reconcile_id(entity.id(), created.id());
        log::info!(
            target: "taskboard.ops",
            "Created {} in {} ({} reference(s) updated)",
            created.id(),
            R::KEY,
            refs
        );
        Ok(self.cache.find::<R>(created.id()).unwrap_or(created))
    }

    /// Apply `edit` to the cached entity and PUT the result.
    async fn update_entity<R: Resource>(
        &self,
        operation: &str,
        id: &str,
        missing: impl FnOnce(String) -> SyncError,
        edit: impl FnOnce(&mut R),
    ) -> Result<Outcome<R>, SyncError> {
        self.require::<R>(id, missing)?;
        settled(id)?;

        self.cache.mutate::<R>(|items| {
            if let Some(item) = items.iter_mut().find(|i| i.id() == id) {
                edit(item);
            }
        });
        let Some(updated) = self.cache.find::<R>(id) else {
            return Ok(Outcome::Noop);
        };

        match remote::replace(self.remote(), &updated).await {
            Ok(()) => {
                self.confirm(&[R::KEY]).await;
                Ok(Outcome::Applied(updated))
            }
            Err(e) => Ok(self.revert(operation, &[R::KEY], e).await),
        }
    }

    /// PUT the owner whose id list changed, as currently cached, then confirm
    /// or revert every collection in `keys`.
    async fn persist_owner<R: Resource>(
        &self,
        operation: &str,
        owner_id: &str,
        keys: &[ResourceKey],
    ) -> Outcome {
        let Some(owner) = self.cache.find::<R>(owner_id) else {
            self.confirm(keys).await;
            return Outcome::Applied(());
        };
        match remote::replace(self.remote(), &owner).await {
            Ok(()) => {
                self.confirm(keys).await;
                Outcome::Applied(())
            }
            Err(e) => self.revert(operation, keys, e).await,
        }
    }
}
