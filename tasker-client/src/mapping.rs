use crate::queries::Queries;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use tasker_core::{TaskId, TaskerResult};

/// task id -> remote calendar event id, at most one row per task.
#[derive(Clone)]
pub struct SyncMappingStore {
    pool: SqlitePool,
}

impl SyncMappingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the mapping for `task_id`.
    pub async fn set(&self, task_id: TaskId, event_id: &str) -> TaskerResult<()> {
        sqlx::query(Queries::UPSERT_MAPPING)
            .bind(task_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("DATABASE: Task {} mapped to event {}", task_id, event_id);
        Ok(())
    }

    pub async fn get(&self, task_id: TaskId) -> TaskerResult<Option<String>> {
        let row = sqlx::query(Queries::GET_MAPPING)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("gc_event_id")?),
            None => Ok(None),
        }
    }

    /// Remove the mapping for `task_id` on `executor`. Only task deletion
    /// calls this, inside its own transaction.
    pub(crate) async fn delete<'e, E>(executor: E, task_id: TaskId) -> TaskerResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(Queries::DELETE_MAPPING)
            .bind(task_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
