use crate::config::ClientConfig;
use crate::mapping::SyncMappingStore;
use crate::queries::{DbHelpers, Queries};
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tasker_core::ordering::{sort_default, sort_tasks};
use tasker_core::{SortKey, Task, TaskDraft, TaskId, TaskerResult};

/// SQLite-backed task store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct TaskStore {
    pub pool: SqlitePool,
}

impl TaskStore {
    pub async fn new(database_url: &str) -> TaskerResult<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> TaskerResult<Self> {
        // Every connection to :memory: opens its own empty database
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::debug!(
            "DATABASE: Connected to {} ({} connections)",
            database_url,
            max_connections
        );
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    pub async fn open(config: &ClientConfig) -> TaskerResult<Self> {
        if let Some(parent) = config
            .database_path
            .as_deref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        let store =
            Self::with_max_connections(&config.database_url(), config.max_connections).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> TaskerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Mapping store sharing this store's pool.
    pub fn mappings(&self) -> SyncMappingStore {
        SyncMappingStore::new(self.pool.clone())
    }

    pub async fn create(&self, draft: &TaskDraft) -> TaskerResult<TaskId> {
        let now = DbHelpers::format_timestamp(Utc::now());

        let result = sqlx::query(Queries::INSERT_TASK)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(DbHelpers::stored_due_date(draft))
            .bind(draft.priority)
            .bind(&draft.tags)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        tracing::info!("DATABASE: Created task {}", id);
        Ok(id)
    }

    /// Replace every mutable field of task `id`. Returns the number of rows
    /// touched; an unknown id is a silent no-op returning 0.
    pub async fn update(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        completed: bool,
    ) -> TaskerResult<u64> {
        let now = DbHelpers::format_timestamp(Utc::now());

        let result = sqlx::query(Queries::UPDATE_TASK)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(DbHelpers::stored_due_date(draft))
            .bind(draft.priority)
            .bind(&draft.tags)
            .bind(completed as i64)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let affected = result.rows_affected();
        if affected == 0 {
            tracing::debug!("DATABASE: Update of task {} matched no rows", id);
        } else {
            tracing::info!("DATABASE: Updated task {}", id);
        }
        Ok(affected)
    }

    /// Remove the task and its calendar mapping together. Idempotent.
    pub async fn delete(&self, id: TaskId) -> TaskerResult<()> {
        let mut tx = self.pool.begin().await?;

        // Mapping first: gc_mapping.task_id references tasks.id
        SyncMappingStore::delete(&mut *tx, id).await?;
        sqlx::query(Queries::DELETE_TASK)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("DATABASE: Deleted task {} and its mapping", id);
        Ok(())
    }

    pub async fn get(&self, id: TaskId) -> TaskerResult<Option<Task>> {
        let row = sqlx::query(Queries::GET_TASK)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(DbHelpers::parse_task).transpose()
    }

    /// Tasks whose raw tag field contains `filter_tag` (case-sensitive
    /// substring), optionally hiding completed ones, ordered by `sort_by`.
    /// An empty filter means no filter.
    pub async fn list(
        &self,
        filter_tag: Option<&str>,
        show_completed: bool,
        sort_by: SortKey,
    ) -> TaskerResult<Vec<Task>> {
        let mut tasks = self.fetch(filter_tag, show_completed).await?;
        sort_tasks(&mut tasks, sort_by);
        Ok(tasks)
    }

    /// Every task matching `filter_tag`, completed included, in default order.
    pub async fn list_default_sorted(&self, filter_tag: Option<&str>) -> TaskerResult<Vec<Task>> {
        let mut tasks = self.fetch(filter_tag, true).await?;
        sort_default(&mut tasks);
        Ok(tasks)
    }

    /// Flip the completion flag. `None` when the task does not exist.
    pub async fn toggle_completed(&self, id: TaskId) -> TaskerResult<Option<bool>> {
        let Some(task) = self.get(id).await? else {
            return Ok(None);
        };

        let completed = !task.completed;
        self.update(id, &task.draft(), completed).await?;
        Ok(Some(completed))
    }

    pub async fn count(&self) -> TaskerResult<i64> {
        let row = sqlx::query(Queries::COUNT_TASKS)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count)
    }

    async fn fetch(
        &self,
        filter_tag: Option<&str>,
        show_completed: bool,
    ) -> TaskerResult<Vec<Task>> {
        let filter_tag = filter_tag.filter(|t| !t.is_empty());

        let rows = sqlx::query(Queries::LIST_TASKS)
            .bind(show_completed)
            .bind(filter_tag)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            "DATABASE: Fetched {} tasks (tag={:?}, show_completed={})",
            rows.len(),
            filter_tag,
            show_completed
        );
        rows.iter().map(DbHelpers::parse_task).collect()
    }
}
