use std::{collections::HashMap, fmt::Display, sync::Arc};

use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use shared::{NewTask, Task, TaskPatch};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt task record `{key}`: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode task: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("task record `{key}` kept changing under concurrent writes")]
    Contended { key: String },
}

/// Persistent task storage. Every operation takes the owner's id and only
/// ever sees that owner's records.
#[derive(Clone)]
pub enum TaskStore {
    Redis(RedisTaskStore),
    Memory(MemoryTaskStore),
}

impl TaskStore {
    pub fn memory() -> Self {
        TaskStore::Memory(MemoryTaskStore::default())
    }

    pub async fn create(&self, owner: &str, new: NewTask) -> Result<Task, StoreError> {
        let task = Task::from_new(new, owner, Utc::now());
        match self {
            TaskStore::Redis(store) => store.insert(&task).await?,
            TaskStore::Memory(store) => store.insert(&task).await,
        }
        Ok(task)
    }

    /// All of `owner`'s tasks in insertion order.
    pub async fn list(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        match self {
            TaskStore::Redis(store) => store.list(owner).await,
            TaskStore::Memory(store) => Ok(store.list(owner).await),
        }
    }

    /// Applies `patch` to the task and returns the new record, or `None` when
    /// `owner` has no task with that id.
    pub async fn update(
        &self,
        owner: &str,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        match self {
            TaskStore::Redis(store) => store.update(owner, id, patch).await,
            TaskStore::Memory(store) => Ok(store.update(owner, id, patch).await),
        }
    }

    /// Removes the task and returns what was deleted, or `None` when `owner`
    /// has no task with that id.
    pub async fn delete(&self, owner: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        match self {
            TaskStore::Redis(store) => store.delete(owner, id).await,
            TaskStore::Memory(store) => Ok(store.delete(owner, id).await),
        }
    }
}

fn touch(task: &mut Task, patch: &TaskPatch) {
    if !patch.is_empty() {
        patch.apply_to(task);
        task.updated_at = Utc::now();
    }
}

/// Writes the new record only if it is still indexed and unchanged since it
/// was read. Returns 1 on write, 0 if the task is gone, -1 if it changed.
const UPDATE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current or not redis.call('LPOS', KEYS[2], ARGV[1]) then
  return 0
end
if current ~= ARGV[2] then
  return -1
end
redis.call('SET', KEYS[1], ARGV[3])
return 1
"#;

/// Read-modify-write rounds before an update gives up on a hot record.
const UPDATE_ATTEMPTS: usize = 5;

/// Tasks live at `task:{owner}:{id}` as JSON; `tasks:{owner}` lists the ids
/// in insertion order.
#[derive(Clone)]
pub struct RedisTaskStore {
    conn: MultiplexedConnection,
    update_script: Script,
}

fn task_key(owner: &str, id: impl Display) -> String {
    format!("task:{}:{}", owner, id)
}

fn index_key(owner: &str) -> String {
    format!("tasks:{}", owner)
}

fn decode(key: &str, raw: &str) -> Result<Task, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

impl RedisTaskStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            update_script: Script::new(UPDATE_SCRIPT),
        })
    }

    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        let task_json = serde_json::to_string(task).map_err(StoreError::Encode)?;
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(task_key(&task.user_id, task.id), task_json)
            .ignore()
            .rpush(index_key(&task.user_id), task.id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.lrange(index_key(owner), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| task_key(owner, id)).collect();
        let records: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::with_capacity(records.len());
        for (key, record) in keys.iter().zip(records) {
            // an id can outlive its record if a delete was interrupted
            if let Some(raw) = record {
                tasks.push(decode(key, &raw)?);
            }
        }
        Ok(tasks)
    }

    /// The stored JSON and its decoded task, if `owner` has a task `id`.
    async fn find(
        &self,
        conn: &mut MultiplexedConnection,
        owner: &str,
        id: Uuid,
    ) -> Result<Option<(String, Task)>, StoreError> {
        let key = task_key(owner, id);
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(raw) => {
                let task = decode(&key, &raw)?;
                Ok((task.user_id == owner).then_some((raw, task)))
            }
            None => Ok(None),
        }
    }

    /// Optimistic read-modify-write. The script refuses the write when a
    /// concurrent delete removed the task or another update got in first;
    /// the latter is retried against the fresh record.
    async fn update(
        &self,
        owner: &str,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let mut conn = self.conn.clone();
        let key = task_key(owner, id);
        for attempt in 1..=UPDATE_ATTEMPTS {
            let Some((raw, mut task)) = self.find(&mut conn, owner, id).await? else {
                return Ok(None);
            };
            if patch.is_empty() {
                return Ok(Some(task));
            }

            touch(&mut task, patch);
            let task_json = serde_json::to_string(&task).map_err(StoreError::Encode)?;
            let written: i64 = self
                .update_script
                .key(&key)
                .key(index_key(owner))
                .arg(id.to_string())
                .arg(raw)
                .arg(task_json)
                .invoke_async(&mut conn)
                .await?;
            match written {
                1 => return Ok(Some(task)),
                0 => return Ok(None),
                _ => tracing::debug!(%key, attempt, "task changed during update; retrying"),
            }
        }
        Err(StoreError::Contended { key })
    }

    async fn delete(&self, owner: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut conn = self.conn.clone();
        let Some((_, task)) = self.find(&mut conn, owner, id).await? else {
            return Ok(None);
        };

        redis::pipe()
            .atomic()
            .del(task_key(owner, id))
            .ignore()
            .lrem(index_key(owner), 0, id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(Some(task))
    }
}

/// Process-local store keyed by owner, used for tests and Redis-less runs.
#[derive(Clone, Default)]
pub struct MemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Vec<Task>>>>,
}

impl MemoryTaskStore {
    async fn insert(&self, task: &Task) {
        self.tasks
            .write()
            .await
            .entry(task.user_id.clone())
            .or_default()
            .push(task.clone());
    }

    async fn list(&self, owner: &str) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    async fn update(&self, owner: &str, id: Uuid, patch: &TaskPatch) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(owner)?.iter_mut().find(|t| t.id == id)?;
        touch(task, patch);
        Some(task.clone())
    }

    async fn delete(&self, owner: &str, id: Uuid) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let owned = tasks.get_mut(owner)?;
        let index = owned.iter().position(|t| t.id == id)?;
        Some(owned.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: "something".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            is_completed: false,
            is_important: false,
        }
    }

    // owners are unique per run so Redis-backed runs can share a database
    fn owner(name: &str) -> String {
        format!("{}-{}", name, Uuid::new_v4())
    }

    async fn redis_store() -> RedisTaskStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisTaskStore::connect(&url).await.unwrap()
    }

    async fn keeps_insertion_order_per_owner(store: TaskStore) {
        let (alice, bob, carol) = (owner("alice"), owner("bob"), owner("carol"));
        let first = store.create(&alice, new_task("first")).await.unwrap();
        store.create(&bob, new_task("bobs")).await.unwrap();
        let second = store.create(&alice, new_task("second")).await.unwrap();

        let ids: Vec<Uuid> = store.list(&alice).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(store.list(&carol).await.unwrap(), Vec::new());
    }

    async fn bumps_timestamp_only_when_something_changes(store: TaskStore) {
        let alice = owner("alice");
        let task = store.create(&alice, new_task("Pay bills")).await.unwrap();

        let unchanged = store
            .update(&alice, task.id, &TaskPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.updated_at, task.updated_at);

        let patch = TaskPatch {
            is_completed: Some(true),
            ..TaskPatch::default()
        };
        let updated = store.update(&alice, task.id, &patch).await.unwrap().unwrap();
        assert!(updated.is_completed);
        assert!(updated.updated_at >= task.updated_at);
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(store.list(&alice).await.unwrap(), vec![updated]);
    }

    async fn keeps_other_owners_out(store: TaskStore) {
        let (alice, mallory) = (owner("alice"), owner("mallory"));
        let task = store.create(&alice, new_task("Pay bills")).await.unwrap();
        let patch = TaskPatch {
            title: Some("hijacked".into()),
            ..TaskPatch::default()
        };

        assert_eq!(store.update(&mallory, task.id, &patch).await.unwrap(), None);
        assert_eq!(store.delete(&mallory, task.id).await.unwrap(), None);
        assert_eq!(store.list(&alice).await.unwrap(), vec![task.clone()]);

        assert_eq!(store.delete(&alice, task.id).await.unwrap(), Some(task.clone()));
        assert_eq!(store.delete(&alice, task.id).await.unwrap(), None);
        // a deleted task is not brought back by a late edit
        assert_eq!(store.update(&alice, task.id, &patch).await.unwrap(), None);
        assert_eq!(store.list(&alice).await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn list_keeps_insertion_order_per_owner() {
        keeps_insertion_order_per_owner(TaskStore::memory()).await;
    }

    #[tokio::test]
    async fn update_bumps_timestamp_only_when_something_changes() {
        bumps_timestamp_only_when_something_changes(TaskStore::memory()).await;
    }

    #[tokio::test]
    async fn other_owners_cannot_touch_a_task() {
        keeps_other_owners_out(TaskStore::memory()).await;
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn redis_list_keeps_insertion_order_per_owner() {
        keeps_insertion_order_per_owner(TaskStore::Redis(redis_store().await)).await;
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn redis_update_bumps_timestamp_only_when_something_changes() {
        bumps_timestamp_only_when_something_changes(TaskStore::Redis(redis_store().await)).await;
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn redis_other_owners_cannot_touch_a_task() {
        keeps_other_owners_out(TaskStore::Redis(redis_store().await)).await;
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn redis_update_refuses_a_task_dropped_from_the_index() {
        let redis = redis_store().await;
        let store = TaskStore::Redis(redis.clone());
        let alice = owner("alice");
        let task = store.create(&alice, new_task("Pay bills")).await.unwrap();

        // the delete pipeline has run its LREM but the record is still readable
        let mut conn = redis.conn.clone();
        let _: i64 = conn.lrem(index_key(&alice), 0, task.id.to_string()).await.unwrap();

        let patch = TaskPatch {
            is_completed: Some(true),
            ..TaskPatch::default()
        };
        assert_eq!(store.update(&alice, task.id, &patch).await.unwrap(), None);
        let raw: String = conn.get(task_key(&alice, task.id)).await.unwrap();
        assert_eq!(decode("task", &raw).unwrap(), task);
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn redis_update_retries_after_a_concurrent_write() {
        let redis = redis_store().await;
        let alice = owner("alice");
        let task = TaskStore::Redis(redis.clone())
            .create(&alice, new_task("Pay bills"))
            .await
            .unwrap();

        let completed = TaskPatch {
            is_completed: Some(true),
            ..TaskPatch::default()
        };
        let important = TaskPatch {
            is_important: Some(true),
            ..TaskPatch::default()
        };
        let (a, b) = tokio::join!(
            redis.update(&alice, task.id, &completed),
            redis.update(&alice, task.id, &important),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());

        let stored = redis.list(&alice).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_completed);
        assert!(stored[0].is_important);
    }
}
