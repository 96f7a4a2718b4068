//! Durable task/platform storage.
//!
//! The core talks to storage through the narrow [`ItemStore`] trait; the
//! in-memory buckets in [`crate::board`] are always a cache reconciled
//! against this store, never the source of truth.
//!
//! [`JsonItemStore`] is the shippable file-backed implementation
//! (`items.json` in the app data dir, rewritten atomically on every
//! mutation). [`MemoryItemStore`] backs tests.

use crate::error::{Result, TrackerError};
use crate::model::{Platform, TaskItem};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Narrow persistence boundary for tasks and platforms.
pub trait ItemStore: Send + Sync {
    /// All stored tasks, unordered.
    fn list_tasks(&self) -> Result<Vec<TaskItem>>;

    /// All stored platforms, sorted by name.
    fn list_platforms(&self) -> Result<Vec<Platform>>;

    /// Persist a new task. Returns the task with its assigned id.
    fn add_task(&self, task: TaskItem) -> Result<TaskItem>;

    /// Persist changes to an existing task.
    fn update_task(&self, task: &TaskItem) -> Result<()>;

    /// Remove a task by id. Removing an unknown id is not an error.
    fn delete_task(&self, id: i64) -> Result<()>;

    /// Persist a new platform. Returns the platform with its assigned id.
    fn add_platform(&self, name: &str) -> Result<Platform>;
}

/// Serialized store contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    next_task_id: i64,
    #[serde(default)]
    next_platform_id: i64,
    #[serde(default)]
    tasks: Vec<TaskItem>,
    #[serde(default)]
    platforms: Vec<Platform>,
}

/// File-backed item store.
pub struct JsonItemStore {
    path: PathBuf,
    inner: RwLock<StoreState>,
}

impl JsonItemStore {
    /// Default path of the item store file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        crate::app_dirs::data_dir().join("items.json")
    }

    /// Open the store at the given path, loading current contents.
    ///
    /// A missing file starts empty; a malformed file is an error so stored
    /// tasks are never silently discarded by a rewrite.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                TrackerError::Store(format!("cannot parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(TrackerError::Store(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(Self {
            path,
            inner: RwLock::new(state),
        })
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Store(format!("cannot create store directory: {e}"))
            })?;
        }

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| TrackerError::Store(format!("cannot serialize store: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| TrackerError::Store(format!("cannot write store temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| TrackerError::Store(format!("cannot finalize store file: {e}")))?;

        Ok(())
    }
}

impl ItemStore for JsonItemStore {
    fn list_tasks(&self) -> Result<Vec<TaskItem>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.tasks.clone())
    }

    fn list_platforms(&self) -> Result<Vec<Platform>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut platforms = guard.platforms.clone();
        platforms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(platforms)
    }

    fn add_task(&self, mut task: TaskItem) -> Result<TaskItem> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.next_task_id += 1;
        task.id = guard.next_task_id;
        guard.tasks.push(task.clone());
        self.persist(&guard)?;
        Ok(task)
    }

    fn update_task(&self, task: &TaskItem) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = guard.tasks.iter_mut().find(|t| t.id == task.id) else {
            return Err(TrackerError::Store(format!("unknown task id {}", task.id)));
        };
        *existing = task.clone();
        self.persist(&guard)
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.tasks.retain(|t| t.id != id);
        self.persist(&guard)
    }

    fn add_platform(&self, name: &str) -> Result<Platform> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.next_platform_id += 1;
        let platform = Platform {
            id: guard.next_platform_id,
            name: name.to_owned(),
        };
        guard.platforms.push(platform.clone());
        self.persist(&guard)?;
        Ok(platform)
    }
}

/// In-memory item store for tests.
///
/// `fail_reads` / `fail_writes` let tests exercise the degradation paths
/// (read failure treated as empty, write failure surfaced to the caller).
#[derive(Default)]
pub struct MemoryItemStore {
    inner: RwLock<StoreState>,
    /// When set, all read operations fail.
    pub fail_reads: AtomicBool,
    /// When set, all write operations fail.
    pub fail_writes: AtomicBool,
}

impl MemoryItemStore {
    /// Empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("injected read failure".to_owned()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::Store("injected write failure".to_owned()));
        }
        Ok(())
    }
}

impl ItemStore for MemoryItemStore {
    fn list_tasks(&self) -> Result<Vec<TaskItem>> {
        self.check_read()?;
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.tasks.clone())
    }

    fn list_platforms(&self) -> Result<Vec<Platform>> {
        self.check_read()?;
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut platforms = guard.platforms.clone();
        platforms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(platforms)
    }

    fn add_task(&self, mut task: TaskItem) -> Result<TaskItem> {
        self.check_write()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.next_task_id += 1;
        task.id = guard.next_task_id;
        guard.tasks.push(task.clone());
        Ok(task)
    }

    fn update_task(&self, task: &TaskItem) -> Result<()> {
        self.check_write()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = guard.tasks.iter_mut().find(|t| t.id == task.id) else {
            return Err(TrackerError::Store(format!("unknown task id {}", task.id)));
        };
        *existing = task.clone();
        Ok(())
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        self.check_write()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.tasks.retain(|t| t.id != id);
        Ok(())
    }

    fn add_platform(&self, name: &str) -> Result<Platform> {
        self.check_write()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.next_platform_id += 1;
        let platform = Platform {
            id: guard.next_platform_id,
            name: name.to_owned(),
        };
        guard.platforms.push(platform.clone());
        Ok(platform)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::model::WorkStatus;

    #[test]
    fn json_store_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonItemStore::open(dir.path().join("items.json")).unwrap();

        let a = store.add_task(TaskItem::new("a", None, None, None)).unwrap();
        let b = store.add_task(TaskItem::new("b", None, None, None)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");

        {
            let store = JsonItemStore::open(path.clone()).unwrap();
            let mut task = store.add_task(TaskItem::new("t", None, None, None)).unwrap();
            task.status = WorkStatus::InProgress;
            store.update_task(&task).unwrap();
            store.add_platform("work").unwrap();
        }

        let reopened = JsonItemStore::open(path).unwrap();
        let tasks = reopened.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, WorkStatus::InProgress);
        assert_eq!(reopened.list_platforms().unwrap()[0].name, "work");

        // id counter survives too: the next task must not reuse id 1
        let next = reopened.add_task(TaskItem::new("u", None, None, None)).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn json_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "][").unwrap();
        assert!(JsonItemStore::open(path).is_err());
    }

    #[test]
    fn delete_unknown_id_is_not_an_error() {
        let store = MemoryItemStore::new();
        assert!(store.delete_task(99).is_ok());
    }

    #[test]
    fn platforms_list_sorted_by_name() {
        let store = MemoryItemStore::new();
        store.add_platform("zeta").unwrap();
        store.add_platform("alpha").unwrap();
        let names: Vec<String> = store
            .list_platforms()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn injected_failures_surface_as_store_errors() {
        let store = MemoryItemStore::new();
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(store.list_tasks().is_err());
        store.fail_reads.store(false, Ordering::SeqCst);
        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(store.add_task(TaskItem::new("t", None, None, None)).is_err());
    }
}
