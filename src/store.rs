//! Task store accessor.
//!
//! Thin read/write interface over the authoritative structured records,
//! persisted as a single JSON snapshot (`tasks.json`). Every operation
//! loads the snapshot, applies its change, and writes the file back
//! atomically (temp + rename), so readers never observe a partial write.
//! There is deliberately no cross-process lock: concurrent writers
//! resolve last-writer-wins, independently of the document store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::Task;

const TASKS_SCHEMA_VERSION: &str = "tasksync.tasks.v1";

/// Name of the snapshot file inside a workspace
pub const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Write an empty snapshot unless one already exists.
    pub fn init(&self) -> Result<()> {
        if !self.path.exists() {
            self.write_snapshot(&TaskSnapshot::empty())?;
        }
        Ok(())
    }

    pub fn load(&self) -> Result<TaskSnapshot> {
        if !self.path.exists() {
            return Ok(TaskSnapshot::empty());
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot: TaskSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        let snapshot = self.load()?;
        Ok(snapshot.tasks.into_iter().find(|task| task.id == id))
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// All tasks, most recently updated first.
    pub fn list(&self) -> Result<Vec<Task>> {
        let mut tasks = self.load()?.tasks;
        tasks.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    /// Insert a new record; rejects an already-present id.
    pub fn insert(&self, task: Task) -> Result<()> {
        let mut snapshot = self.load()?;
        if snapshot.tasks.iter().any(|existing| existing.id == task.id) {
            return Err(Error::Validation(format!(
                "task already exists: {}",
                task.id
            )));
        }
        snapshot.tasks.push(task);
        self.write_snapshot(&snapshot)
    }

    /// Apply a mutation to a stored record and persist the result.
    pub fn update_with<F>(&self, id: &str, mutate: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut snapshot = self.load()?;
        let task = snapshot
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        mutate(task)?;
        let updated = task.clone();
        self.write_snapshot(&snapshot)?;
        Ok(updated)
    }

    /// Remove a task and every descendant reachable through parent links.
    ///
    /// Children are resolved through a parent→children index built in one
    /// pass over the snapshot, then walked breadth-first; the visited set
    /// keeps a cyclic parent chain from looping the walk.
    pub fn remove_subtree(&self, id: &str) -> Result<Vec<Task>> {
        let mut snapshot = self.load()?;
        if !snapshot.tasks.iter().any(|task| task.id == id) {
            return Err(Error::NotFound(id.to_string()));
        }

        let index = children_index(&snapshot.tasks);
        let mut doomed: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(id.to_string());

        while let Some(current) = queue.pop_front() {
            if !doomed.insert(current.clone()) {
                continue;
            }
            order.push(current.clone());
            if let Some(children) = index.get(current.as_str()) {
                for child in children {
                    queue.push_back(child.clone());
                }
            }
        }

        let mut removed: HashMap<String, Task> = HashMap::new();
        snapshot.tasks.retain(|task| {
            if doomed.contains(&task.id) {
                removed.insert(task.id.clone(), task.clone());
                false
            } else {
                true
            }
        });
        self.write_snapshot(&snapshot)?;

        Ok(order
            .into_iter()
            .filter_map(|id| removed.remove(&id))
            .collect())
    }

    fn write_snapshot(&self, snapshot: &TaskSnapshot) -> Result<()> {
        let mut snapshot = snapshot.clone();
        snapshot.schema_version = TASKS_SCHEMA_VERSION.to_string();
        snapshot.generated_at = Utc::now();
        snapshot.tasks.sort_by(|a, b| a.id.cmp(&b.id));
        let json = serde_json::to_string_pretty(&snapshot)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Build a parent→children map in a single pass.
pub fn children_index(tasks: &[Task]) -> HashMap<&str, Vec<String>> {
    let mut index: HashMap<&str, Vec<String>> = HashMap::new();
    for task in tasks {
        if let Some(parent) = task.parent.as_deref() {
            index.entry(parent).or_default().push(task.id.clone());
        }
    }
    index
}

/// Write data atomically using temp file + rename.
///
/// Readers never see a partial write: the file is either fully written
/// or untouched. The temp file lives in the same directory so the
/// rename stays on one filesystem.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}
