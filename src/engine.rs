//! Synchronization engine.
//!
//! Orchestrates create/update/delete across the task store and the
//! document store and emits one change event per affected task, after
//! both stores are updated. A failed document write after a successful
//! task store write is logged and swallowed: the stores may diverge
//! until the next write, which is an accepted property of the design.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::bus::{ChangeEvent, ChangeKind, EventBus};
use crate::codec::{self, DecodedDoc};
use crate::config::Config;
use crate::docs::DocStore;
use crate::error::{Error, Result};
use crate::store::{TaskStore, TASKS_FILE};
use crate::task::{validate_id, Task, TaskDraft, TaskPatch};

/// Short-lived record of document writes performed by this process,
/// keyed by task id and content hash. The change watcher consults it so
/// the engine's own writes are not re-ingested as external edits.
#[derive(Debug)]
pub struct RecentWrites {
    window: Duration,
    entries: Mutex<HashMap<String, (u64, Instant)>>,
}

impl RecentWrites {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Remember that this process just wrote `text` for `id`.
    pub fn record(&self, id: &str, text: &str) {
        let mut entries = self.entries.lock().expect("recent writes poisoned");
        let now = Instant::now();
        entries.retain(|_, (_, at)| now.duration_since(*at) < self.window);
        entries.insert(id.to_string(), (content_hash(text), now));
    }

    /// True when `text` matches a write recorded for `id` inside the
    /// suppression window. Matching consumes the entry, so a later
    /// genuine edit that restores identical bytes is still observed.
    pub fn should_suppress(&self, id: &str, text: &str) -> bool {
        let mut entries = self.entries.lock().expect("recent writes poisoned");
        match entries.get(id) {
            Some((hash, at))
                if *hash == content_hash(text) && at.elapsed() < self.window =>
            {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct SyncEngine {
    tasks: TaskStore,
    docs: DocStore,
    bus: EventBus,
    recent_writes: Arc<RecentWrites>,
}

impl SyncEngine {
    pub fn new(tasks: TaskStore, docs: DocStore, bus: EventBus, suppress_window: Duration) -> Self {
        Self {
            tasks,
            docs,
            bus,
            recent_writes: Arc::new(RecentWrites::new(suppress_window)),
        }
    }

    /// Build an engine over a workspace using its configuration.
    pub fn open(workspace: &Path, config: &Config, bus: EventBus) -> Self {
        let tasks = TaskStore::new(workspace.join(TASKS_FILE));
        let docs = DocStore::new(config.docs_root(workspace), config.docs.extension.clone());
        Self::new(
            tasks,
            docs,
            bus,
            Duration::from_millis(config.suppress_window_ms),
        )
    }

    pub fn docs(&self) -> &DocStore {
        &self.docs
    }

    pub fn recent_writes(&self) -> Arc<RecentWrites> {
        Arc::clone(&self.recent_writes)
    }

    /// Create a task and its document together.
    pub fn create(&self, draft: TaskDraft) -> Result<Task> {
        let task = draft.into_task()?;
        self.tasks.insert(task.clone())?;
        self.write_doc_best_effort(&task.id, &codec::encode(&task));
        self.bus
            .publish(ChangeEvent::new(ChangeKind::Created, &task.id));
        Ok(task)
    }

    /// Merge the supplied fields into a stored task and re-derive its
    /// document.
    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let task = self.tasks.update_with(id, |task| patch.apply(task))?;
        self.write_doc_best_effort(id, &codec::encode(&task));
        self.bus.publish(ChangeEvent::new(ChangeKind::Updated, id));
        Ok(task)
    }

    /// Write caller-authored document text verbatim. When the id is
    /// API-tracked, the text is also decoded and merged back into the
    /// task store.
    pub fn update_content(&self, id: &str, text: &str) -> Result<()> {
        self.recent_writes.record(id, text);
        self.docs.write(id, text)?;

        if self.tasks.contains(id)? {
            let decoded = codec::decode(text);
            self.tasks.update_with(id, |task| {
                merge_decoded(task, &decoded);
                Ok(())
            })?;
            self.bus.publish(ChangeEvent::new(ChangeKind::Updated, id));
        }
        Ok(())
    }

    /// Delete a task, its document, and every descendant. Returns the
    /// removed ids in cascade order.
    pub fn delete(&self, id: &str) -> Result<Vec<String>> {
        let removed = self.tasks.remove_subtree(id)?;
        let mut ids = Vec::with_capacity(removed.len());
        for task in removed {
            if let Err(err) = self.docs.delete(&task.id) {
                warn!(task_id = %task.id, %err, "document delete failed; record already removed");
            }
            self.bus
                .publish(ChangeEvent::new(ChangeKind::Deleted, &task.id));
            ids.push(task.id);
        }
        Ok(ids)
    }

    /// Fetch a task; the live document text overrides the stored content.
    pub fn get(&self, id: &str) -> Result<Task> {
        let mut task = self
            .tasks
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        match self.docs.read(id) {
            Ok(text) => task.content = text,
            Err(err) => debug!(task_id = %id, %err, "document unreadable, serving stored content"),
        }
        Ok(task)
    }

    pub fn list(&self) -> Result<Vec<Task>> {
        self.tasks.list()
    }

    /// Re-read a task's document and upsert the decoded fields (the
    /// watcher's entry point).
    pub fn sync_from_doc(&self, id: &str) -> Result<Task> {
        let text = self.docs.read(id)?;
        self.apply_decoded(id, &codec::decode(&text))
    }

    /// Upsert decoded document fields: merge into the stored task, or
    /// create one when the id is unknown. The document itself is not
    /// rewritten — the text on disk is what we are ingesting.
    pub fn apply_decoded(&self, id: &str, decoded: &DecodedDoc) -> Result<Task> {
        if self.tasks.contains(id)? {
            let task = self.tasks.update_with(id, |task| {
                merge_decoded(task, decoded);
                Ok(())
            })?;
            self.bus.publish(ChangeEvent::new(ChangeKind::Updated, id));
            return Ok(task);
        }

        let draft = TaskDraft {
            id: Some(validate_id(id)?),
            title: decoded.title.clone(),
            content: Some(decoded.content.clone()),
            metadata: Some(decoded.metadata.clone()),
            ..TaskDraft::default()
        };
        let task = draft.into_task()?;
        self.tasks.insert(task.clone())?;
        self.bus
            .publish(ChangeEvent::new(ChangeKind::Created, &task.id));
        Ok(task)
    }

    /// Secondary document write: the task store is already updated, so a
    /// failure here is logged and swallowed rather than rolled back.
    fn write_doc_best_effort(&self, id: &str, text: &str) {
        self.recent_writes.record(id, text);
        if let Err(err) = self.docs.write(id, text) {
            warn!(task_id = %id, %err, "document write failed after task store update; stores may diverge");
        }
    }
}

fn merge_decoded(task: &mut Task, decoded: &DecodedDoc) {
    task.title = decoded.title.clone();
    task.content = decoded.content.clone();
    task.metadata = decoded.metadata.clone();
    task.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> (TempDir, SyncEngine) {
        let dir = TempDir::new().expect("tempdir");
        let bus = EventBus::new(64);
        let config = Config::default();
        let engine = SyncEngine::open(dir.path(), &config, bus);
        (dir, engine)
    }

    #[test]
    fn suppression_matches_once_within_window() {
        let recent = RecentWrites::new(Duration::from_secs(5));
        recent.record("t1", "# A\n");

        assert!(recent.should_suppress("t1", "# A\n"));
        // Entry consumed: the same bytes arriving again are a real edit.
        assert!(!recent.should_suppress("t1", "# A\n"));
    }

    #[test]
    fn suppression_ignores_other_content_and_ids() {
        let recent = RecentWrites::new(Duration::from_secs(5));
        recent.record("t1", "# A\n");

        assert!(!recent.should_suppress("t1", "# B\n"));
        assert!(!recent.should_suppress("t2", "# A\n"));
    }

    #[test]
    fn suppression_expires_after_window() {
        let recent = RecentWrites::new(Duration::from_millis(1));
        recent.record("t1", "# A\n");
        std::thread::sleep(Duration::from_millis(10));
        assert!(!recent.should_suppress("t1", "# A\n"));
    }

    #[test]
    fn create_records_suppression_entry() {
        let (_dir, engine) = engine();
        let mut draft = TaskDraft::new("Plan release");
        draft.id = Some("t1".to_string());
        engine.create(draft).expect("create");

        let text = engine.docs().read("t1").expect("doc");
        assert!(engine.recent_writes().should_suppress("t1", &text));
    }

    #[test]
    fn apply_decoded_creates_unknown_tasks() {
        let (_dir, engine) = engine();
        let decoded = codec::decode("# From disk\nbody\n");
        let task = engine.apply_decoded("t9", &decoded).expect("upsert");
        assert_eq!(task.title, "From disk");
        assert_eq!(engine.get("t9").expect("get").title, "From disk");
    }

    #[test]
    fn apply_decoded_rejects_unsafe_ids() {
        let (_dir, engine) = engine();
        let decoded = codec::decode("# X\n");
        assert!(matches!(
            engine.apply_decoded("../escape", &decoded),
            Err(Error::Validation(_))
        ));
    }
}
