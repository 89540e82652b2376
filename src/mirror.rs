//! Remote sync worker.
//!
//! Maintains a second document tree driven by the same events and engine
//! API as the primary: bus events refresh the mirror, edits detected in
//! the mirror are decoded and pushed back upstream through the engine,
//! and a change to the mirrored layout descriptor triggers a full resync
//! pass that re-derives the descriptor from the current task set.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::bus::{ChangeEvent, ChangeKind, EventBus};
use crate::codec;
use crate::config::Config;
use crate::docs::DocStore;
use crate::engine::{RecentWrites, SyncEngine};
use crate::error::{Error, Result};
use crate::task::{TaskDraft, TaskPatch};
use crate::watch::DocWatcher;

#[derive(Clone)]
pub struct MirrorWorker {
    engine: SyncEngine,
    bus: EventBus,
    mirror_docs: DocStore,
    layout_path: PathBuf,
    recent: Arc<RecentWrites>,
}

impl MirrorWorker {
    pub fn new(engine: SyncEngine, bus: EventBus, mirror_root: &Path, config: &Config) -> Self {
        Self {
            engine,
            bus,
            mirror_docs: DocStore::new(
                config.mirror_docs_root(mirror_root),
                config.docs.extension.clone(),
            ),
            layout_path: config.layout_path(mirror_root),
            recent: Arc::new(RecentWrites::new(Duration::from_millis(
                config.suppress_window_ms,
            ))),
        }
    }

    pub fn mirror_docs(&self) -> &DocStore {
        &self.mirror_docs
    }

    /// Run the worker until the bus closes: seed the mirror, watch it,
    /// and consume change events.
    pub async fn run(self) -> Result<()> {
        self.mirror_docs.ensure_root()?;

        // Subscribe before seeding so nothing published mid-seed is lost.
        let mut rx = self.bus.subscribe();

        let baseline = Arc::new(Mutex::new(None));
        self.seed(&baseline)?;

        let doc_watcher = DocWatcher::spawn(
            self.mirror_docs.root().to_path_buf(),
            self.clone().edit_handler(),
        )?;
        let layout_watcher = DocWatcher::spawn(
            self.layout_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
            self.clone().layout_handler(Arc::clone(&baseline)),
        )?;

        info!(mirror = %self.mirror_docs.root().display(), "mirror worker running");

        loop {
            match rx.recv().await {
                Ok(envelope) => self.handle_event(&envelope.event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "mirror lagged behind the bus, reseeding");
                    if let Err(err) = self.seed(&baseline) {
                        warn!(%err, "reseed failed");
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        doc_watcher.stop();
        layout_watcher.stop();
        Ok(())
    }

    /// Full pass: mirror every current task's document and re-derive the
    /// layout descriptor.
    fn seed(&self, baseline: &Mutex<Option<String>>) -> Result<()> {
        for task in self.engine.list()? {
            self.refresh(&task.id);
        }
        let written = self.resync_layout()?;
        *baseline.lock().expect("baseline poisoned") = Some(written);
        Ok(())
    }

    fn handle_event(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Created | ChangeKind::Updated => self.refresh(&event.task_id),
            ChangeKind::Deleted => {
                if let Err(err) = self.mirror_docs.delete(&event.task_id) {
                    warn!(task_id = %event.task_id, %err, "mirror delete failed");
                }
            }
        }
    }

    /// Fetch the task and overwrite its mirror document.
    fn refresh(&self, id: &str) {
        match self.engine.get(id) {
            Ok(task) => {
                self.recent.record(id, &task.content);
                if let Err(err) = self.mirror_docs.write(id, &task.content) {
                    warn!(task_id = %id, %err, "mirror write failed");
                }
            }
            // The task can be gone by the time the event is handled; the
            // matching deleted event will clean the mirror up.
            Err(Error::NotFound(_)) => debug!(task_id = %id, "task vanished before mirroring"),
            Err(err) => warn!(task_id = %id, %err, "fetch for mirroring failed"),
        }
    }

    /// Handler for edits detected in the mirror tree: decode and push the
    /// fields upstream through the engine API, closing the loop.
    fn edit_handler(self) -> impl Fn(&Path) + Send + 'static {
        move |path| {
            let Some(id) = self.mirror_docs.task_id_for(path) else {
                return;
            };
            let text = match self.mirror_docs.read(&id) {
                Ok(text) => text,
                Err(err) => {
                    debug!(task_id = %id, %err, "mirror document unreadable, skipping");
                    return;
                }
            };
            if self.recent.should_suppress(&id, &text) {
                debug!(task_id = %id, "skipping worker-originated mirror write");
                return;
            }

            let decoded = codec::decode(&text);
            let patch = TaskPatch {
                title: Some(decoded.title.clone()),
                content: Some(decoded.content.clone()),
                metadata: Some(decoded.metadata.clone()),
                ..TaskPatch::default()
            };
            let pushed = match self.engine.update(&id, patch) {
                Err(Error::NotFound(_)) => {
                    let draft = TaskDraft {
                        id: Some(id.clone()),
                        title: decoded.title,
                        content: Some(decoded.content),
                        metadata: Some(decoded.metadata),
                        ..TaskDraft::default()
                    };
                    self.engine.create(draft).map(|_| ())
                }
                other => other.map(|_| ()),
            };
            match pushed {
                Ok(()) => debug!(task_id = %id, "pushed mirror edit upstream"),
                Err(err) => warn!(task_id = %id, %err, "failed to push mirror edit upstream"),
            }
        }
    }

    /// Handler for changes to the mirrored layout descriptor: when the
    /// text differs from the threaded baseline, run a full resync pass.
    fn layout_handler(
        self,
        baseline: Arc<Mutex<Option<String>>>,
    ) -> impl Fn(&Path) + Send + 'static {
        move |path| {
            if !self.is_layout_path(path) {
                return;
            }
            let current = match crate::layout::read(path) {
                Ok(text) => text,
                Err(err) => {
                    debug!(%err, "layout descriptor unreadable, skipping");
                    return;
                }
            };

            let mut guard = baseline.lock().expect("baseline poisoned");
            let (changed, next) = crate::layout::diff_baseline(guard.as_deref(), &current);
            if !changed {
                *guard = Some(next);
                return;
            }

            match self.resync_layout() {
                Ok(written) => {
                    *guard = Some(written);
                    debug!("layout descriptor resynced");
                }
                Err(err) => warn!(%err, "layout resync failed"),
            }
        }
    }

    fn is_layout_path(&self, path: &Path) -> bool {
        if path == self.layout_path {
            return true;
        }
        if path.file_name() != self.layout_path.file_name() {
            return false;
        }
        match (path.parent(), self.layout_path.parent()) {
            (Some(a), Some(b)) => crate::docs::same_dir(a, b),
            _ => false,
        }
    }

    /// Re-derive the descriptor from the current tasks and edges and
    /// write the mirror copy. Returns the written text.
    fn resync_layout(&self) -> Result<String> {
        let tasks = self.engine.list()?;
        let doc = crate::layout::derive(&tasks);
        crate::layout::write(&self.layout_path, &doc)
    }
}
