//! Change watcher for a document tree.
//!
//! Observes post-startup file modifications (notify emits nothing for
//! files already present when the watch starts) and hands each changed
//! path to a handler. There is no debouncing: every modification event
//! produces one handler call, and decoding unchanged text is idempotent,
//! so rapid successive writes are harmless.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::codec;
use crate::engine::SyncEngine;
use crate::error::Result;

pub struct DocWatcher {
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
}

impl DocWatcher {
    /// Watch `root` and call `handler` with each created or modified
    /// path. The handler runs on a dedicated thread in event order.
    pub fn spawn<F>(root: PathBuf, handler: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        std::fs::create_dir_all(&root)?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        let thread = thread::spawn(move || run_loop(rx, handler));
        Ok(Self { watcher, thread })
    }

    /// Stop watching and wait for in-flight handler calls to finish.
    pub fn stop(self) {
        drop(self.watcher);
        let _ = self.thread.join();
    }
}

fn run_loop<F>(rx: mpsc::Receiver<notify::Result<notify::Event>>, handler: F)
where
    F: Fn(&Path),
{
    for result in rx {
        match result {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in &event.paths {
                    handler(path.as_path());
                }
            }
            Err(err) => warn!(%err, "watch error"),
        }
    }
}

/// Handler that upserts changed primary-tree documents into the task
/// store through the engine. Writes the engine performed itself are
/// skipped via the shared suppression window.
pub fn engine_ingestor(engine: SyncEngine) -> impl Fn(&Path) + Send + 'static {
    move |path| {
        let Some(id) = engine.docs().task_id_for(path) else {
            return;
        };

        let text = match engine.docs().read(&id) {
            Ok(text) => text,
            // The file may already be gone again (editor temp files,
            // rapid rewrites); deletion is the engine's job, not ours.
            Err(err) => {
                debug!(task_id = %id, %err, "changed document unreadable, skipping");
                return;
            }
        };

        if engine.recent_writes().should_suppress(&id, &text) {
            debug!(task_id = %id, "skipping engine-originated write");
            return;
        }

        match engine.apply_decoded(&id, &codec::decode(&text)) {
            Ok(task) => debug!(task_id = %task.id, "ingested document change"),
            Err(err) => warn!(task_id = %id, %err, "failed to ingest document change"),
        }
    }
}
