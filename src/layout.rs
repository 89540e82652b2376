//! Graph layout descriptor.
//!
//! A JSON document enumerating presentation nodes and edges, re-derived
//! from the current task set. It lives outside the synchronization core
//! except as the mirror worker's resync trigger: when the mirrored copy
//! changes, the worker re-derives it from the tasks and rewrites it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::write_atomic;
use crate::task::{Position, Task, TaskKind, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub kind: TaskKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub status: TaskStatus,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutDoc {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

/// Derive the descriptor from the current task set. Edges follow parent
/// links, parent to child. Output order is deterministic so identical
/// task sets render identical descriptors.
pub fn derive(tasks: &[Task]) -> LayoutDoc {
    let mut nodes: Vec<LayoutNode> = tasks
        .iter()
        .map(|task| LayoutNode {
            id: task.id.clone(),
            kind: task.kind,
            title: task.title.clone(),
            parent: task.parent.clone(),
            status: task.status,
            position: task.position,
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<LayoutEdge> = tasks
        .iter()
        .filter_map(|task| {
            task.parent.as_ref().map(|parent| LayoutEdge {
                from: parent.clone(),
                to: task.id.clone(),
            })
        })
        .collect();
    edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

    LayoutDoc { nodes, edges }
}

pub fn render(doc: &LayoutDoc) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Write the descriptor atomically, returning the rendered text so the
/// caller can keep it as its change-detection baseline.
pub fn write(path: &Path, doc: &LayoutDoc) -> Result<String> {
    let text = render(doc)?;
    write_atomic(path, text.as_bytes())?;
    Ok(text)
}

pub fn read(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

/// Compare descriptor text against an explicit baseline.
///
/// Returns whether the text differs plus the new baseline to thread into
/// the next comparison. State lives with the caller, never in a shared
/// mutable cache.
pub fn diff_baseline(baseline: Option<&str>, current: &str) -> (bool, String) {
    let changed = baseline != Some(current);
    (changed, current.to_string())
}
