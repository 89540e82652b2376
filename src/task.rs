//! Task model for tasksync.
//!
//! A task is a node in the work hierarchy: either on the primary path
//! (`main`) or a branch off another task. Each task owns exactly one
//! markdown document; the structured fields here are the authoritative
//! record the document is derived from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Main,
    Branch,
}

impl TaskKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "main" => Ok(TaskKind::Main),
            "branch" => Ok(TaskKind::Branch),
            other => Err(Error::InvalidArgument(format!(
                "unknown task kind '{other}' (expected main|branch)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Main => "main",
            TaskKind::Branch => "branch",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "not-started" => Ok(TaskStatus::NotStarted),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "blocked" => Ok(TaskStatus::Blocked),
            other => Err(Error::InvalidArgument(format!(
                "unknown task status '{other}' (expected not-started|in-progress|completed|blocked)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Lenient parse used by the markdown decoder: unknown values fall
    /// back to the default instead of failing.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            _ => Priority::default(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected low|medium|high)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMeta {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
}

/// 2D canvas coordinate. Presentation-only: the engine stores and
/// forwards it but never interprets it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default)]
    pub metadata: TaskMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Bump `updated_at`, keeping it monotonic non-decreasing even if the
    /// wall clock stepped backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Fields accepted by `create`. Everything but the title is optional and
/// defaulted; the id is generated when absent.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub id: Option<String>,
    pub title: String,
    pub kind: Option<TaskKind>,
    pub parent: Option<String>,
    pub status: Option<TaskStatus>,
    pub position: Option<Position>,
    pub content: Option<String>,
    pub metadata: Option<TaskMeta>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validate and materialize the draft into a full task record.
    pub fn into_task(self) -> Result<Task> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title cannot be empty".to_string()));
        }

        let id = match self.id {
            Some(id) => validate_id(&id)?,
            None => generate_id(),
        };

        let now = Utc::now();
        Ok(Task {
            id,
            title,
            kind: self.kind.unwrap_or_default(),
            parent: self.parent,
            status: self.status.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update applied by `update`. `None` means "leave as stored";
/// `parent` uses a nested option so a patch can also clear the link.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub kind: Option<TaskKind>,
    pub parent: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub position: Option<Position>,
    pub content: Option<String>,
    pub metadata: Option<TaskMeta>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.kind.is_none()
            && self.parent.is_none()
            && self.status.is_none()
            && self.position.is_none()
            && self.content.is_none()
            && self.metadata.is_none()
    }

    /// Merge the supplied fields into `task`, leaving everything else
    /// untouched, and bump `updated_at`.
    pub fn apply(self, task: &mut Task) -> Result<()> {
        if let Some(title) = self.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::Validation("title cannot be empty".to_string()));
            }
            task.title = title;
        }
        if let Some(kind) = self.kind {
            task.kind = kind;
        }
        if let Some(parent) = self.parent {
            task.parent = parent;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(position) = self.position {
            task.position = position;
        }
        if let Some(content) = self.content {
            task.content = content;
        }
        if let Some(metadata) = self.metadata {
            task.metadata = metadata;
        }
        task.touch();
        Ok(())
    }
}

/// Generate a fresh task id (lowercase ULID).
pub fn generate_id() -> String {
    Ulid::new().to_string().to_ascii_lowercase()
}

/// Validate a caller-supplied task id.
///
/// The document path derives from the id, so it must stay a single safe
/// path component: no separators, no `..`, no leading dot.
pub fn validate_id(id: &str) -> Result<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("task id cannot be empty".to_string()));
    }
    if trimmed == "." || trimmed == ".." || trimmed.starts_with('.') {
        return Err(Error::Validation(format!("invalid task id '{trimmed}'")));
    }
    let ok = trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if !ok {
        return Err(Error::Validation(format!(
            "invalid task id '{trimmed}' (allowed: alphanumeric, '-', '_', '.')"
        )));
    }
    Ok(trimmed.to_string())
}
