//! tasksync task command implementations.

use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::bus::EventBus;
use crate::cli::TaskCommands;
use crate::config::Config;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::output::{emit_success, OutputOptions};
use crate::task::{Position, Priority, TaskDraft, TaskKind, TaskMeta, TaskPatch, TaskStatus};

pub fn run(command: TaskCommands, workspace: PathBuf, output: OutputOptions) -> Result<()> {
    let engine = open_engine(&workspace);
    match command {
        TaskCommands::New {
            title,
            id,
            kind,
            parent,
            status,
            priority,
            due,
            assignee,
            position,
        } => run_new(
            &engine,
            output,
            NewOptions {
                title,
                id,
                kind,
                parent,
                status,
                priority,
                due,
                assignee,
                position,
            },
        ),
        TaskCommands::List => run_list(&engine, output),
        TaskCommands::Show { id } => run_show(&engine, output, &id),
        TaskCommands::Set {
            id,
            title,
            kind,
            parent,
            clear_parent,
            status,
            priority,
            due,
            assignee,
            position,
        } => run_set(
            &engine,
            output,
            SetOptions {
                id,
                title,
                kind,
                parent,
                clear_parent,
                status,
                priority,
                due,
                assignee,
                position,
            },
        ),
        TaskCommands::Content { id, file } => run_content(&engine, output, &id, file),
        TaskCommands::Rm { id } => run_rm(&engine, output, &id),
    }
}

fn open_engine(workspace: &PathBuf) -> SyncEngine {
    let config = Config::load_from_workspace(workspace);
    let bus = EventBus::new(config.bus.capacity);
    SyncEngine::open(workspace, &config, bus)
}

struct NewOptions {
    title: String,
    id: Option<String>,
    kind: Option<String>,
    parent: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    due: Option<String>,
    assignee: Option<String>,
    position: Option<String>,
}

fn run_new(engine: &SyncEngine, output: OutputOptions, options: NewOptions) -> Result<()> {
    let metadata = if options.priority.is_some()
        || options.due.is_some()
        || options.assignee.is_some()
    {
        Some(TaskMeta {
            priority: match options.priority.as_deref() {
                Some(value) => Priority::parse(value)?,
                None => Priority::default(),
            },
            due_date: options.due.as_deref().map(parse_due).transpose()?,
            assignee: options.assignee.unwrap_or_default(),
            subtasks: Vec::new(),
        })
    } else {
        None
    };

    let draft = TaskDraft {
        id: options.id,
        title: options.title,
        kind: options.kind.as_deref().map(TaskKind::parse).transpose()?,
        parent: options.parent,
        status: options.status.as_deref().map(TaskStatus::parse).transpose()?,
        position: options
            .position
            .as_deref()
            .map(parse_position)
            .transpose()?,
        content: None,
        metadata,
    };

    let task = engine.create(draft)?;
    emit_success(
        output,
        "task new",
        &task,
        &[format!("Created task {} ({})", task.id, task.title)],
    )
}

fn run_list(engine: &SyncEngine, output: OutputOptions) -> Result<()> {
    let tasks = engine.list()?;
    let lines: Vec<String> = tasks
        .iter()
        .map(|task| {
            format!(
                "{}  [{}] {} ({})",
                task.id,
                task.status.as_str(),
                task.title,
                task.kind.as_str()
            )
        })
        .collect();
    emit_success(output, "task list", &tasks, &lines)
}

fn run_show(engine: &SyncEngine, output: OutputOptions, id: &str) -> Result<()> {
    let task = engine.get(id)?;
    let mut lines = vec![
        format!("{}  [{}] {}", task.id, task.status.as_str(), task.title),
        format!("priority: {}", task.metadata.priority.as_str()),
    ];
    if let Some(due) = task.metadata.due_date {
        lines.push(format!("due: {due}"));
    }
    if !task.metadata.assignee.is_empty() {
        lines.push(format!("assignee: {}", task.metadata.assignee));
    }
    if let Some(parent) = &task.parent {
        lines.push(format!("parent: {parent}"));
    }
    lines.push(String::new());
    lines.push(task.content.clone());
    emit_success(output, "task show", &task, &lines)
}

struct SetOptions {
    id: String,
    title: Option<String>,
    kind: Option<String>,
    parent: Option<String>,
    clear_parent: bool,
    status: Option<String>,
    priority: Option<String>,
    due: Option<String>,
    assignee: Option<String>,
    position: Option<String>,
}

fn run_set(engine: &SyncEngine, output: OutputOptions, options: SetOptions) -> Result<()> {
    let metadata = if options.priority.is_some()
        || options.due.is_some()
        || options.assignee.is_some()
    {
        // Metadata is patched as a whole, so start from the stored value.
        let mut meta = engine.get(&options.id)?.metadata;
        if let Some(value) = options.priority.as_deref() {
            meta.priority = Priority::parse(value)?;
        }
        if let Some(value) = options.due.as_deref() {
            meta.due_date = Some(parse_due(value)?);
        }
        if let Some(value) = options.assignee {
            meta.assignee = value;
        }
        Some(meta)
    } else {
        None
    };

    let parent = if options.clear_parent {
        Some(None)
    } else {
        options.parent.map(Some)
    };

    let patch = TaskPatch {
        title: options.title,
        kind: options.kind.as_deref().map(TaskKind::parse).transpose()?,
        parent,
        status: options.status.as_deref().map(TaskStatus::parse).transpose()?,
        position: options
            .position
            .as_deref()
            .map(parse_position)
            .transpose()?,
        content: None,
        metadata,
    };

    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to update; pass at least one field".to_string(),
        ));
    }

    let task = engine.update(&options.id, patch)?;
    emit_success(
        output,
        "task set",
        &task,
        &[format!("Updated task {}", task.id)],
    )
}

fn run_content(
    engine: &SyncEngine,
    output: OutputOptions,
    id: &str,
    file: Option<PathBuf>,
) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    engine.update_content(id, &text)?;
    emit_success(
        output,
        "task content",
        &serde_json::json!({ "id": id, "bytes": text.len() }),
        &[format!("Wrote document for task {id}")],
    )
}

fn run_rm(engine: &SyncEngine, output: OutputOptions, id: &str) -> Result<()> {
    let removed = engine.delete(id)?;
    let mut lines = vec![format!("Removed {} task(s)", removed.len())];
    for id in &removed {
        lines.push(format!("- {id}"));
    }
    emit_success(
        output,
        "task rm",
        &serde_json::json!({ "removed": removed }),
        &lines,
    )
}

fn parse_due(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!("invalid due date '{value}' (expected YYYY-MM-DD)"))
    })
}

fn parse_position(value: &str) -> Result<Position> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| Error::InvalidArgument(format!("invalid position '{value}' (expected x,y)")))?;
    let parse = |part: &str| {
        part.trim().parse::<f64>().map_err(|_| {
            Error::InvalidArgument(format!("invalid position '{value}' (expected x,y)"))
        })
    };
    Ok(Position {
        x: parse(x)?,
        y: parse(y)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_position_accepts_floats() {
        let pos = parse_position("12.5, -3").expect("position");
        assert_eq!(pos.x, 12.5);
        assert_eq!(pos.y, -3.0);
    }

    #[test]
    fn parse_position_rejects_garbage() {
        assert!(parse_position("12.5").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn parse_due_rejects_bad_dates() {
        assert!(parse_due("2025-03-14").is_ok());
        assert!(parse_due("14/03/2025").is_err());
    }
}
