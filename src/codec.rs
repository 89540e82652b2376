//! Markdown codec: bidirectional transform between structured task
//! fields and document text.
//!
//! Encoding treats non-empty task content as authoritative: only the
//! leading heading line is rewritten. Empty content gets a synthesized
//! template. Decoding is total: any input yields a usable record,
//! degrading to a sentinel title when no heading is present.

use chrono::NaiveDate;

use crate::task::{Priority, Subtask, Task, TaskMeta};

/// Title given to documents that decode without a `# ` heading line.
pub const PARSE_FAILED_TITLE: &str = "Unparsed task";

/// Heading used when a task somehow carries a blank title.
pub const UNTITLED: &str = "Untitled task";

const NO_DESCRIPTION: &str = "No description yet.";
const NO_NOTES: &str = "No notes yet.";

const PRIORITY_LABEL: &str = "**Priority**:";
const DUE_DATE_LABEL: &str = "**Due Date**:";
const ASSIGNEE_LABEL: &str = "**Assignee**:";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Partial task fields recovered from document text.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDoc {
    pub title: String,
    pub content: String,
    pub metadata: TaskMeta,
}

/// Render a task as document text.
pub fn encode(task: &Task) -> String {
    let title = display_title(&task.title);

    if !task.content.trim().is_empty() {
        return replace_heading(&task.content, title);
    }

    let mut out = String::new();
    out.push_str("# ");
    out.push_str(title);
    out.push_str("\n\n## Description\n");
    out.push_str(NO_DESCRIPTION);
    out.push_str("\n\n## Details\n");
    out.push_str(&format!(
        "- {PRIORITY_LABEL} {}\n",
        task.metadata.priority.as_str()
    ));
    if let Some(due) = task.metadata.due_date {
        out.push_str(&format!("- {DUE_DATE_LABEL} {}\n", due.format(DATE_FORMAT)));
    }
    if !task.metadata.assignee.is_empty() {
        out.push_str(&format!("- {ASSIGNEE_LABEL} {}\n", task.metadata.assignee));
    }
    out.push('\n');

    if !task.metadata.subtasks.is_empty() {
        out.push_str("## Subtasks\n");
        for subtask in &task.metadata.subtasks {
            let mark = if subtask.completed { 'x' } else { ' ' };
            out.push_str(&format!("- [{mark}] {}\n", subtask.description));
        }
        out.push('\n');
    }

    out.push_str("## Notes\n");
    out.push_str(NO_NOTES);
    out.push('\n');
    out
}

/// Extract task fields from document text. Never fails: unmatched fields
/// stay at their defaults and an unparseable document keeps its raw text
/// as content under the sentinel title.
pub fn decode(text: &str) -> DecodedDoc {
    let mut title: Option<String> = None;
    let mut priority: Option<Priority> = None;
    let mut due_date: Option<NaiveDate> = None;
    let mut assignee: Option<String> = None;
    let mut subtasks = Vec::new();

    for line in text.lines() {
        if title.is_none() {
            if let Some(rest) = line.strip_prefix("# ") {
                let heading = rest.trim();
                if !heading.is_empty() {
                    title = Some(heading.to_string());
                }
            }
        }
        if priority.is_none() {
            if let Some(value) = label_value(line, PRIORITY_LABEL) {
                priority = Some(Priority::parse_lenient(value));
            }
        }
        if due_date.is_none() {
            if let Some(value) = label_value(line, DUE_DATE_LABEL) {
                due_date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok();
            }
        }
        if assignee.is_none() {
            if let Some(value) = label_value(line, ASSIGNEE_LABEL) {
                assignee = Some(value.to_string());
            }
        }
        if let Some((completed, description)) = checklist_item(line) {
            subtasks.push(Subtask {
                description: description.to_string(),
                completed,
            });
        }
    }

    DecodedDoc {
        title: title.unwrap_or_else(|| PARSE_FAILED_TITLE.to_string()),
        content: text.to_string(),
        metadata: TaskMeta {
            priority: priority.unwrap_or_default(),
            due_date,
            assignee: assignee.unwrap_or_default(),
            subtasks,
        },
    }
}

fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        UNTITLED
    } else {
        trimmed
    }
}

/// Swap the leading heading line for `# {title}`, or prepend one.
/// Everything after the heading line is preserved byte-for-byte.
fn replace_heading(content: &str, title: &str) -> String {
    if content.starts_with("# ") {
        match content.find('\n') {
            Some(idx) => format!("# {title}{}", &content[idx..]),
            None => format!("# {title}"),
        }
    } else {
        format!("# {title}\n\n{content}")
    }
}

fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let idx = line.find(label)?;
    let value = line[idx + label.len()..].trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn checklist_item(line: &str) -> Option<(bool, &str)> {
    let idx = line.find("- [")?;
    let rest = &line[idx + 3..];
    let (completed, rest) = if let Some(rest) = rest.strip_prefix("x] ") {
        (true, rest)
    } else if let Some(rest) = rest.strip_prefix(" ] ") {
        (false, rest)
    } else {
        return None;
    };
    let description = rest.trim();
    if description.is_empty() {
        None
    } else {
        Some((completed, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    fn task_with_meta() -> Task {
        let mut draft = TaskDraft::new("Plan release");
        draft.id = Some("t1".to_string());
        draft.metadata = Some(TaskMeta {
            priority: Priority::High,
            due_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            assignee: "alice".to_string(),
            subtasks: vec![
                Subtask {
                    description: "write changelog".to_string(),
                    completed: true,
                },
                Subtask {
                    description: "tag build".to_string(),
                    completed: false,
                },
            ],
        });
        draft.into_task().expect("task")
    }

    #[test]
    fn encode_synthesizes_template_for_empty_content() {
        let doc = encode(&task_with_meta());
        assert!(doc.starts_with("# Plan release\n"));
        assert!(doc.contains("## Description\n"));
        assert!(doc.contains("- **Priority**: high\n"));
        assert!(doc.contains("- **Due Date**: 2025-03-14\n"));
        assert!(doc.contains("- **Assignee**: alice\n"));
        assert!(doc.contains("- [x] write changelog\n"));
        assert!(doc.contains("- [ ] tag build\n"));
        assert!(doc.contains("## Notes\n"));
    }

    #[test]
    fn encode_omits_absent_details() {
        let task = TaskDraft::new("Bare").into_task().expect("task");
        let doc = encode(&task);
        assert!(doc.contains("- **Priority**: medium\n"));
        assert!(!doc.contains("**Due Date**"));
        assert!(!doc.contains("**Assignee**"));
        assert!(!doc.contains("## Subtasks"));
    }

    #[test]
    fn round_trip_recovers_fields_for_empty_content() {
        let task = task_with_meta();
        let decoded = decode(&encode(&task));
        assert_eq!(decoded.title, task.title);
        assert_eq!(decoded.metadata, task.metadata);
    }

    #[test]
    fn encode_with_content_replaces_only_heading_line() {
        let mut task = task_with_meta();
        task.content = "# Old name\nbody line one\n\n  indented\ntrailing\n".to_string();
        let doc = encode(&task);
        assert_eq!(doc, "# Plan release\nbody line one\n\n  indented\ntrailing\n");
    }

    #[test]
    fn encode_prepends_heading_when_content_has_none() {
        let mut task = task_with_meta();
        task.content = "just notes\nmore notes".to_string();
        let doc = encode(&task);
        assert_eq!(doc, "# Plan release\n\njust notes\nmore notes");
    }

    #[test]
    fn decode_of_authored_content_recovers_title() {
        let mut task = task_with_meta();
        task.content = "# Old name\nfree-form body".to_string();
        let decoded = decode(&encode(&task));
        assert_eq!(decoded.title, "Plan release");
    }

    #[test]
    fn decode_without_heading_uses_sentinel_and_keeps_raw_text() {
        let raw = "no heading here\n- [ ] still a subtask\n";
        let decoded = decode(raw);
        assert_eq!(decoded.title, PARSE_FAILED_TITLE);
        assert_eq!(decoded.content, raw);
        assert_eq!(decoded.metadata.subtasks.len(), 1);
    }

    #[test]
    fn decode_takes_first_heading_and_first_labels() {
        let raw = "# First\n# Second\n- **Priority**: low\n- **Priority**: high\n";
        let decoded = decode(raw);
        assert_eq!(decoded.title, "First");
        assert_eq!(decoded.metadata.priority, Priority::Low);
    }

    #[test]
    fn decode_tolerates_malformed_values() {
        let raw = "# T\n- **Due Date**: not-a-date\n- **Priority**: urgent\n";
        let decoded = decode(raw);
        assert!(decoded.metadata.due_date.is_none());
        assert_eq!(decoded.metadata.priority, Priority::Medium);
    }

    #[test]
    fn decode_preserves_subtask_order_and_flags() {
        let raw = "# T\n- [ ] first\n- [x] second\n- [ ] third\n";
        let decoded = decode(raw);
        let flags: Vec<(bool, &str)> = decoded
            .metadata
            .subtasks
            .iter()
            .map(|s| (s.completed, s.description.as_str()))
            .collect();
        assert_eq!(
            flags,
            vec![(false, "first"), (true, "second"), (false, "third")]
        );
    }

    #[test]
    fn decode_is_idempotent_on_unchanged_text() {
        let doc = encode(&task_with_meta());
        assert_eq!(decode(&doc), decode(&doc));
    }

    #[test]
    fn blank_title_renders_placeholder_heading() {
        let mut task = task_with_meta();
        task.title = String::new();
        let doc = encode(&task);
        assert!(doc.starts_with(&format!("# {UNTITLED}\n")));
    }
}
