//! Synchronization engine contract tests.

mod support;

use support::TestWorkspace;
use tasksync::bus::ChangeKind;
use tasksync::codec::PARSE_FAILED_TITLE;
use tasksync::error::Error;
use tasksync::task::{TaskDraft, TaskPatch, TaskStatus};

fn draft(id: &str, title: &str) -> TaskDraft {
    let mut draft = TaskDraft::new(title);
    draft.id = Some(id.to_string());
    draft
}

#[test]
fn create_then_get_returns_document_heading() {
    let ws = TestWorkspace::new();
    let task = ws.engine.create(draft("t1", "Plan release")).expect("create");
    assert_eq!(task.title, "Plan release");

    let fetched = ws.engine.get("t1").expect("get");
    assert_eq!(fetched.title, "Plan release");
    assert_eq!(fetched.content.lines().next(), Some("# Plan release"));
    assert!(ws.engine.docs().exists("t1"));
}

#[test]
fn create_without_id_generates_one() {
    let ws = TestWorkspace::new();
    let task = ws
        .engine
        .create(TaskDraft::new("Unnamed id"))
        .expect("create");
    assert!(!task.id.is_empty());
    assert!(ws.engine.docs().exists(&task.id));
}

#[test]
fn create_blank_title_is_validation_failure() {
    let ws = TestWorkspace::new();
    let err = ws.engine.create(draft("t1", "  ")).expect_err("blank title");
    assert!(matches!(err, Error::Validation(_)));
    assert!(!ws.engine.docs().exists("t1"));
}

#[test]
fn duplicate_id_is_rejected() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "First")).expect("create");
    let err = ws.engine.create(draft("t1", "Second")).expect_err("dup");
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn update_changes_only_supplied_fields() {
    let ws = TestWorkspace::new();
    let created = ws.engine.create(draft("t1", "Plan release")).expect("create");

    let patch = TaskPatch {
        status: Some(TaskStatus::InProgress),
        ..TaskPatch::default()
    };
    let updated = ws.engine.update("t1", patch).expect("update");

    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.title, created.title);
    assert!(updated.updated_at >= created.updated_at);

    // The document heading stays put when the title was not supplied.
    let doc = ws.engine.docs().read("t1").expect("doc");
    assert_eq!(doc.lines().next(), Some("# Plan release"));
}

#[test]
fn update_title_rewrites_document_heading() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "Plan release")).expect("create");

    let patch = TaskPatch {
        title: Some("Plan release v2".to_string()),
        ..TaskPatch::default()
    };
    ws.engine.update("t1", patch).expect("update");

    let doc = ws.engine.docs().read("t1").expect("doc");
    assert_eq!(doc.lines().next(), Some("# Plan release v2"));
}

#[test]
fn update_missing_task_is_not_found() {
    let ws = TestWorkspace::new();
    let err = ws
        .engine
        .update("ghost", TaskPatch::default())
        .expect_err("not found");
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn update_content_writes_verbatim_and_merges_fields() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "Plan release")).expect("create");

    let text = "# Edited title\n\n- **Priority**: high\n- [ ] follow up\n";
    ws.engine.update_content("t1", text).expect("content");

    assert_eq!(ws.engine.docs().read("t1").expect("doc"), text);

    let task = ws.engine.get("t1").expect("get");
    assert_eq!(task.title, "Edited title");
    assert_eq!(task.metadata.priority.as_str(), "high");
    assert_eq!(task.metadata.subtasks.len(), 1);
}

#[test]
fn update_content_for_untracked_id_only_writes_document() {
    let ws = TestWorkspace::new();
    ws.engine
        .update_content("loose", "# Loose doc\n")
        .expect("content");

    assert!(ws.engine.docs().exists("loose"));
    assert!(matches!(ws.engine.get("loose"), Err(Error::NotFound(_))));
}

#[test]
fn delete_cascades_to_descendants_and_documents() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("root", "Root")).expect("create");
    let mut child = draft("child", "Child");
    child.parent = Some("root".to_string());
    ws.engine.create(child).expect("create");
    let mut grandchild = draft("grandchild", "Grandchild");
    grandchild.parent = Some("child".to_string());
    ws.engine.create(grandchild).expect("create");

    let removed = ws.engine.delete("root").expect("delete");
    assert_eq!(removed, vec!["root", "child", "grandchild"]);

    for id in ["root", "child", "grandchild"] {
        assert!(matches!(ws.engine.get(id), Err(Error::NotFound(_))));
        assert!(!ws.engine.docs().exists(id));
    }
}

#[test]
fn delete_missing_task_is_not_found() {
    let ws = TestWorkspace::new();
    let err = ws.engine.delete("ghost").expect_err("not found");
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn every_mutation_emits_one_event_per_task() {
    let ws = TestWorkspace::new();
    let mut rx = ws.bus.subscribe();

    ws.engine.create(draft("t1", "Plan release")).expect("create");
    ws.engine
        .update(
            "t1",
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..TaskPatch::default()
            },
        )
        .expect("update");
    ws.engine.delete("t1").expect("delete");

    let kinds: Vec<ChangeKind> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|envelope| envelope.event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
    );
}

#[test]
fn get_prefers_live_document_text() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "Plan release")).expect("create");

    // Rewrite the document behind the engine's back.
    ws.engine
        .docs()
        .write("t1", "# Plan release\n\nhand-edited body\n")
        .expect("write");

    let task = ws.engine.get("t1").expect("get");
    assert!(task.content.contains("hand-edited body"));
}

#[test]
fn sync_from_doc_upserts_heading_rewrite() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "Plan release")).expect("create");

    ws.engine
        .docs()
        .write("t1", "# Plan release v2\n\nbody\n")
        .expect("write");
    ws.engine.sync_from_doc("t1").expect("sync");

    assert_eq!(ws.engine.get("t1").expect("get").title, "Plan release v2");
}

#[test]
fn sync_from_doc_without_heading_applies_sentinel() {
    let ws = TestWorkspace::new();
    ws.engine.create(draft("t1", "Plan release")).expect("create");

    let raw = "no heading at all\n";
    ws.engine.docs().write("t1", raw).expect("write");
    ws.engine.sync_from_doc("t1").expect("sync");

    let task = ws.engine.get("t1").expect("get");
    assert_eq!(task.title, PARSE_FAILED_TITLE);
    assert_eq!(task.content, raw);
}
