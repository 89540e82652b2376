//! Document store accessor.
//!
//! One markdown file per task, named by task id, under a dedicated
//! subtree (`flows/` by default). Writes are atomic; deleting a missing
//! document is not an error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::store::write_atomic;

#[derive(Debug, Clone)]
pub struct DocStore {
    root: PathBuf,
    extension: String,
}

impl DocStore {
    pub fn new(root: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            root,
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path of the document belonging to a task id.
    pub fn doc_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{}", self.extension))
    }

    /// Derive the task id from a document path, if the path points at a
    /// document of this store.
    pub fn task_id_for(&self, path: &Path) -> Option<String> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
            return None;
        }
        if !same_dir(path.parent()?, &self.root) {
            return None;
        }
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(|stem| stem.to_string())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.doc_path(id).exists()
    }

    pub fn read(&self, id: &str) -> Result<String> {
        Ok(fs::read_to_string(self.doc_path(id))?)
    }

    pub fn write(&self, id: &str, text: &str) -> Result<()> {
        write_atomic(&self.doc_path(id), text.as_bytes())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.doc_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Directory equality tolerant of relative-vs-absolute spellings: the
/// watcher reports absolute paths while a store root may be relative.
pub(crate) fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DocStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = DocStore::new(dir.path().join("flows"), "md");
        (dir, store)
    }

    #[test]
    fn path_derivation_round_trips() {
        let (_dir, store) = store();
        let path = store.doc_path("t1");
        assert!(path.ends_with("flows/t1.md"));
        assert_eq!(store.task_id_for(&path).as_deref(), Some("t1"));
    }

    #[test]
    fn task_id_for_rejects_foreign_paths() {
        let (dir, store) = store();
        assert!(store.task_id_for(&dir.path().join("flows/t1.txt")).is_none());
        assert!(store.task_id_for(&dir.path().join("elsewhere/t1.md")).is_none());
        assert!(store
            .task_id_for(&dir.path().join("flows/nested/t1.md"))
            .is_none());
    }

    #[test]
    fn write_read_delete_cycle() {
        let (_dir, store) = store();
        store.write("t1", "# Hello\n").expect("write");
        assert!(store.exists("t1"));
        assert_eq!(store.read("t1").expect("read"), "# Hello\n");

        store.delete("t1").expect("delete");
        assert!(!store.exists("t1"));
    }

    #[test]
    fn delete_missing_is_ok() {
        let (_dir, store) = store();
        store.delete("ghost").expect("delete missing");
    }

    #[test]
    fn write_creates_parent_directories() {
        let (_dir, store) = store();
        store.write("t1", "body").expect("write");
        assert!(store.root().exists());
    }
}
