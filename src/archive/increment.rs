//! The increment log (spec. 3, 4.7): a per-record, per-field marker tree
//! that records which index fragments currently exist for a record.
//!
//! Invariant: an increment file existing for `(id, field)` implies the
//! archive entry for `id` exists; [Archive::stash] and [Archive::delete]
//! both clear every increment entry for an id before returning, so a
//! stale fragment is never visible to the merger.

use std::{fs, path::PathBuf};

use crate::{archive::trie, err_at, Error, Result};

pub struct IncrementLog {
    root: PathBuf,
}

impl IncrementLog {
    pub fn new(root: impl Into<PathBuf>) -> IncrementLog {
        IncrementLog { root: root.into() }
    }

    fn path(&self, id: &str, field: &str) -> Result<PathBuf> {
        let base = trie::archive_path(&self.root, id, "e2x")?;
        let mut path = base.clone();
        path.set_file_name(format!("{}.{}.e2x", trie::strip_version(id), field));
        Ok(path)
    }

    /// Mark `(id, field)` as INDEXED: the indexer has just emitted a fragment.
    pub fn mark(&self, id: &str, field: &str) -> Result<()> {
        let path = self.path(id, field)?;
        if let Some(parent) = path.parent() {
            err_at!(IOError, fs::create_dir_all(parent))?;
        }
        err_at!(IOError, fs::write(&path, []))?;
        Ok(())
    }

    pub fn is_indexed(&self, id: &str, field: &str) -> Result<bool> {
        Ok(self.path(id, field)?.exists())
    }

    /// STALE transition: remove every per-field increment entry for `id`.
    /// Called before a re-index and immediately after every stash/delete.
    pub fn clear(&self, id: &str) -> Result<()> {
        let dir = match self.path(id, "dummy")?.parent().map(PathBuf::from) {
            Some(dir) => dir,
            None => return Ok(()),
        };
        let prefix = format!("{}.", trie::strip_version(id));
        if !dir.exists() {
            return Ok(());
        }
        for entry in err_at!(IOError, fs::read_dir(&dir))? {
            let entry = err_at!(IOError, entry)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".e2x") {
                err_at!(IOError, fs::remove_file(entry.path()))?;
            }
        }
        Ok(())
    }

    /// Fields currently marked INDEXED for `id`; the merger only consumes
    /// fragments whose field is still present here.
    pub fn fields_for(&self, id: &str) -> Result<Vec<String>> {
        let dir = match self.path(id, "dummy")?.parent().map(PathBuf::from) {
            Some(dir) => dir,
            None => return Ok(Vec::new()),
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}.", trie::strip_version(id));
        let mut fields = Vec::new();
        for entry in err_at!(IOError, fs::read_dir(&dir))? {
            let entry = err_at!(IOError, entry)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(rest) = name.strip_prefix(&prefix) {
                if let Some(field) = rest.strip_suffix(".e2x") {
                    fields.push(field.to_string());
                }
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = IncrementLog::new(dir.path());

        assert!(!log.is_indexed("42", "title").unwrap());
        log.mark("42", "title").unwrap();
        log.mark("42", "abstract").unwrap();
        assert!(log.is_indexed("42", "title").unwrap());

        let mut fields = log.fields_for("42").unwrap();
        fields.sort();
        assert_eq!(fields, vec!["abstract".to_string(), "title".to_string()]);

        log.clear("42").unwrap();
        assert!(!log.is_indexed("42", "title").unwrap());
        assert!(log.fields_for("42").unwrap().is_empty());
    }
}
