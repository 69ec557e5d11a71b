//! The trie-addressed content-addressed archive (spec. 4.4) and its
//! incremental invalidation protocol (spec. 4.7).

pub mod increment;
pub mod trie;

use std::{
    fs,
    io::{Read, Write},
    path::PathBuf,
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::{err_at, format, util, Error, Result};
pub use increment::IncrementLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashOutcome {
    Created,
    Replaced,
    Unchanged,
}

pub struct Archive {
    root: PathBuf,
    gzip: bool,
    increment: IncrementLog,
    boilerplate: Option<String>,
}

impl Archive {
    pub fn new(root: impl Into<PathBuf>, incr_root: impl Into<PathBuf>, gzip: bool) -> Archive {
        Archive { root: root.into(), gzip, increment: IncrementLog::new(incr_root), boilerplate: None }
    }

    /// Sets the per-database XML/DOCTYPE boilerplate prepended ahead of
    /// every stashed record (spec. 4.4). `doctype` is passed through to
    /// [`format::record_boilerplate`]; `None` clears it.
    pub fn with_boilerplate(mut self, doctype: Option<&str>) -> Archive {
        self.boilerplate = doctype.map(|d| format::record_boilerplate(Some(d)));
        self
    }

    fn candidate_paths(&self, id: &str) -> Result<(PathBuf, PathBuf)> {
        let plain = trie::archive_path(&self.root, id, "xml")?;
        let mut gz = plain.clone();
        gz.set_file_name(format!("{}.gz", plain.file_name().unwrap().to_string_lossy()));
        Ok((plain, gz))
    }

    fn resolve_existing(&self, id: &str) -> Result<Option<(PathBuf, bool)>> {
        let (plain, gz) = self.candidate_paths(id)?;
        if gz.exists() {
            Ok(Some((gz, true)))
        } else if plain.exists() {
            Ok(Some((plain, false)))
        } else {
            Ok(None)
        }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.resolve_existing(id)?.is_some())
    }

    /// Write `bytes` under `id`, atomically: write to `path.tmp`, then
    /// rename onto `path`. Always followed by clearing this id's increment
    /// entries, so the next index build sees STALE fragments and rewrites
    /// them (spec. 4.4, 4.7).
    pub fn stash(&self, id: &str, bytes: &[u8]) -> Result<StashOutcome> {
        let previous = match self.resolve_existing(id)? {
            Some((path, was_gz)) => {
                let raw = err_at!(IOError, fs::read(&path))?;
                Some(if was_gz { gunzip(&raw)? } else { raw })
            }
            None => None,
        };

        let record = match &self.boilerplate {
            Some(prefix) => {
                let mut full = prefix.clone().into_bytes();
                full.extend_from_slice(bytes);
                full
            }
            None => bytes.to_vec(),
        };

        let (plain, gz) = self.candidate_paths(id)?;
        let target = if self.gzip { &gz } else { &plain };
        if let Some(parent) = target.parent() {
            err_at!(IOError, fs::create_dir_all(parent))?;
        }

        let payload = if self.gzip { gzip(&record)? } else { record.clone() };
        let tmp = target.with_extension(format!(
            "{}.tmp",
            target.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default()
        ));
        err_at!(IOError, fs::write(&tmp, &payload))?;
        err_at!(IOError, fs::rename(&tmp, target))?;

        // Stashing under the opposite compression setting than last time
        // leaves a stale sibling file behind; remove it so `exists`/`fetch`
        // never see two candidates for the same id.
        let stale = if self.gzip { &plain } else { &gz };
        if stale.exists() {
            err_at!(IOError, fs::remove_file(stale))?;
        }

        self.increment.clear(id)?;

        Ok(match previous {
            None => StashOutcome::Created,
            Some(prev) if prev == record => StashOutcome::Unchanged,
            Some(_) => StashOutcome::Replaced,
        })
    }

    /// Fetch and transparently decompress the record for `id`.
    pub fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        match self.resolve_existing(id)? {
            Some((path, is_gz)) => {
                let raw = err_at!(IOError, fs::read(&path))?;
                if is_gz {
                    gunzip(&raw)
                } else {
                    Ok(raw)
                }
            }
            None => err_at!(NotFound, msg: "no archive entry for id {}", id),
        }
    }

    /// Return the on-disk bytes verbatim, never decompressing.
    pub fn stream(&self, id: &str) -> Result<Vec<u8>> {
        match self.resolve_existing(id)? {
            Some((path, _)) => err_at!(IOError, fs::read(&path)),
            None => err_at!(NotFound, msg: "no archive entry for id {}", id),
        }
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let (plain, gz) = self.candidate_paths(id)?;
        let mut found = false;
        for path in [&plain, &gz] {
            if path.exists() {
                err_at!(IOError, fs::remove_file(path))?;
                found = true;
            }
        }
        self.increment.clear(id)?;
        if !found {
            return err_at!(NotFound, msg: "no archive entry for id {}", id);
        }
        Ok(())
    }

    /// IEEE CRC-32 of the decompressed record bytes.
    pub fn hash(&self, id: &str) -> Result<u32> {
        Ok(util::crc32(&self.fetch(id)?))
    }

    /// Subset of `ids` whose archive file is absent.
    pub fn missing<'a, I: IntoIterator<Item = &'a str>>(&self, ids: I) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for id in ids {
            if !self.exists(id)? {
                out.push(id.to_string());
            }
        }
        Ok(out)
    }

    pub fn increment_log(&self) -> &IncrementLog {
        &self.increment
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    err_at!(IOError, enc.write_all(bytes))?;
    err_at!(IOError, enc.finish())
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut dec = GzDecoder::new(bytes);
    let mut out = Vec::new();
    err_at!(IOError, dec.read_to_end(&mut out))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(gzip: bool) -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("archive"), dir.path().join("incr"), gzip);
        (dir, archive)
    }

    #[test]
    fn test_stash_fetch_round_trip() {
        let (_dir, archive) = archive(false);
        let outcome = archive.stash("7", b"<R><I>7</I></R>").unwrap();
        assert_eq!(outcome, StashOutcome::Created);
        assert_eq!(archive.fetch("7").unwrap(), b"<R><I>7</I></R>");
        assert!(archive.fetch("8").is_err());
    }

    #[test]
    fn test_restash_reports_replaced_or_unchanged() {
        let (_dir, archive) = archive(false);
        archive.stash("7", b"v1").unwrap();
        assert_eq!(archive.stash("7", b"v2").unwrap(), StashOutcome::Replaced);
        assert_eq!(archive.stash("7", b"v2").unwrap(), StashOutcome::Unchanged);
    }

    #[test]
    fn test_gzip_round_trip() {
        let (_dir, archive) = archive(true);
        archive.stash("7", b"hello world").unwrap();
        assert_eq!(archive.fetch("7").unwrap(), b"hello world");
        // stream() must not decompress
        assert_ne!(archive.stream("7").unwrap(), b"hello world");
    }

    #[test]
    fn test_delete_clears_increment_entries() {
        let (_dir, archive) = archive(false);
        archive.stash("7", b"v1").unwrap();
        archive.increment_log().mark("7", "title").unwrap();
        assert!(archive.increment_log().is_indexed("7", "title").unwrap());

        archive.delete("7").unwrap();
        assert!(!archive.exists("7").unwrap());
        assert!(!archive.increment_log().is_indexed("7", "title").unwrap());
    }

    #[test]
    fn test_stash_prepends_boilerplate_when_configured() {
        let (_dir, archive) = archive(false);
        let archive = archive.with_boilerplate(Some("<!DOCTYPE MedlineCitationSet>"));
        archive.stash("7", b"<R><I>7</I></R>").unwrap();
        let fetched = archive.fetch("7").unwrap();
        let text = String::from_utf8(fetched).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<!DOCTYPE MedlineCitationSet>"));
        assert!(text.ends_with("<R><I>7</I></R>"));
    }

    #[test]
    fn test_missing_reports_absent_ids() {
        let (_dir, archive) = archive(false);
        archive.stash("7", b"v").unwrap();
        let missing = archive.missing(["7", "8", "9"]).unwrap();
        assert_eq!(missing, vec!["8".to_string(), "9".to_string()]);
    }
}
