//! On-disk postings file format (spec. 4.5, 9): one file per term, packed
//! `(id, [positions])` lists with delta-gap varint encoding, addressed by a
//! trie on the term (spec. 4.4 shape, mirrored via [crate::archive::trie]).

use std::{fs, path::Path};

use crate::{archive::trie, err_at, util, Error, Result};

/// One term's postings, decoded into memory: ids ascending, each with its
/// ascending position list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostingList {
    pub entries: Vec<(String, Vec<u32>)>,
}

impl PostingList {
    pub fn document_frequency(&self) -> usize {
        self.entries.len()
    }

    /// Packs into delta-gap varints: ids are stored as gaps from the
    /// previous id's numeric value (falling back to 0 for non-numeric ids,
    /// so the byte length stays bounded); each position list is stored as
    /// gaps from the previous position, starting from 0.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        util::encode_varint(self.entries.len() as u64, &mut out);
        let mut prev_id: u64 = 0;
        for (id, positions) in &self.entries {
            let numeric_id = id.parse::<u64>().unwrap_or(0);
            let gap = numeric_id.saturating_sub(prev_id);
            util::encode_varint(gap, &mut out);
            prev_id = numeric_id;

            let id_bytes = id.as_bytes();
            util::encode_varint(id_bytes.len() as u64, &mut out);
            out.extend_from_slice(id_bytes);

            util::encode_varint(positions.len() as u64, &mut out);
            let mut prev_pos = 0u32;
            for &pos in positions {
                util::encode_varint((pos - prev_pos) as u64, &mut out);
                prev_pos = pos;
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<PostingList> {
        let (count, mut offset) = read_varint(buf)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (_gap, used) = read_varint(&buf[offset..])?;
            offset += used;

            let (id_len, used) = read_varint(&buf[offset..])?;
            offset += used;
            let id_bytes = buf.get(offset..offset + id_len as usize).ok_or_else(|| {
                truncated("postings id")
            })?;
            let id = err_at!(DecodeFail, String::from_utf8(id_bytes.to_vec()))?;
            offset += id_len as usize;

            let (pos_count, used) = read_varint(&buf[offset..])?;
            offset += used;
            let mut positions = Vec::with_capacity(pos_count as usize);
            let mut prev_pos = 0u32;
            for _ in 0..pos_count {
                let (gap, used) = read_varint(&buf[offset..])?;
                offset += used;
                prev_pos += gap as u32;
                positions.push(prev_pos);
            }
            entries.push((id, positions));
        }
        Ok(PostingList { entries })
    }
}

fn read_varint(buf: &[u8]) -> Result<(u64, usize)> {
    util::decode_varint(buf).ok_or_else(|| truncated("postings varint"))
}

fn truncated(what: &str) -> Error {
    Error::DecodeFail("postings".to_string(), format!("truncated {}", what))
}

/// Where a term's postings file lives under `root`, scoped to `field`
/// (spec. 6: `<root>/<field>/<c>/<c>/<c>/<c>/<term>`).
pub fn path_for(root: &Path, field: &str, term: &str) -> std::path::PathBuf {
    trie::term_path(root, field, term, "pst")
}

pub fn write(root: &Path, field: &str, term: &str, list: &PostingList) -> Result<()> {
    let path = path_for(root, field, term);
    if let Some(parent) = path.parent() {
        err_at!(IOError, fs::create_dir_all(parent))?;
    }
    let tmp = path.with_extension("pst.tmp");
    err_at!(IOError, fs::write(&tmp, list.encode()))?;
    err_at!(IOError, fs::rename(&tmp, &path))?;
    Ok(())
}

pub fn read(root: &Path, field: &str, term: &str) -> Result<PostingList> {
    let path = path_for(root, field, term);
    let bytes = err_at!(IOError, fs::read(&path))?;
    PostingList::decode(&bytes)
}

pub fn exists(root: &Path, field: &str, term: &str) -> bool {
    path_for(root, field, term).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let list = PostingList {
            entries: vec![
                ("7".to_string(), vec![1, 3, 9]),
                ("42".to_string(), vec![2]),
            ],
        };
        let decoded = PostingList::decode(&list.encode()).unwrap();
        assert_eq!(list, decoded);
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let list = PostingList { entries: vec![("1".to_string(), vec![5, 6])] };
        write(dir.path(), "title", "cell", &list).unwrap();
        assert!(exists(dir.path(), "title", "cell"));
        let read_back = read(dir.path(), "title", "cell").unwrap();
        assert_eq!(list, read_back);
    }

    #[test]
    fn test_same_term_in_different_fields_does_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let title = PostingList { entries: vec![("1".to_string(), vec![1])] };
        let abs = PostingList { entries: vec![("2".to_string(), vec![2])] };
        write(dir.path(), "title", "cell", &title).unwrap();
        write(dir.path(), "abstract", "cell", &abs).unwrap();
        assert_eq!(read(dir.path(), "title", "cell").unwrap(), title);
        assert_eq!(read(dir.path(), "abstract", "cell").unwrap(), abs);
    }

    #[test]
    fn test_document_frequency() {
        let list = PostingList {
            entries: vec![("1".to_string(), vec![1]), ("2".to_string(), vec![1])],
        };
        assert_eq!(list.document_frequency(), 2);
    }
}
