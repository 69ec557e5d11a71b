//! Deterministic record-id -> path function (spec. 3, 4.4), plus the
//! term-addressed trie used by the postings store (spec. 4.5, 9).
//!
//! Numeric ids are zero-padded to 8 digits and split into four 2-digit
//! directory components, `"12/34/56/78"`, with the unpadded id as the leaf
//! filename. Non-numeric ids are routed through the same 2-char-per-level
//! shape by hashing their leading characters instead of splitting digits —
//! collisions are accepted per spec. 9 (Open question): no resolution is
//! required for the numeric case, and the non-numeric case is a secondary
//! path never used for PubMed's own identifiers.

use std::path::PathBuf;

use crate::{err_at, Error, Result};

const PAD_WIDTH: usize = 8;
const LEVELS: usize = 4;

/// Strips a trailing `.N` version suffix, per spec. 3/6.
pub fn strip_version(id: &str) -> &str {
    match id.rfind('.') {
        Some(dot) if id[dot + 1..].chars().all(|c| c.is_ascii_digit()) && dot + 1 < id.len() => {
            &id[..dot]
        }
        _ => id,
    }
}

fn is_numeric(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// `trie(id)`: directory components only, not including the leaf filename.
pub fn trie_dirs(id: &str) -> Result<Vec<String>> {
    if id.is_empty() {
        return err_at!(InvalidInput, msg: "empty record id");
    }
    if is_numeric(id) {
        Ok(numeric_dirs(id))
    } else {
        Ok(hashed_dirs(id))
    }
}

fn numeric_dirs(id: &str) -> Vec<String> {
    let padded = format!("{:0>width$}", id, width = PAD_WIDTH);
    // Use the last PAD_WIDTH digits: ids longer than 8 digits still produce
    // a fixed-depth path, with their high-order digits folded in.
    let digits: Vec<char> = padded.chars().rev().take(PAD_WIDTH).collect();
    let padded: String = digits.into_iter().rev().collect();
    padded
        .as_bytes()
        .chunks(2)
        .take(LEVELS)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect()
}

fn hashed_dirs(id: &str) -> Vec<String> {
    let hash = crate::util::crc32(id.as_bytes());
    hash.to_be_bytes().iter().take(LEVELS).map(|b| format!("{:02x}", b)).collect()
}

/// Full archive path for `id` under `root`, including the leaf filename
/// (unpadded id) and `suffix` (e.g. `"xml"`, `"e2x"`).
pub fn archive_path(root: &std::path::Path, id: &str, suffix: &str) -> Result<PathBuf> {
    let id = strip_version(id);
    let mut path = root.to_path_buf();
    for comp in trie_dirs(id)? {
        path.push(comp);
    }
    path.push(format!("{}.{}", id, suffix));
    Ok(path)
}

/// Number of literal-character directory levels in the term trie (spec. 4.5:
/// "2-to-4-character prefix directories"; spec. 6's layout row spells it out
/// one level per character, `<root>/<field>/<c>/<c>/<c>/<c>/<term>`).
const TERM_LEVELS: usize = 4;

/// Term-addressed path for the postings trie: `<root>/<field>/<c>/<c>/<c>/<c>/
/// <term>.<suffix>` (spec. 4.5, 6). Unlike record ids, terms are routed by
/// their own literal leading characters, not a hash — that is what lets
/// `expand_prefix`-style prefix queries enumerate one bucket instead of
/// scanning every term. A term shorter than `TERM_LEVELS` characters simply
/// uses fewer directory levels, matching "2-to-4-character prefix".
pub fn term_path(root: &std::path::Path, field: &str, term: &str, suffix: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.push(sanitize_component(field));
    for ch in term.chars().take(TERM_LEVELS) {
        path.push(sanitize_component(&ch.to_string()));
    }
    path.push(format!("{}.{}", sanitize_component(term), suffix));
    path
}

/// Filesystem-safe path component: non-alphanumeric bytes other than `-`/`_`
/// are percent-escaped so a field name, a term's prefix character, or a term
/// leaf filename can never collide with the trie's own directory separators.
fn sanitize_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02x}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_padding_and_split() {
        let dirs = numeric_dirs("42");
        assert_eq!(dirs, vec!["00", "00", "00", "42"]);
    }

    #[test]
    fn test_strip_version_suffix() {
        assert_eq!(strip_version("123456.2"), "123456");
        assert_eq!(strip_version("123456"), "123456");
        assert_eq!(strip_version("PMC123.v1"), "PMC123");
    }

    #[test]
    fn test_archive_path_shape() {
        let root = std::path::Path::new("/archive");
        let path = archive_path(root, "7", "xml").unwrap();
        assert_eq!(path, std::path::PathBuf::from("/archive/00/00/00/07/7.xml"));
    }

    #[test]
    fn test_term_path_is_stable_and_sanitized() {
        let root = std::path::Path::new("/postings");
        let a = term_path(root, "title", "cell's", "pst");
        let b = term_path(root, "title", "cell's", "pst");
        assert_eq!(a, b);
        assert!(a.to_string_lossy().contains("%27"));
    }

    #[test]
    fn test_term_path_uses_literal_prefix_not_a_hash() {
        let root = std::path::Path::new("/postings");
        let path = term_path(root, "title", "cellular", "pst");
        let expect = std::path::PathBuf::from("/postings/title/c/e/l/l/cellular.pst");
        assert_eq!(path, expect);
    }

    #[test]
    fn test_term_path_short_term_uses_fewer_levels() {
        let root = std::path::Path::new("/postings");
        let path = term_path(root, "title", "rna", "pst");
        let expect = std::path::PathBuf::from("/postings/title/r/n/a/rna.pst");
        assert_eq!(path, expect);
    }

    #[test]
    fn test_non_numeric_id_is_deterministic() {
        let a = trie_dirs("PMC998877").unwrap();
        let b = trie_dirs("PMC998877").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), LEVELS);
    }
}
