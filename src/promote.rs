//! The promoter (spec. 4.5): writes the merged inverted stream out as
//! term-addressed postings files, plus a term-totals (document-frequency)
//! index. A flush failure for one term aborts only that term.

use std::{collections::BTreeMap, fs, path::Path};

use log::warn;

use crate::{err_at, invert::InvDocument, postings, postings::PostingList, Error, Result};

#[derive(Debug, Default)]
pub struct PromoteTally {
    pub promoted: usize,
    pub failed: Vec<String>,
}

/// Promotes every `InvDocument` in the merged stream, then writes a
/// `field\tterm\tdocument_frequency\n` totals file at `root/totals.tsv`.
///
/// Per spec. 4.5 failure semantics: an I/O error flushing one term is
/// logged and that term is skipped; the pass as a whole still completes.
pub fn promote(root: &Path, docs: &[InvDocument]) -> Result<PromoteTally> {
    let mut tally = PromoteTally::default();
    let mut totals: BTreeMap<(String, String), usize> = BTreeMap::new();

    for doc in docs {
        let list = PostingList { entries: doc.postings.clone().into_iter().collect() };
        match postings::write(root, &doc.field, &doc.term, &list) {
            Ok(()) => {
                totals.insert((doc.field.clone(), doc.term.clone()), list.document_frequency());
                tally.promoted += 1;
            }
            Err(err) => {
                warn!("promote: failed to flush {}/{:?}: {}", doc.field, doc.term, err);
                tally.failed.push(format!("{}/{}", doc.field, doc.term));
            }
        }
    }

    write_totals(root, &totals)?;
    Ok(tally)
}

fn write_totals(root: &Path, totals: &BTreeMap<(String, String), usize>) -> Result<()> {
    err_at!(IOError, fs::create_dir_all(root))?;
    let mut body = String::new();
    for ((field, term), freq) in totals {
        body.push_str(&format!("{}\t{}\t{}\n", field, term, freq));
    }
    let path = root.join("totals.tsv");
    let tmp = root.join("totals.tsv.tmp");
    err_at!(IOError, fs::write(&tmp, body))?;
    err_at!(IOError, fs::rename(&tmp, &path))?;
    Ok(())
}

/// Reads `root/totals.tsv`, keyed by `(field, term)`.
pub fn read_totals(root: &Path) -> Result<BTreeMap<(String, String), usize>> {
    let path = root.join("totals.tsv");
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let body = err_at!(IOError, fs::read_to_string(&path))?;
    let mut totals = BTreeMap::new();
    for line in body.lines() {
        let mut parts = line.splitn(3, '\t');
        if let (Some(field), Some(term), Some(freq)) = (parts.next(), parts.next(), parts.next()) {
            if let Ok(freq) = freq.parse() {
                totals.insert((field.to_string(), term.to_string()), freq);
            }
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(field: &str, term: &str, id: &str, positions: &[u32]) -> InvDocument {
        let mut d = InvDocument::new(field, term);
        d.postings.insert(id.to_string(), positions.to_vec());
        d
    }

    #[test]
    fn test_promote_writes_postings_and_totals() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![doc("title", "cell", "1", &[1, 2]), doc("title", "dna", "1", &[3])];
        let tally = promote(dir.path(), &docs).unwrap();
        assert_eq!(tally.promoted, 2);
        assert!(postings::exists(dir.path(), "title", "cell"));

        let totals = read_totals(dir.path()).unwrap();
        assert_eq!(totals.get(&("title".to_string(), "cell".to_string())), Some(&1));
        assert_eq!(totals.get(&("title".to_string(), "dna".to_string())), Some(&1));
    }

    #[test]
    fn test_totals_keeps_same_term_in_different_fields_separate() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![doc("title", "cell", "1", &[1]), doc("abstract", "cell", "2", &[2])];
        promote(dir.path(), &docs).unwrap();
        let totals = read_totals(dir.path()).unwrap();
        assert_eq!(totals.get(&("title".to_string(), "cell".to_string())), Some(&1));
        assert_eq!(totals.get(&("abstract".to_string(), "cell".to_string())), Some(&1));
    }
}
