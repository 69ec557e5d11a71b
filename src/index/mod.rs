//! The indexer (spec. 4.5): turns extracted field text into per-record
//! `<IdxDocument>` fragments, applying the normalization/stemming transform
//! table described in spec. 5 and 9.

pub mod fragment;
pub mod normalize;
pub mod stemmer;
pub mod stopwords;

use crate::{archive::Archive, err_at, Error, Result};
pub use fragment::IdxDocument;

/// The immutable transform table (spec. 5: "immutable after initialization
/// and safely shared read-only"). Each toggle mirrors a spec. 4.5 step.
#[derive(Debug, Clone, Copy)]
pub struct IndexerConfig {
    pub strip_accents: bool,
    pub ascii_fold: bool,
    pub drop_stopwords: bool,
    pub stem: bool,
}

impl Default for IndexerConfig {
    fn default() -> IndexerConfig {
        IndexerConfig { strip_accents: true, ascii_fold: false, drop_stopwords: true, stem: true }
    }
}

/// Splits `text` into words on runs of non-alphanumeric characters, keeping
/// internal hyphens and apostrophes attached (e.g. `"T-cell"`, `"patient's"`).
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let bytes = text.as_bytes();
    let mut start: Option<usize> = None;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (idx, (byte_pos, ch)) in chars.iter().enumerate() {
        let is_word_char = ch.is_alphanumeric()
            || ((*ch == '-' || *ch == '\'')
                && start.is_some()
                && idx + 1 < chars.len()
                && chars[idx + 1].1.is_alphanumeric());
        match (is_word_char, start) {
            (true, None) => start = Some(*byte_pos),
            (false, Some(s)) => {
                words.push(&text[s..*byte_pos]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(&text[s..bytes.len()]);
    }
    words
}

/// Applies the transform table to one raw word, producing the indexed term
/// or `None` if the word is dropped as a stop word.
pub fn transform(word: &str, config: &IndexerConfig) -> Option<String> {
    let mut term = normalize::fold(word, config.strip_accents);
    if config.ascii_fold {
        term = normalize::ascii_fold(&term);
    }
    if term.is_empty() {
        return None;
    }
    if config.drop_stopwords && stopwords::is_stopword(&term) {
        return None;
    }
    if config.stem {
        term = stemmer::stem(&term);
    }
    if term.is_empty() {
        None
    } else {
        Some(term)
    }
}

/// Builds the `<IdxDocument>` for one `(id, field, text)` triple.
pub fn index_field(id: &str, field: &str, text: &str, config: &IndexerConfig) -> IdxDocument {
    let mut doc = IdxDocument::new(id, field);
    for (position, word) in split_words(text).into_iter().enumerate() {
        if let Some(term) = transform(word, config) {
            doc.push(term, (position + 1) as u32);
        }
    }
    doc
}

/// Indexes every `(field, text)` pair for `id`, refusing to emit anything if
/// `id`'s archive entry does not exist (spec. 4.7 invariant).
pub fn index_record(
    archive: &Archive,
    id: &str,
    fields: &[(String, String)],
    config: &IndexerConfig,
) -> Result<Vec<IdxDocument>> {
    if !archive.exists(id)? {
        return err_at!(NotFound, msg: "refusing to index {}: no archive entry", id);
    }
    let mut docs = Vec::with_capacity(fields.len());
    for (field, text) in fields {
        let doc = index_field(id, field, text, config);
        if !doc.terms.is_empty() {
            docs.push(doc);
        }
        archive.increment_log().mark(id, field)?;
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_keeps_hyphenated_terms() {
        let words = split_words("T-cell response, 2021's peak.");
        assert_eq!(words, vec!["T-cell", "response", "2021's", "peak"]);
    }

    #[test]
    fn test_transform_drops_stopwords_and_stems() {
        let config = IndexerConfig::default();
        assert_eq!(transform("the", &config), None);
        assert_eq!(transform("Running", &config), Some("run".to_string()));
    }

    #[test]
    fn test_index_field_assigns_one_based_positions() {
        let doc = index_field("7", "title", "cats and dogs", &IndexerConfig {
            drop_stopwords: false,
            stem: false,
            ..IndexerConfig::default()
        });
        assert_eq!(doc.terms.get("cats").unwrap(), &vec![1]);
        assert_eq!(doc.terms.get("dogs").unwrap(), &vec![3]);
    }

    #[test]
    fn test_index_record_refuses_without_archive_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("a"), dir.path().join("i"), false);
        let err = index_record(&archive, "7", &[("title".into(), "hello".into())], &IndexerConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_index_record_marks_increment_log() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("a"), dir.path().join("i"), false);
        archive.stash("7", b"<R/>").unwrap();
        let docs = index_record(
            &archive,
            "7",
            &[("title".to_string(), "cats and dogs".to_string())],
            &IndexerConfig::default(),
        )
        .unwrap();
        assert_eq!(docs.len(), 1);
        assert!(archive.increment_log().is_indexed("7", "title").unwrap());
    }
}
