//! The inverter (spec. 4.5): reads per-record `<IdxDocument>` fragments and
//! buckets them by term, producing one `<InvDocument>` per term with
//! postings sorted by id.

use std::collections::BTreeMap;

use crate::index::IdxDocument;

/// `{ field, term, postings: [(id, [position, ...])] }`, canonically sorted
/// by id within a term via the `BTreeMap` key. `field` is carried all the
/// way to the promoted postings path (spec. 6: `<root>/<field>/<c>/<c>/<c>/
/// <c>/<term>`) so a `[FIELD]` query restriction is a real filter, not just
/// parsed and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvDocument {
    pub field: String,
    pub term: String,
    pub postings: BTreeMap<String, Vec<u32>>,
}

impl InvDocument {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> InvDocument {
        InvDocument { field: field.into(), term: term.into(), postings: BTreeMap::new() }
    }

    /// Merges `other`'s postings into `self`; a duplicate `(field, term, id)`
    /// triple has its position sets unioned, per the merger's associativity
    /// requirement (spec. 4.5, 8).
    pub fn merge_from(&mut self, other: &InvDocument) {
        debug_assert_eq!(self.field, other.field);
        debug_assert_eq!(self.term, other.term);
        for (id, positions) in &other.postings {
            let entry = self.postings.entry(id.clone()).or_default();
            for &p in positions {
                if !entry.contains(&p) {
                    entry.push(p);
                }
            }
            entry.sort_unstable();
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = format!(
            "<InvDocument field=\"{}\"><term>{}</term>",
            escape(&self.field),
            escape(&self.term)
        );
        for (id, positions) in &self.postings {
            let pos = positions.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
            out.push_str(&format!("<post id=\"{}\" pos=\"{}\"/>", escape(id), pos));
        }
        out.push_str("</InvDocument>");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// The prefix a term is sharded on for "distribution sort" (spec. 4.5): the
/// first 2-4 characters, clamped to what the term actually has.
pub fn shard_prefix(term: &str, width: usize) -> String {
    term.chars().take(width).collect()
}

/// Inverts one record's index fragments: every `(field, term, position)`
/// triple becomes one posting for that id, keyed separately per field so a
/// later `[FIELD]` query restriction has something real to filter on.
pub fn invert(id: &str, docs: &[IdxDocument]) -> Vec<InvDocument> {
    let mut by_key: BTreeMap<(String, String), InvDocument> = BTreeMap::new();
    for doc in docs {
        for (term, positions) in &doc.terms {
            let key = (doc.field.clone(), term.clone());
            let inv = by_key
                .entry(key)
                .or_insert_with(|| InvDocument::new(doc.field.clone(), term.clone()));
            inv.postings.entry(id.to_string()).or_default().extend(positions.iter().copied());
        }
    }
    for inv in by_key.values_mut() {
        for positions in inv.postings.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
    }
    by_key.into_values().collect()
}

/// Buckets a batch of `InvDocument`s by shard prefix, the unit the merger
/// later consumes independently (spec. 4.5: "writing per-term accumulators
/// keyed by first 2-4 characters of the term").
pub fn shard(docs: Vec<InvDocument>, width: usize) -> BTreeMap<String, Vec<InvDocument>> {
    let mut shards: BTreeMap<String, Vec<InvDocument>> = BTreeMap::new();
    for doc in docs {
        let prefix = shard_prefix(&doc.term, width);
        shards.entry(prefix).or_default().push(doc);
    }
    shards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IdxDocument;

    fn idx(id: &str, field: &str, terms: &[(&str, &[u32])]) -> IdxDocument {
        let mut doc = IdxDocument::new(id, field);
        for (term, positions) in terms {
            for &p in *positions {
                doc.push(term.to_string(), p);
            }
        }
        doc
    }

    #[test]
    fn test_invert_buckets_by_term_sorted() {
        let docs = vec![idx("7", "title", &[("zebra", &[1]), ("apple", &[2])])];
        let inverted = invert("7", &docs);
        let terms: Vec<&str> = inverted.iter().map(|d| d.term.as_str()).collect();
        assert_eq!(terms, vec!["apple", "zebra"]);
    }

    #[test]
    fn test_invert_keeps_same_term_in_different_fields_separate() {
        let docs = vec![
            idx("7", "title", &[("cancer", &[1])]),
            idx("7", "abstract", &[("cancer", &[4])]),
        ];
        let inverted = invert("7", &docs);
        assert_eq!(inverted.len(), 2);
        assert!(inverted.iter().any(|d| d.field == "title" && d.term == "cancer"));
        assert!(inverted.iter().any(|d| d.field == "abstract" && d.term == "cancer"));
    }

    #[test]
    fn test_merge_from_unions_positions() {
        let mut a = InvDocument::new("title", "cell");
        a.postings.insert("7".to_string(), vec![1, 3]);
        let mut b = InvDocument::new("title", "cell");
        b.postings.insert("7".to_string(), vec![3, 5]);
        a.merge_from(&b);
        assert_eq!(a.postings.get("7").unwrap(), &vec![1, 3, 5]);
    }

    #[test]
    fn test_shard_groups_by_prefix() {
        let docs = vec![
            InvDocument::new("title", "cell"),
            InvDocument::new("title", "cellular"),
            InvDocument::new("title", "dna"),
        ];
        let shards = shard(docs, 3);
        assert_eq!(shards.get("cel").unwrap().len(), 2);
        assert_eq!(shards.get("dna").unwrap().len(), 1);
    }
}
