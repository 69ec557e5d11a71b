//! The merger/fuser (spec. 4.5): combines many prefix-sharded inverted
//! fragments from different input shards into one canonical `InvDocument`
//! per term. Associative and commutative, so shards may be merged pairwise
//! in any order (spec. 8 testable property).

use std::collections::BTreeMap;

use crate::invert::InvDocument;

/// Merges any number of `InvDocument` batches — typically one batch per
/// input shard sharing a prefix — into one sorted-by-(field,term),
/// sorted-by-id canonical sequence.
pub fn merge<I: IntoIterator<Item = Vec<InvDocument>>>(batches: I) -> Vec<InvDocument> {
    let mut by_key: BTreeMap<(String, String), InvDocument> = BTreeMap::new();
    for batch in batches {
        for doc in batch {
            let key = (doc.field.clone(), doc.term.clone());
            by_key.entry(key).and_modify(|existing| existing.merge_from(&doc)).or_insert(doc);
        }
    }
    by_key.into_values().collect()
}

/// Merges two already-merged results; used to fold shard outputs together
/// two at a time, demonstrating the associativity spec. 8 calls out.
pub fn merge_pair(a: Vec<InvDocument>, b: Vec<InvDocument>) -> Vec<InvDocument> {
    merge([a, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(term: &str, id: &str, positions: &[u32]) -> InvDocument {
        let mut d = InvDocument::new("title", term);
        d.postings.insert(id.to_string(), positions.to_vec());
        d
    }

    #[test]
    fn test_merge_unions_duplicate_term_id_pairs() {
        let shard_a = vec![doc("cell", "7", &[1, 2])];
        let shard_b = vec![doc("cell", "7", &[2, 4]), doc("dna", "9", &[1])];
        let merged = merge([shard_a, shard_b]);

        let cell = merged.iter().find(|d| d.term == "cell").unwrap();
        assert_eq!(cell.postings.get("7").unwrap(), &vec![1, 2, 4]);
        assert!(merged.iter().any(|d| d.term == "dna"));
    }

    #[test]
    fn test_merge_is_associative() {
        let a = vec![doc("cell", "1", &[1])];
        let b = vec![doc("cell", "2", &[2])];
        let c = vec![doc("cell", "3", &[3])];

        let left = merge_pair(merge_pair(a.clone(), b.clone()), c.clone());
        let right = merge_pair(a, merge_pair(b, c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_output_sorted_by_term() {
        let merged = merge([vec![doc("zebra", "1", &[1]), doc("apple", "2", &[1])]]);
        let terms: Vec<&str> = merged.iter().map(|d| d.term.as_str()).collect();
        assert_eq!(terms, vec!["apple", "zebra"]);
    }

    #[test]
    fn test_merge_keeps_same_term_in_different_fields_separate() {
        let mut title_cell = InvDocument::new("title", "cell");
        title_cell.postings.insert("7".to_string(), vec![1]);
        let mut abstract_cell = InvDocument::new("abstract", "cell");
        abstract_cell.postings.insert("7".to_string(), vec![9]);

        let merged = merge([vec![title_cell], vec![abstract_cell]]);
        assert_eq!(merged.len(), 2);
        let title = merged.iter().find(|d| d.field == "title").unwrap();
        let abs = merged.iter().find(|d| d.field == "abstract").unwrap();
        assert_eq!(title.postings.get("7").unwrap(), &vec![1]);
        assert_eq!(abs.postings.get("7").unwrap(), &vec![9]);
    }
}
