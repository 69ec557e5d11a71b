//! The per-record index fragment data model and its `<IdxDocument>` XML
//! rendering (spec. 3, 4.5).

use std::collections::BTreeMap;

/// `{ id, terms: [(term, [position, ...])] }`. The `BTreeMap` keeps terms
/// sorted, matching the "sorted by term within document" requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxDocument {
    pub id: String,
    pub field: String,
    pub terms: BTreeMap<String, Vec<u32>>,
}

impl IdxDocument {
    pub fn new(id: impl Into<String>, field: impl Into<String>) -> IdxDocument {
        IdxDocument { id: id.into(), field: field.into(), terms: BTreeMap::new() }
    }

    pub fn push(&mut self, term: String, position: u32) {
        self.terms.entry(term).or_default().push(position);
    }

    /// Renders `<IdxDocument id=".." field="..">...</IdxDocument>`.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "<IdxDocument id=\"{}\" field=\"{}\">",
            escape(&self.id),
            escape(&self.field)
        ));
        for (term, positions) in &self.terms {
            let pos = positions.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
            out.push_str(&format!(
                "<term pos=\"{}\">{}</term>",
                pos,
                escape(term)
            ));
        }
        out.push_str("</IdxDocument>");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_xml_sorted_by_term() {
        let mut doc = IdxDocument::new("42", "title");
        doc.push("zebra".to_string(), 3);
        doc.push("apple".to_string(), 1);
        doc.push("apple".to_string(), 5);
        let xml = doc.to_xml();
        assert!(xml.find("apple").unwrap() < xml.find("zebra").unwrap());
        assert!(xml.contains("<term pos=\"1,5\">apple</term>"));
    }
}
