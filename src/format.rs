//! Format helpers (spec. 2): head/tail/wrap boilerplate shared by every sink
//! that writes an XML set document (`<IdxDocumentSet>`, `<InvDocumentSet>`,
//! archive boilerplate prepended ahead of a stashed record).

/// XML declaration plus an opening root tag, e.g. `wrap_head("IdxDocumentSet")`.
pub fn wrap_head(root: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<{}>\n", root)
}

pub fn wrap_tail(root: &str) -> String {
    format!("</{}>\n", root)
}

/// Wraps a sequence of already-rendered XML fragments in `<root>...</root>`,
/// one per line, preceded by the standard declaration.
pub fn wrap_set<'a, I: IntoIterator<Item = &'a str>>(root: &str, fragments: I) -> String {
    let mut out = wrap_head(root);
    for fragment in fragments {
        out.push_str(fragment);
        out.push('\n');
    }
    out.push_str(&wrap_tail(root));
    out
}

/// The per-database boilerplate optionally prepended to a stashed record
/// (spec. 4.4: "Optionally prepend a per-database XML/DOCTYPE boilerplate").
pub fn record_boilerplate(doctype: Option<&str>) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n");
    if let Some(doctype) = doctype {
        out.push_str(doctype);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_set_encloses_fragments() {
        let xml = wrap_set("IdxDocumentSet", ["<IdxDocument/>", "<IdxDocument/>"]);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<IdxDocumentSet>"));
        assert!(xml.trim_end().ends_with("</IdxDocumentSet>"));
        assert_eq!(xml.matches("<IdxDocument/>").count(), 2);
    }

    #[test]
    fn test_record_boilerplate_includes_doctype_when_given() {
        let with = record_boilerplate(Some("<!DOCTYPE MedlineCitationSet>"));
        assert!(with.contains("DOCTYPE"));
        let without = record_boilerplate(None);
        assert!(!without.contains("DOCTYPE"));
    }
}
