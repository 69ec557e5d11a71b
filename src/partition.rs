//! The partitioner (spec. 4.1): slices a tokenized XML stream into
//! record-sized substrings bounded by a configured pattern tag.

use std::io::Read;

use crate::{
    err_at,
    token::TokenKind,
    tokenizer::Tokenizer,
    Error, Result,
};

/// `-pattern Parent` selects every `<Parent>...</Parent>` span.
/// `-pattern Parent/*` (heterogeneous) selects every direct child of
/// `Parent`, tagging the record with the child's own name.
#[derive(Clone, Debug)]
pub enum Pattern {
    Named(String),
    ChildrenOf(String),
}

impl Pattern {
    pub fn parse(spec: &str) -> Pattern {
        match spec.strip_suffix("/*") {
            Some(parent) => Pattern::ChildrenOf(parent.to_string()),
            None => Pattern::Named(spec.to_string()),
        }
    }
}

/// One extracted record: its raw XML substring (including the bounding
/// tags) and the local tag name it was found under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub tag: String,
    pub text: String,
}

pub struct Partitioner<R> {
    tz: Tokenizer<R>,
    pattern: Pattern,
    turbo_fallback_logged: bool,
}

const NEXT_RECORD_SIZE_TAG: &str = "NEXT_RECORD_SIZE";

impl<R: Read> Partitioner<R> {
    pub fn new(inner: R, pattern: Pattern, block_size: usize) -> Partitioner<R> {
        Partitioner { tz: Tokenizer::new(inner, block_size), pattern, turbo_fallback_logged: false }
    }

    /// Returns the next record, or `None` at end of input. Turbo mode is
    /// entered transparently whenever a `<NEXT_RECORD_SIZE>` hint token
    /// appears between records; a size mismatch against the following
    /// record falls back to scan mode for the remainder of the stream
    /// (spec. 7, `Truncation`).
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        loop {
            let tok = self.tz.next_token()?;
            match tok.kind {
                TokenKind::IsClosed => return Ok(None),
                TokenKind::Start if tok.name == NEXT_RECORD_SIZE_TAG => {
                    match self.read_turbo_hint()? {
                        Some(n) => match self.try_turbo_record(n)? {
                            Some(rec) => return Ok(Some(rec)),
                            None => continue, // fell back to scan, keep looking
                        },
                        None => continue,
                    }
                }
                TokenKind::Start => {
                    let wanted = match &self.pattern {
                        Pattern::Named(name) => name == &tok.name,
                        Pattern::ChildrenOf(_) => false,
                    };
                    if wanted {
                        let name = tok.name.clone();
                        let text = self.scan_rest_of_element(&tok)?;
                        return Ok(Some(RawRecord { tag: name, text }));
                    }

                    if let Pattern::ChildrenOf(parent) = &self.pattern {
                        if parent == &tok.name {
                            // next start tag is a direct child record
                            let child = loop {
                                let t = self.tz.next_token()?;
                                match t.kind {
                                    TokenKind::Start => break Some(t),
                                    TokenKind::Stop if t.name == tok.name => break None,
                                    TokenKind::IsClosed => {
                                        return err_at!(
                                            MalformedInput,
                                            msg: "unclosed parent <{}>", tok.name
                                        );
                                    }
                                    _ => continue,
                                }
                            };
                            if let Some(child) = child {
                                let name = child.name.clone();
                                let text = self.scan_rest_of_element(&child)?;
                                return Ok(Some(RawRecord { tag: name, text }));
                            }
                        }
                    }
                }
                TokenKind::NotTag => {
                    return err_at!(MalformedInput, msg: "unrecognized construct {:?}", tok.text);
                }
                _ => continue,
            }
        }
    }

    fn read_turbo_hint(&mut self) -> Result<Option<u64>> {
        let text_tok = self.tz.next_token()?;
        let digits = match text_tok.kind {
            TokenKind::Content => text_tok.text,
            _ => return Ok(None),
        };
        let close = self.tz.next_token()?;
        if close.kind != TokenKind::Stop || close.name != NEXT_RECORD_SIZE_TAG {
            return err_at!(MalformedInput, msg: "malformed NEXT_RECORD_SIZE hint");
        }
        match digits.trim().parse::<u64>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => err_at!(MalformedInput, msg: "non-numeric NEXT_RECORD_SIZE {:?}", digits),
        }
    }

    /// Scans `<tag ...>`'s matching close tag, counting same-name nesting,
    /// and returns the full substring from the opening `<` to the closing
    /// `>` inclusive. `open` is the already-consumed opening `Start` token;
    /// its own attributes are re-rendered here via `render_start` so the
    /// record's bounding tag keeps them, the same as every nested tag does.
    fn scan_rest_of_element(&mut self, open: &crate::token::Token) -> Result<String> {
        let tag = open.name.clone();
        let mut depth = 1usize;
        let mut buf = render_start(open);

        loop {
            let tok = self.tz.next_token()?;
            match tok.kind {
                TokenKind::Start if tok.name == tag => {
                    depth += 1;
                    buf.push_str(&render_start(&tok));
                }
                TokenKind::Start => buf.push_str(&render_start(&tok)),
                TokenKind::SelfClose => buf.push_str(&render_self(&tok)),
                TokenKind::Stop if tok.name == tag => {
                    depth -= 1;
                    buf.push_str(&format!("</{}>", tok.name));
                    if depth == 0 {
                        return Ok(buf);
                    }
                }
                TokenKind::Stop => buf.push_str(&format!("</{}>", tok.name)),
                TokenKind::Content => buf.push_str(&tok.text),
                TokenKind::Cdata => {
                    buf.push_str("<![CDATA[");
                    buf.push_str(&tok.text);
                    buf.push_str("]]>");
                }
                TokenKind::Comment => {
                    buf.push_str("<!--");
                    buf.push_str(&tok.text);
                    buf.push_str("-->");
                }
                TokenKind::Doctype => {
                    buf.push_str(&tok.text);
                }
                TokenKind::Process => {
                    buf.push_str("<?");
                    buf.push_str(&tok.text);
                    buf.push_str("?>");
                }
                TokenKind::NotTag => {
                    return err_at!(MalformedInput, msg: "unrecognized construct inside <{}>", tag);
                }
                TokenKind::IsClosed => {
                    return err_at!(MalformedInput, msg: "unclosed record <{}>", tag);
                }
            }
        }
    }

    fn try_turbo_record(&mut self, n: u64) -> Result<Option<RawRecord>> {
        // The scan-mode tokenizer already buffers text; turbo mode degrades
        // gracefully to scan mode whenever we cannot read exactly `n` bytes
        // of the following element (spec. 7, Truncation).
        let tok = self.tz.next_token()?;
        if tok.kind != TokenKind::Start {
            if !self.turbo_fallback_logged {
                log::warn!("turbo hint not followed by a start tag; falling back to scan mode");
                self.turbo_fallback_logged = true;
            }
            return Ok(None);
        }
        let wanted = matches!(&self.pattern, Pattern::Named(name) if name == &tok.name);
        let text = self.scan_rest_of_element(&tok)?;
        if text.len() as u64 != n && !self.turbo_fallback_logged {
            log::warn!(
                "turbo hint {} disagreed with actual record size {}; falling back to scan mode",
                n,
                text.len()
            );
            self.turbo_fallback_logged = true;
        }
        if wanted {
            Ok(Some(RawRecord { tag: tok.name, text }))
        } else {
            Ok(None)
        }
    }
}

fn render_start(tok: &crate::token::Token) -> String {
    format!("<{}{}>", tok.name, render_attrs(&tok.attrs))
}

fn render_self(tok: &crate::token::Token) -> String {
    format!("<{}{}/>", tok.name, render_attrs(&tok.attrs))
}

fn render_attrs(attrs: &[(String, Option<String>)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| match v {
            Some(v) => format!(" {}=\"{}\"", k, v),
            None => format!(" {}", k),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn records(text: &str, pattern: &str) -> Vec<RawRecord> {
        let mut p = Partitioner::new(Cursor::new(text.as_bytes().to_vec()), Pattern::parse(pattern), 16);
        let mut out = Vec::new();
        while let Some(rec) = p.next_record().unwrap() {
            out.push(rec);
        }
        out
    }

    #[test]
    fn test_scan_mode_basic() {
        let recs = records(
            "<Set><R><I>7</I></R><R><I>9</I></R></Set>",
            "R",
        );
        assert_eq!(recs.len(), 2);
        assert!(recs[0].text.contains("<I>7</I>"));
        assert!(recs[1].text.contains("<I>9</I>"));
    }

    #[test]
    fn test_heterogeneous_children() {
        let recs = records("<Set><Book>a</Book><Article>b</Article></Set>", "Set/*");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].tag, "Book");
        assert_eq!(recs[1].tag, "Article");
    }

    #[test]
    fn test_nested_same_name_depth() {
        let recs = records("<R><R>inner</R></R>", "R");
        assert_eq!(recs.len(), 1);
        assert!(recs[0].text.contains("<R>inner</R>"));
    }

    #[test]
    fn test_record_own_attributes_are_preserved() {
        let recs = records(r#"<Set><R id="123" type="foo"><I>7</I></R></Set>"#, "R");
        assert_eq!(recs.len(), 1);
        assert!(recs[0].text.starts_with(r#"<R id="123" type="foo">"#), "{}", recs[0].text);
    }
}
