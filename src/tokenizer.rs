//! XML tokenizer (spec. 4.1). Consumes the [Lex] byte buffer and yields a
//! stream of [Token]s: `START`/`SELF`/`STOP` tags, `CONTENT` runs tagged with
//! left/right whitespace adjacency, and verbatim `CDATA`/`COMMENT`/`DOCTYPE`/
//! `PROCESS` spans. Malformed constructs become `NOTAG`; end of input is a
//! single `ISCLOSED` token.

use std::io::Read;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    err_at,
    lex::Lex,
    token::{ContentFlags, Position, Token, TokenKind},
    Error, Result,
};

const BLANK: u8 = 0;
const NAME_START: u8 = 1;
const NAME_CONT: u8 = 2;
const OTHER: u8 = 3;

const fn build_class_table() -> [u8; 256] {
    let mut table = [OTHER; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = match i as u8 {
            b' ' | b'\t' | b'\r' | b'\n' => BLANK,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b':' => NAME_START,
            b'0'..=b'9' | b'-' | b'.' => NAME_CONT,
            _ => OTHER,
        };
        i += 1;
    }
    table
}

static CLASS_TABLE: [u8; 256] = build_class_table();

fn is_name_start(b: u8) -> bool {
    CLASS_TABLE[b as usize] == NAME_START
}

fn is_name_cont(b: u8) -> bool {
    matches!(CLASS_TABLE[b as usize], NAME_START | NAME_CONT)
}

lazy_static! {
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z_:][-A-Za-z0-9_.:]*").unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"([^\s/>=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s'"=<>`]+)))?"#
    )
    .unwrap();
}

pub struct Tokenizer<R> {
    lex: Lex<R>,
    closed_emitted: bool,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(inner: R, block_size: usize) -> Tokenizer<R> {
        Tokenizer { lex: Lex::new(inner, block_size), closed_emitted: false }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.lex.fill_some()?;
        let pos = self.lex.to_position();

        if self.lex.as_str().is_empty() {
            self.closed_emitted = true;
            return Ok(Token::is_closed(pos));
        }

        if self.lex.as_str().as_bytes()[0] == b'<' {
            self.tokenize_markup(pos)
        } else {
            self.tokenize_content(pos)
        }
    }

    /// Grows the lex buffer view until `needle` appears past the cursor, or
    /// the source is known exhausted. Returns the byte offset just past the
    /// match, or `None` if the source closed without ever producing it.
    fn scan_to(&mut self, needle: &str) -> Result<Option<usize>> {
        loop {
            if let Some(idx) = self.lex.as_str().find(needle) {
                return Ok(Some(idx + needle.len()));
            }
            if self.lex.is_source_closed() {
                return Ok(None);
            }
            let want = self.lex.as_str().len() + 1;
            self.lex.ensure(want)?;
        }
    }

    fn tokenize_content(&mut self, pos: Position) -> Result<Token> {
        let end = loop {
            if let Some(idx) = self.lex.as_str().find('<') {
                break idx;
            }
            if self.lex.is_source_closed() {
                break self.lex.as_str().len();
            }
            let want = self.lex.as_str().len() + 1;
            self.lex.ensure(want)?;
        };

        let raw = self.lex.as_str()[..end].to_string();
        let mut flags = ContentFlags::none();
        if raw.chars().next().map(char::is_whitespace).unwrap_or(false) {
            flags = flags.with(ContentFlags::LFTSPACE);
        }
        if raw.chars().last().map(char::is_whitespace).unwrap_or(false) {
            flags = flags.with(ContentFlags::RGTSPACE);
        }
        self.lex.move_cursor(end);
        Ok(Token::content(raw.trim().to_string(), flags, pos))
    }

    fn tokenize_markup(&mut self, pos: Position) -> Result<Token> {
        let head = self.lex.as_str();
        if head.starts_with("<!--") {
            return self.tokenize_verbatim(TokenKind::Comment, "-->", 4, pos);
        }
        if head.starts_with("<![CDATA[") {
            return self.tokenize_verbatim(TokenKind::Cdata, "]]>", 9, pos);
        }
        if head.starts_with("<!DOCTYPE") || head.starts_with("<!doctype") {
            return self.tokenize_doctype(pos);
        }
        if head.starts_with("<?") {
            return self.tokenize_verbatim(TokenKind::Process, "?>", 2, pos);
        }
        if head.starts_with("</") {
            return self.tokenize_end_tag(pos);
        }

        // `<` followed by a name-start char opens a start/self tag; anything
        // else (bare `<`, `<3foo`, ...) is malformed.
        let second = head.as_bytes().get(1).copied();
        match second {
            Some(b) if is_name_start(b) => self.tokenize_start_tag(pos),
            _ => self.tokenize_notag(pos),
        }
    }

    fn tokenize_verbatim(
        &mut self,
        kind: TokenKind,
        terminator: &str,
        skip: usize,
        pos: Position,
    ) -> Result<Token> {
        match self.scan_to(terminator)? {
            Some(end) => {
                let body = self.lex.as_str()[skip..(end - terminator.len())].to_string();
                self.lex.move_cursor(end);
                Ok(Token::verbatim(kind, body, pos))
            }
            None => self.tokenize_notag(pos),
        }
    }

    fn tokenize_doctype(&mut self, pos: Position) -> Result<Token> {
        // DOCTYPE may carry an internal subset in `[...]`; scan for the first
        // unquoted, unbracketed `>`.
        let end = {
            let mut depth = 0i32;
            let mut quote: Option<char> = None;
            let mut found = None;
            loop {
                let text = self.lex.as_str();
                let mut matched_at = None;
                for (i, ch) in text.char_indices() {
                    match quote {
                        Some(q) if ch == q => quote = None,
                        Some(_) => continue,
                        None => match ch {
                            '"' | '\'' => quote = Some(ch),
                            '[' => depth += 1,
                            ']' => depth -= 1,
                            '>' if depth <= 0 => {
                                matched_at = Some(i + 1);
                                break;
                            }
                            _ => (),
                        },
                    }
                }
                if let Some(i) = matched_at {
                    found = Some(i);
                    break;
                }
                if self.lex.is_source_closed() {
                    break;
                }
                let want = text.len() + 1;
                self.lex.ensure(want)?;
            }
            found
        };

        match end {
            Some(end) => {
                let body = self.lex.as_str()[..end].to_string();
                self.lex.move_cursor(end);
                Ok(Token::verbatim(TokenKind::Doctype, body, pos))
            }
            None => self.tokenize_notag(pos),
        }
    }

    /// Scans a `<name attrs>` or `<name attrs/>` span, respecting quoted
    /// attribute values that may themselves contain `>`.
    fn scan_tag_span(&mut self) -> Result<Option<usize>> {
        let mut quote: Option<char> = None;
        loop {
            let text = self.lex.as_str();
            let mut matched_at = None;
            for (i, ch) in text.char_indices() {
                match quote {
                    Some(q) if ch == q => quote = None,
                    Some(_) => continue,
                    None => match ch {
                        '"' | '\'' => quote = Some(ch),
                        '>' => {
                            matched_at = Some(i + 1);
                            break;
                        }
                        _ => (),
                    },
                }
            }
            if let Some(i) = matched_at {
                return Ok(Some(i));
            }
            if self.lex.is_source_closed() {
                return Ok(None);
            }
            let want = text.len() + 1;
            self.lex.ensure(want)?;
        }
    }

    fn tokenize_start_tag(&mut self, pos: Position) -> Result<Token> {
        let end = match self.scan_tag_span()? {
            Some(end) => end,
            None => return self.tokenize_notag(pos),
        };
        let span = self.lex.as_str()[..end].to_string();
        let inner = &span[1..span.len() - 1]; // strip < >
        let self_close = inner.ends_with('/');
        let inner = if self_close { &inner[..inner.len() - 1] } else { inner };

        let name = match TAG_NAME_RE.find(inner.trim_start()) {
            Some(m) => m.as_str().to_string(),
            None => return self.tokenize_notag(pos),
        };
        let rest = inner.trim_start()[name.len()..].trim();
        let attrs = parse_attrs(rest);

        self.lex.move_cursor(end);
        Ok(if self_close {
            Token::self_close(name, attrs, pos)
        } else {
            Token::start(name, attrs, pos)
        })
    }

    fn tokenize_end_tag(&mut self, pos: Position) -> Result<Token> {
        let end = match self.scan_tag_span()? {
            Some(end) => end,
            None => return self.tokenize_notag(pos),
        };
        let span = self.lex.as_str()[..end].to_string();
        let inner = span[2..span.len() - 1].trim();
        let name = match TAG_NAME_RE.find(inner) {
            Some(m) => m.as_str().to_string(),
            None => return self.tokenize_notag(pos),
        };
        self.lex.move_cursor(end);
        Ok(Token::stop(name, pos))
    }

    fn tokenize_notag(&mut self, pos: Position) -> Result<Token> {
        // Consume through the next `>` (or to EOF) so the stream can resync
        // on the following token instead of looping forever on garbage.
        let text = self.lex.as_str();
        let end = text.find('>').map(|i| i + 1).unwrap_or(text.len());
        let body = text[..end].to_string();
        self.lex.move_cursor(end);
        Ok(Token::verbatim(TokenKind::NotTag, body, pos))
    }
}

fn parse_attrs(text: &str) -> Vec<(String, Option<String>)> {
    ATTR_RE
        .captures_iter(text)
        .map(|caps| {
            let key = caps.get(1).unwrap().as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokens(text: &str) -> Vec<Token> {
        let mut tz = Tokenizer::new(Cursor::new(text.as_bytes().to_vec()), 8);
        let mut out = Vec::new();
        loop {
            let tok = tz.next_token().unwrap();
            let done = tok.kind == TokenKind::IsClosed;
            out.push(tok);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn test_start_self_stop() {
        let toks = tokens("<a x=\"1\"><b/></a>");
        assert_eq!(toks[0].kind, TokenKind::Start);
        assert_eq!(toks[0].name, "a");
        assert_eq!(toks[0].attrs, vec![("x".to_string(), Some("1".to_string()))]);
        assert_eq!(toks[1].kind, TokenKind::SelfClose);
        assert_eq!(toks[1].name, "b");
        assert_eq!(toks[2].kind, TokenKind::Stop);
        assert_eq!(toks[2].name, "a");
        assert_eq!(toks[3].kind, TokenKind::IsClosed);
    }

    #[test]
    fn test_content_whitespace_flags() {
        let toks = tokens("<a> hi there </a>");
        assert_eq!(toks[1].kind, TokenKind::Content);
        assert_eq!(toks[1].text, "hi there");
        assert!(toks[1].flags.has(ContentFlags::LFTSPACE));
        assert!(toks[1].flags.has(ContentFlags::RGTSPACE));
    }

    #[test]
    fn test_cdata_comment_doctype_process() {
        let toks = tokens(
            "<!DOCTYPE html><!-- c --><a><![CDATA[<raw>]]></a><?pi data?>",
        );
        assert_eq!(toks[0].kind, TokenKind::Doctype);
        assert_eq!(toks[1].kind, TokenKind::Comment);
        assert_eq!(toks[1].text, " c ");
        assert_eq!(toks[3].kind, TokenKind::Cdata);
        assert_eq!(toks[3].text, "<raw>");
        assert_eq!(toks.last().unwrap().kind, TokenKind::IsClosed);
    }

    #[test]
    fn test_malformed_yields_notag() {
        let toks = tokens("<1bad>");
        assert_eq!(toks[0].kind, TokenKind::NotTag);
    }
}
