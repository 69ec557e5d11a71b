//! Token types produced by the XML tokenizer (spec. 3, 4.1).

use std::fmt;

/// Byte offset into the input stream, reported as (line, column), both 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position(pub usize, pub usize);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@({},{})", self.0, self.1)
    }
}

/// Whitespace adjacency bits carried by `CONTENT` tokens. Downstream
/// formatters use these to decide whether to re-insert a space when
/// reassembling text, and the indexer uses them as word-boundary hints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentFlags(u8);

impl ContentFlags {
    pub const LFTSPACE: ContentFlags = ContentFlags(0b01);
    pub const RGTSPACE: ContentFlags = ContentFlags(0b10);

    pub fn none() -> ContentFlags {
        ContentFlags(0)
    }

    pub fn with(mut self, other: ContentFlags) -> ContentFlags {
        self.0 |= other.0;
        self
    }

    pub fn has(&self, flag: ContentFlags) -> bool {
        self.0 & flag.0 != 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Start,
    SelfClose,
    Stop,
    Content,
    Cdata,
    Comment,
    Doctype,
    Process,
    /// Malformed construct; `text` carries whatever was scanned for diagnostics.
    NotTag,
    /// Sentinel emitted once at end-of-input.
    IsClosed,
}

/// One lexical unit of the input stream. `name` is populated for
/// `Start`/`SelfClose`/`Stop`; `attrs` only for `Start`/`SelfClose`; `text`
/// carries raw body for `Content`/`Cdata`/`Comment`/`Doctype`/`Process`/`NotTag`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub name: String,
    pub attrs: Vec<(String, Option<String>)>,
    pub text: String,
    pub flags: ContentFlags,
    pub pos: Position,
}

impl Token {
    pub fn start(name: String, attrs: Vec<(String, Option<String>)>, pos: Position) -> Token {
        Token { kind: TokenKind::Start, name, attrs, text: String::new(), flags: ContentFlags::none(), pos }
    }

    pub fn self_close(name: String, attrs: Vec<(String, Option<String>)>, pos: Position) -> Token {
        Token { kind: TokenKind::SelfClose, name, attrs, text: String::new(), flags: ContentFlags::none(), pos }
    }

    pub fn stop(name: String, pos: Position) -> Token {
        Token { kind: TokenKind::Stop, name, attrs: Vec::new(), text: String::new(), flags: ContentFlags::none(), pos }
    }

    pub fn content(text: String, flags: ContentFlags, pos: Position) -> Token {
        Token { kind: TokenKind::Content, name: String::new(), attrs: Vec::new(), text, flags, pos }
    }

    pub fn verbatim(kind: TokenKind, text: String, pos: Position) -> Token {
        Token { kind, name: String::new(), attrs: Vec::new(), text, flags: ContentFlags::none(), pos }
    }

    pub fn is_closed(pos: Position) -> Token {
        Token { kind: TokenKind::IsClosed, name: String::new(), attrs: Vec::new(), text: String::new(), flags: ContentFlags::none(), pos }
    }
}
