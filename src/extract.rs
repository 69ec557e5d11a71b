//! The record extractor (spec. 4.3): a compiled pattern/block/element/
//! condition tree evaluated against one record's tokenized element view.

use std::{cmp::Ordering, collections::HashMap, io::Cursor};

use regex::Regex;

use crate::{
    err_at,
    token::TokenKind,
    tokenizer::Tokenizer,
    Error, Result,
};

/// One parsed XML element, with its text content flattened in document
/// order (CDATA included verbatim, comments and processing instructions
/// dropped — they carry no extractable content).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).and_then(|(_, v)| v.as_deref())
    }
}

/// Builds the element tree for one record substring. The substring is
/// expected to be a single well-formed element (what [crate::partition]
/// yields), so a single root is returned.
pub fn parse_record(record: &str) -> Result<Element> {
    let mut tokenizer = Tokenizer::new(Cursor::new(record.as_bytes().to_vec()), 4096);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let token = tokenizer.next_token()?;
        match token.kind {
            TokenKind::Start => {
                stack.push(Element { name: token.name, attrs: token.attrs, ..Default::default() });
            }
            TokenKind::SelfClose => {
                let el = Element { name: token.name, attrs: token.attrs, ..Default::default() };
                push_child(&mut stack, &mut root, el);
            }
            TokenKind::Stop => {
                let el = match stack.pop() {
                    Some(el) if el.name == token.name => el,
                    _ => return err_at!(MalformedInput, msg: "unbalanced </{}>", token.name),
                };
                push_child(&mut stack, &mut root, el);
            }
            TokenKind::Content | TokenKind::Cdata => {
                if let Some(top) = stack.last_mut() {
                    if !top.text.is_empty() && !token.text.is_empty() {
                        top.text.push(' ');
                    }
                    top.text.push_str(&token.text);
                }
            }
            TokenKind::Comment | TokenKind::Doctype | TokenKind::Process => {}
            TokenKind::NotTag => {
                return err_at!(MalformedInput, msg: "unparseable markup: {}", token.text)
            }
            TokenKind::IsClosed => break,
        }
    }

    root.ok_or_else(|| Error::MalformedInput("extract::parse_record".to_string(), "empty record".to_string()))
}

fn push_child(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

/// Numeric-aware comparison (spec. 4.3): all-digit or digit-plus-decimal
/// strings compare numerically (shorter ⇒ smaller on ties), everything else
/// compares bytewise.
pub fn compare_field(a: &str, b: &str) -> Ordering {
    fn is_numeric_like(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
    }
    if is_numeric_like(a) && is_numeric_like(b) {
        match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then(a.len().cmp(&b.len())),
            _ => a.cmp(b),
        }
    } else {
        a.cmp(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    Name(String),
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    /// Alias of `First`: with visit matching only direct children, the
    /// outermost match in document order is the first one.
    Outer,
    /// Alias of `Last`.
    Inner,
    Even,
    Odd,
    All,
    Nth(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq(String),
    Ne(String),
    Regex(String),
}

impl Condition {
    fn matches(&self, text: &str) -> Result<bool> {
        Ok(match self {
            Condition::Eq(v) => text == v,
            Condition::Ne(v) => text != v,
            Condition::Regex(pattern) => {
                let re = err_at!(InvalidInput, Regex::new(pattern))?;
                re.is_match(text)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Emit a fixed literal instead of matched content.
    Literal(String),
    /// Emit the matched element's flattened text.
    Value,
    /// Look the matched element's text up in the transform table; emits
    /// the original text unchanged if no mapping exists.
    Transform(String),
    /// Emit nothing for this node itself, only its children's output
    /// (a pure structural "block" grouping node).
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractNode {
    pub visit: Visit,
    pub position: Position,
    pub condition: Option<Condition>,
    pub output: Output,
    pub children: Vec<ExtractNode>,
}

impl ExtractNode {
    pub fn new(visit: Visit) -> ExtractNode {
        ExtractNode {
            visit,
            position: Position::All,
            condition: None,
            output: Output::Value,
            children: Vec::new(),
        }
    }
}

/// Immutable term-alias / transform-map table (spec. 4.3, 5).
pub type TransformTable = HashMap<String, String>;

fn select_children<'a>(el: &'a Element, visit: &Visit) -> Vec<&'a Element> {
    match visit {
        Visit::Any => el.children.iter().collect(),
        Visit::Name(name) => el.children.iter().filter(|c| &c.name == name).collect(),
    }
}

fn apply_position<'a>(matches: Vec<&'a Element>, position: Position) -> Vec<&'a Element> {
    match position {
        Position::All => matches,
        Position::First | Position::Outer => matches.into_iter().take(1).collect(),
        Position::Last | Position::Inner => matches.into_iter().last().into_iter().collect(),
        Position::Even => matches.into_iter().enumerate().filter(|(i, _)| i % 2 == 0).map(|(_, e)| e).collect(),
        Position::Odd => matches.into_iter().enumerate().filter(|(i, _)| i % 2 == 1).map(|(_, e)| e).collect(),
        Position::Nth(n) => matches.into_iter().nth(n).into_iter().collect(),
    }
}

/// Evaluates one node (and its subtree) against `el`, appending results to
/// `out` in document order, a pure function of `el`, `node` and `table`.
pub fn eval_node(node: &ExtractNode, el: &Element, table: &TransformTable, out: &mut Vec<String>) -> Result<()> {
    let matches = apply_position(select_children(el, &node.visit), node.position);
    for matched in matches {
        if let Some(cond) = &node.condition {
            if !cond.matches(&matched.text)? {
                continue;
            }
        }
        match &node.output {
            Output::Literal(lit) => out.push(lit.clone()),
            Output::Value => out.push(matched.text.clone()),
            Output::Transform(key) => {
                let resolved = table.get(key).cloned().unwrap_or_else(|| matched.text.clone());
                out.push(resolved);
            }
            Output::None => {}
        }
        for child in &node.children {
            eval_node(child, matched, table, out)?;
        }
    }
    Ok(())
}

/// Runs a compiled program's root nodes over a parsed record, collecting
/// every emitted value in document order.
pub fn extract(program: &[ExtractNode], root: &Element, table: &TransformTable) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for node in program {
        eval_node(node, root, table, &mut out)?;
    }
    Ok(out)
}

/// Extracts a single identifier field, falling back to `default` when the
/// path is absent ("dash" mode, spec. 4.3).
pub fn extract_one(program: &[ExtractNode], root: &Element, table: &TransformTable, default: &str) -> Result<String> {
    let values = extract(program, root, table)?;
    Ok(values.into_iter().next().unwrap_or_else(|| default.to_string()))
}

/// Convenience path for the common case: `Parent/Child/.../Leaf` with no
/// conditions, returning every matched leaf's text.
pub fn path(segments: &[&str]) -> Vec<ExtractNode> {
    fn build(segments: &[&str]) -> ExtractNode {
        let mut node = ExtractNode::new(Visit::Name(segments[0].to_string()));
        if segments.len() == 1 {
            node.output = Output::Value;
        } else {
            node.output = Output::None;
            node.children = vec![build(&segments[1..])];
        }
        node
    }
    vec![build(segments)]
}

/// The attribute-valued variant of [path]: returns the leaf's `attr` value
/// instead of its text.
pub fn attr_of(el: &Element, name: &str) -> Option<String> {
    el.attr(name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"<MedlineCitation>
        <PMID>123</PMID>
        <Article>
            <ArticleTitle>Cats and dogs</ArticleTitle>
            <AuthorList>
                <Author><LastName>Ng</LastName></Author>
                <Author><LastName>Lee</LastName></Author>
            </AuthorList>
        </Article>
    </MedlineCitation>"#;

    #[test]
    fn test_parse_record_builds_tree() {
        let root = parse_record(RECORD).unwrap();
        assert_eq!(root.name, "MedlineCitation");
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_path_extracts_nested_leaf() {
        let root = parse_record(RECORD).unwrap();
        let program = path(&["Article", "ArticleTitle"]);
        let table = TransformTable::new();
        let values = extract(&program, &root, &table).unwrap();
        assert_eq!(values, vec!["Cats and dogs".to_string()]);
    }

    #[test]
    fn test_position_all_and_first() {
        let root = parse_record(RECORD).unwrap();
        let article = &root.children[1];
        let author_list = &article.children[1];

        let mut all_node = ExtractNode::new(Visit::Name("Author".to_string()));
        all_node.children = vec![ExtractNode::new(Visit::Name("LastName".to_string()))];
        all_node.output = Output::None;
        let table = TransformTable::new();
        let mut out = Vec::new();
        eval_node(&all_node, author_list, &table, &mut out).unwrap();
        assert_eq!(out, vec!["Ng".to_string(), "Lee".to_string()]);

        let mut first_node = all_node.clone();
        first_node.position = Position::First;
        let mut out = Vec::new();
        eval_node(&first_node, author_list, &table, &mut out).unwrap();
        assert_eq!(out, vec!["Ng".to_string()]);
    }

    #[test]
    fn test_extract_one_falls_back_to_default() {
        let root = parse_record(RECORD).unwrap();
        let program = path(&["Article", "Missing"]);
        let table = TransformTable::new();
        let value = extract_one(&program, &root, &table, "-").unwrap();
        assert_eq!(value, "-");
    }

    #[test]
    fn test_compare_field_numeric_vs_bytewise() {
        assert_eq!(compare_field("9", "10"), Ordering::Less);
        assert_eq!(compare_field("abc", "abd"), Ordering::Less);
    }
}
