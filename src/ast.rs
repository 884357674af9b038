//! Parser-neutral syntax tree and its conversion into values.
//!
//! A grammar hands the runtime a tree of [`Node`]s. Each node carries the tag
//! of the rule that produced it, the matched text (for leaves) and its
//! children (for lists). Tags may be compound (`expr|number`); a node has a
//! tag when any `|`-separated part matches exactly.
//!
//! [`read`] turns a tree into a [`Value`]: numbers, symbols and strings become
//! atoms, `qexpr` nodes become Q-expressions and every other branch (the
//! program root and `sexpr`) becomes an S-expression. Punctuation and comment
//! nodes are dropped.

use crate::Error;
use crate::value::{IntegerType, RealType, Value};

pub const NUMBER: &str = "number";
pub const SYMBOL: &str = "symbol";
pub const STRING: &str = "string";
pub const COMMENT: &str = "comment";
pub const SEXPR: &str = "sexpr";
pub const QEXPR: &str = "qexpr";
/// Delimiters: `(`, `)`, `{` and `}`
pub const CHAR: &str = "char";
/// Tag of the node wrapping a whole program
pub const ROOT: &str = ">";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    /// Matched source text; empty for branches
    pub contents: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn leaf(tag: &str, contents: impl Into<String>) -> Self {
        Node {
            tag: tag.to_owned(),
            contents: contents.into(),
            children: Vec::new(),
        }
    }

    pub fn branch(tag: &str, children: Vec<Node>) -> Self {
        Node {
            tag: tag.to_owned(),
            contents: String::new(),
            children,
        }
    }

    pub fn punctuation(delimiter: char) -> Self {
        Node::leaf(CHAR, delimiter)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.split('|').any(|part| part == tag)
    }

    /// Nodes that carry no value
    fn is_trivia(&self) -> bool {
        self.has_tag(CHAR) || self.has_tag(COMMENT)
    }
}

/// Convert a syntax tree into a value
pub fn read(node: &Node) -> Value {
    if node.has_tag(NUMBER) {
        return read_number(&node.contents);
    }
    if node.has_tag(SYMBOL) {
        return Value::Symbol(node.contents.clone());
    }
    if node.has_tag(STRING) {
        return Value::String(unescape(&node.contents));
    }

    let items = node
        .children
        .iter()
        .filter(|child| !child.is_trivia())
        .map(read)
        .collect();
    if node.has_tag(QEXPR) {
        Value::QExpression(items)
    } else {
        Value::SExpression(items)
    }
}

/// Integer unless the text has a fractional part. Text that does not fit
/// reads as an Error value.
fn read_number(text: &str) -> Value {
    let parsed = if text.contains('.') {
        text.parse::<RealType>().ok().map(Value::Real)
    } else {
        text.parse::<IntegerType>().ok().map(Value::Integer)
    };
    parsed.unwrap_or_else(|| Value::Error(Error::InvalidNumber(text.to_owned()).to_string()))
}

/// Strip the surrounding quotes and resolve escape sequences. Unknown
/// escapes are kept verbatim.
fn unescape(raw: &str) -> String {
    let body = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('f') => result.push('\x0c'),
            Some('v') => result.push('\x0b'),
            Some(c @ ('\\' | '"' | '\'')) => result.push(c),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{sym, val};

    fn list(tag: &str, open: char, items: Vec<Node>, close: char) -> Node {
        let mut children = vec![Node::punctuation(open)];
        children.extend(items);
        children.push(Node::punctuation(close));
        Node::branch(tag, children)
    }

    #[test]
    fn test_read_atoms_data_driven() {
        let test_cases = vec![
            (Node::leaf(NUMBER, "42"), val(42)),
            (Node::leaf(NUMBER, "-7"), val(-7)),
            (Node::leaf(NUMBER, "2.5"), val(2.5)),
            (Node::leaf(NUMBER, "-0.25"), val(-0.25)),
            (
                Node::leaf(NUMBER, "99999999999999999999"),
                Value::error("invalid number '99999999999999999999'"),
            ),
            (Node::leaf(SYMBOL, "def"), sym("def")),
            (Node::leaf(SYMBOL, "\\"), sym("\\")),
            (Node::leaf(STRING, "\"hello\""), val("hello")),
            (Node::leaf(STRING, "\"\""), val("")),
            (Node::leaf(STRING, r#""a\nb\t\"c\"""#), val("a\nb\t\"c\"")),
            (Node::leaf(STRING, r#""back\\slash""#), val("back\\slash")),
            (Node::leaf(STRING, r#""odd\qescape""#), val("odd\\qescape")),
            // Compound tags from other grammars
            (Node::leaf("expr|number|regex", "5"), val(5)),
        ];

        for (i, (node, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(read(&node), expected, "Read test #{} failed", i + 1);
        }
    }

    #[test]
    fn test_read_lists_skip_trivia() {
        let sexpr = list(
            SEXPR,
            '(',
            vec![
                Node::leaf(SYMBOL, "+"),
                Node::leaf(COMMENT, "; adds"),
                Node::leaf(NUMBER, "1"),
                list(QEXPR, '{', vec![Node::leaf(NUMBER, "2")], '}'),
            ],
            ')',
        );
        assert_eq!(
            read(&sexpr),
            Value::sexpr(vec![sym("+"), val(1), val([2])])
        );

        // The root reads as an S-expression of the top-level expressions
        let root = Node::branch(ROOT, vec![Node::leaf(NUMBER, "1"), sexpr]);
        let Value::SExpression(items) = read(&root) else {
            panic!("root should read as an S-expression");
        };
        assert_eq!(items.len(), 2);

        assert_eq!(
            read(&list(QEXPR, '{', vec![], '}')),
            Value::QExpression(vec![])
        );
    }

    #[test]
    fn test_read_string_prints_back_escaped() {
        let sources = [
            r#""tab\tnew\nline""#,
            r#""bell\a back\b feed\f vtab\v""#,
            r#""nul\0 quote\" slash\\""#,
        ];
        for source in sources {
            let value = read(&Node::leaf(STRING, source));
            assert_eq!(value.to_string(), source);
        }

        // An escaped single quote needs no escape when printed
        assert_eq!(read(&Node::leaf(STRING, r#""it\'s""#)).to_string(), r#""it's""#);
    }

    #[test]
    fn test_has_tag() {
        let node = Node::leaf("expr|symbol", "x");
        assert!(node.has_tag(SYMBOL));
        assert!(!node.has_tag("sym"));
        assert!(Node::punctuation('(').has_tag(CHAR));
    }
}
