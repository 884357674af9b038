//! Text grammar producing a [`Node`] tree.
//!
//! ```text
//! number  : /-?[0-9]+(\.[0-9]+)?/
//! symbol  : /[a-zA-Z0-9_+\-*\/\\=<>!&%]+/
//! string  : /"(\\.|[^"])*"/
//! comment : /;[^\r\n]*/
//! sexpr   : '(' <expr>* ')'
//! qexpr   : '{' <expr>* '}'
//! expr    : <number> | <symbol> | <string> | <comment> | <sexpr> | <qexpr>
//! program : <expr>*
//! ```
//!
//! Leaves keep their raw source text; [`crate::ast::read`] does the
//! conversion into values. Delimiters are kept as `char` nodes.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{cut, opt, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded, terminated},
};

use crate::ast::{self, Node};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Grammar options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Accept `;` line comments. When off, `;` is a syntax error.
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

const SYMBOL_SPECIAL_CHARS: &str = "_+-*/\\=<>!&%";

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn error_at(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Convert nom parsing errors to structured parse errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    offset,
                ),
                ErrorKind::Eof => ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unterminated string literal",
                    input,
                    offset,
                ),
                _ if e.input.is_empty() => ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input",
                    input,
                    offset,
                ),
                _ => {
                    let near: String = e.input.chars().take(10).collect();
                    ParseError::with_context(
                        ParseErrorKind::InvalidSyntax,
                        format!("Invalid syntax at position {offset} near '{near}'"),
                        input,
                        offset,
                    )
                }
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::new(ParseErrorKind::Incomplete, "Incomplete input", None, None)
        }
    }
}

/// A number must not run into symbol characters: `1+` and `2x` are symbols
fn parse_number(input: &str) -> IResult<&str, Node> {
    let (remaining, text) =
        recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    if remaining.starts_with(is_symbol_char) {
        return Err(error_at(input, ErrorKind::Digit));
    }
    Ok((remaining, Node::leaf(ast::NUMBER, text)))
}

fn parse_symbol(input: &str) -> IResult<&str, Node> {
    let (remaining, text) = take_while1(is_symbol_char).parse(input)?;
    Ok((remaining, Node::leaf(ast::SYMBOL, text)))
}

/// Recognize a string literal, quotes and escapes included
fn parse_string(input: &str) -> IResult<&str, Node> {
    let (body, _) = char('"').parse(input)?;
    let mut chars = body.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => {
                let end = input.len() - body.len() + idx + 1;
                return Ok((&input[end..], Node::leaf(ast::STRING, &input[..end])));
            }
            '\\' => {
                chars.next();
            }
            _ => {}
        }
    }
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        ErrorKind::Eof,
    )))
}

fn parse_comment(input: &str, config: ParseConfig) -> IResult<&str, Node> {
    if !config.handle_comments {
        return Err(error_at(input, ErrorKind::Char));
    }
    let (remaining, text) =
        recognize(pair(char(';'), take_while(|c: char| c != '\n' && c != '\r'))).parse(input)?;
    Ok((remaining, Node::leaf(ast::COMMENT, text)))
}

/// Parse a delimited list. Once the opening delimiter matched, a missing
/// closing one is a hard failure.
fn parse_list<'a>(
    input: &'a str,
    delimiters: (char, char),
    tag: &'static str,
    depth: usize,
    config: ParseConfig,
) -> IResult<&'a str, Node> {
    let (open, close) = delimiters;
    let (input, _) = char(open).parse(input)?;
    let (input, items) =
        many0(preceded(multispace0, |input| parse_expr(input, depth + 1, config))).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = cut(char(close)).parse(input)?;

    let mut children = Vec::with_capacity(items.len() + 2);
    children.push(Node::punctuation(open));
    children.extend(items);
    children.push(Node::punctuation(close));
    Ok((input, Node::branch(tag, children)))
}

fn parse_expr(input: &str, depth: usize, config: ParseConfig) -> IResult<&str, Node> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        parse_number,
        parse_symbol,
        parse_string,
        |input| parse_comment(input, config),
        |input| parse_list(input, ('(', ')'), ast::SEXPR, depth, config),
        |input| parse_list(input, ('{', '}'), ast::QEXPR, depth, config),
    ))
    .parse(input)
}

/// Parse a whole program with the default grammar options
pub fn parse_program(input: &str) -> Result<Node, Error> {
    parse_program_with_config(input, ParseConfig::default())
}

/// Parse a whole program into a root node holding every top-level expression
pub fn parse_program_with_config(input: &str, config: ParseConfig) -> Result<Node, Error> {
    match terminated(
        many0(preceded(multispace0, |input| parse_expr(input, 0, config))),
        multispace0,
    )
    .parse(input)
    {
        Ok(("", children)) => Ok(Node::branch(ast::ROOT, children)),
        Ok((remaining, _)) => {
            let offset = input.len() - remaining.len();
            let unexpected: String = remaining.chars().take(1).collect();
            Err(ParseError::with_context(
                ParseErrorKind::InvalidSyntax,
                format!("Unexpected '{unexpected}' at position {offset}"),
                input,
                offset,
            )
            .into())
        }
        Err(e) => Err(to_parse_error(input, e).into()),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::read;
    use crate::value::{Value, sym, val};

    /// Parse and read, returning the top-level expressions
    fn parse_values(input: &str) -> Result<Vec<Value>, Error> {
        match read(&parse_program(input)?) {
            Value::SExpression(items) => Ok(items),
            other => panic!("root should read as an S-expression, got {other:?}"),
        }
    }

    fn parse_kind(input: &str) -> ParseErrorKind {
        match parse_program(input) {
            Err(Error::ParseError(e)) => e.kind,
            other => panic!("'{input}' should fail to parse, got {other:?}"),
        }
    }

    #[test]
    fn test_parser_data_driven() {
        let test_cases = vec![
            // Atoms
            ("42", vec![val(42)]),
            ("-42", vec![val(-42)]),
            ("3.25", vec![val(3.25)]),
            ("-0.5", vec![val(-0.5)]),
            ("-", vec![sym("-")]),
            ("foo_bar", vec![sym("foo_bar")]),
            ("mem-pool-stats", vec![sym("mem-pool-stats")]),
            ("\\", vec![sym("\\")]),
            ("&", vec![sym("&")]),
            ("%", vec![sym("%")]),
            ("<= >= == !=", vec![sym("<="), sym(">="), sym("=="), sym("!=")]),
            // Digits running into symbol characters form a symbol
            ("1+", vec![sym("1+")]),
            ("2x", vec![sym("2x")]),
            ("\"hi there\"", vec![val("hi there")]),
            (r#""say \"hi\"""#, vec![val("say \"hi\"")]),
            (r#""a;b""#, vec![val("a;b")]),
            // Lists
            ("(+ 1 2)", vec![Value::sexpr(vec![sym("+"), val(1), val(2)])]),
            ("{1 2 3}", vec![val([1, 2, 3])]),
            ("()", vec![Value::sexpr(vec![])]),
            ("{}", vec![Value::qexpr(vec![])]),
            (
                "(def {x} {1 (2)})",
                vec![Value::sexpr(vec![
                    sym("def"),
                    Value::qexpr(vec![sym("x")]),
                    Value::qexpr(vec![val(1), Value::sexpr(vec![val(2)])]),
                ])],
            ),
            ("(+(- 1)2)", vec![Value::sexpr(vec![
                sym("+"),
                Value::sexpr(vec![sym("-"), val(1)]),
                val(2),
            ])]),
            // Whitespace, newlines and comments
            ("  \n\t 7 \n", vec![val(7)]),
            ("1 2", vec![val(1), val(2)]),
            ("; just a comment", vec![]),
            ("(+ 1 ; one\n 2)", vec![Value::sexpr(vec![sym("+"), val(1), val(2)])]),
            ("", vec![]),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(
                parse_values(input).unwrap(),
                expected,
                "Parse test #{} failed for '{input}'",
                i + 1
            );
        }
    }

    #[test]
    fn test_tree_keeps_punctuation_and_comments() {
        let root = parse_program("(a ; c\n)").unwrap();
        assert!(root.has_tag(ast::ROOT));
        assert_eq!(root.children.len(), 1);

        let sexpr = &root.children[0];
        let tags: Vec<&str> = sexpr.children.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec![ast::CHAR, ast::SYMBOL, ast::COMMENT, ast::CHAR]);
        assert_eq!(sexpr.children[0].contents, "(");
        assert_eq!(sexpr.children[2].contents, "; c");

        // String leaves keep their raw text
        let root = parse_program(r#""a\n""#).unwrap();
        assert_eq!(root.children[0].contents, r#""a\n""#);
    }

    #[test]
    fn test_parse_errors() {
        let test_cases = vec![
            ("(+ 1", ParseErrorKind::Incomplete),
            ("{1 {2}", ParseErrorKind::Incomplete),
            ("\"unterminated", ParseErrorKind::Incomplete),
            (")", ParseErrorKind::InvalidSyntax),
            ("(+ 1 }", ParseErrorKind::InvalidSyntax),
            ("1 . 2", ParseErrorKind::InvalidSyntax),
            ("[1]", ParseErrorKind::InvalidSyntax),
        ];
        for (input, expected) in test_cases {
            assert_eq!(parse_kind(input), expected, "for input '{input}'");
        }
    }

    #[test]
    fn test_parse_depth_limit() {
        let ok = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse_program(&ok).is_ok());

        let deep = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH + 1),
            ")".repeat(MAX_PARSE_DEPTH + 1)
        );
        assert_eq!(parse_kind(&deep), ParseErrorKind::TooDeeplyNested);
    }

    #[test]
    fn test_comments_can_be_disabled() {
        let config = ParseConfig {
            handle_comments: false,
        };
        assert!(parse_program_with_config("(+ 1 2)", config).is_ok());
        assert!(matches!(
            parse_program_with_config("; note", config),
            Err(Error::ParseError(ParseError {
                kind: ParseErrorKind::InvalidSyntax,
                ..
            }))
        ));
    }

    #[test]
    fn test_error_context() {
        let Err(Error::ParseError(e)) = parse_program("(+ 1 2) )") else {
            panic!("expected a parse error");
        };
        assert_eq!(e.found.as_deref(), Some(")"));
        assert!(e.context.is_some());
        assert!(e.to_string().contains("position 8"));
    }
}
