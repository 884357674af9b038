//! Nitrogen - a small S/Q-expression language runtime
//!
//! This crate evaluates parenthesized expressions built from numbers, symbols,
//! strings, lists and functions, under lexical scoping with closures. Code is
//! written as S-expressions, which are evaluated, and Q-expressions, which are
//! quoted data that is never evaluated on its own:
//!
//! ```text
//! (+ 1 2 3)                          ; arithmetic
//! (def {x} 5)                        ; global definition
//! ((\ {a b} {+ a b}) 1)              ; partial application returns a closure
//! ((\ {a & rest} {list a rest}) 1 2 3)  ; variadic capture: {1 {2 3}}
//! (if (> x 3) {print "big"} {print "small"})
//! ```
//!
//! ## Value semantics
//!
//! Every runtime datum is a [`value::Value`]. Values are exclusively owned
//! trees; copying one is a deep structural copy (builtins copy by identity).
//! Closures own the scope they captured, so copies of a closure are fully
//! independent.
//!
//! ## Errors
//!
//! Language-level failures (arity, types, division by zero) are ordinary
//! values: [`evaluator::Evaluator::eval`] returns them as `Value::Error`. Only
//! resource exhaustion (the value pool or the evaluation depth guard) is
//! reported as `Err`; the current evaluation is abandoned. Hosts that prefer
//! `Result` everywhere use [`evaluator::Evaluator::try_eval`].
//!
//! ## Modules
//!
//! - `value`: the tagged value algebra
//! - `mempool`: fixed-chunk pool allocator backing evaluation storage
//! - `environment`: scope chain with protected bindings
//! - `evaluator`: expression reduction and the function call protocol
//! - `builtinops`: the standard operation set
//! - `ast`: parser-neutral syntax tree and the `read` conversion
//! - `parser`: text grammar producing the syntax tree

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default maximum evaluation depth (nested S-expression reductions,
/// including closure bodies). Exceeding it is fatal, like pool exhaustion.
pub const MAX_EVAL_DEPTH: usize = 512;

/// Number of chunks in every memory pool
pub const POOL_SIZE: usize = 1000;

/// Default ceiling on the number of pools the allocator may create
pub const MAX_POOLS: usize = 64;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unterminated string, unclosed brackets)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        // Keep the snippet on one line
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        let found = input.get(error_offset..).and_then(|rest| {
            rest.split_whitespace()
                .next()
                .map(|token| token.chars().take(20).collect())
        });

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the runtime.
///
/// Most variants describe recoverable language errors; the evaluator turns
/// them into `Value::Error` at its public boundary. See [`Error::is_fatal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Wrong number of arguments passed to a builtin
    ArityMismatch {
        function: String,
        expected: String,
        got: usize,
    },
    /// Wrong value variant for an argument position
    TypeMismatch {
        function: String,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },
    /// `head`/`tail` on an empty Q-expression
    EmptyListAccess { function: String, index: usize },
    UnboundSymbol(String),
    ProtectedRedefinition(String),
    /// Closure called with more arguments than it has formals
    TooManyArguments { expected: usize, got: usize },
    /// `&` not followed by exactly one formal
    MalformedVariadic,
    DivisionByZero,
    /// The head of an S-expression is not callable
    NotAFunction(&'static str),
    /// Definition form with a different number of symbols and values
    SymbolArityMismatch {
        function: String,
        symbols: usize,
        values: usize,
    },
    IntegerOverflow(&'static str),
    InvalidNumber(String),
    LoadFailed(String),
    /// User-raised error (`error` builtin, or an Error value met during
    /// reduction); displays as the bare message
    Raised(String),
    ParseError(ParseError),
    /// The memory pool ran out of pools to create. Fatal.
    PoolExhausted { max_pools: usize, chunks_per_pool: usize },
    /// Evaluation nested deeper than the configured limit. Fatal.
    DepthExceeded(usize),
}

impl Error {
    /// Create an ArityMismatch error
    pub fn arity_error(function: &str, expected: impl fmt::Display, got: usize) -> Self {
        Error::ArityMismatch {
            function: function.to_owned(),
            expected: expected.to_string(),
            got,
        }
    }

    /// Create a TypeMismatch error
    pub fn type_error(
        function: &str,
        index: usize,
        expected: &'static str,
        got: &'static str,
    ) -> Self {
        Error::TypeMismatch {
            function: function.to_owned(),
            index,
            expected,
            got,
        }
    }

    /// Fatal errors cannot be represented as an Error value; the host must
    /// stop evaluating.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::PoolExhausted { .. } | Error::DepthExceeded(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ArityMismatch {
                function,
                expected,
                got,
            } => write!(
                f,
                "Function '{function}' passed incorrect number of arguments. Got {got}, Expected {expected}."
            ),
            Error::TypeMismatch {
                function,
                index,
                expected,
                got,
            } => write!(
                f,
                "Function '{function}' passed incorrect type for argument {index}. Got {got}, Expected {expected}."
            ),
            Error::EmptyListAccess { function, index } => {
                write!(f, "Function '{function}' passed {{}} for argument {index}.")
            }
            Error::UnboundSymbol(name) => write!(f, "Unbound Symbol '{name}'"),
            Error::ProtectedRedefinition(_) => write!(f, "Cannot redefine protected functions"),
            Error::TooManyArguments { expected, got } => write!(
                f,
                "Function passed too many arguments. Got {got}, Expected {expected}."
            ),
            Error::MalformedVariadic => write!(
                f,
                "Function format invalid. Symbol '&' not followed by single symbol."
            ),
            Error::DivisionByZero => write!(f, "Division By Zero!"),
            Error::NotAFunction(got) => {
                write!(f, "First element is not a function. Got {got}.")
            }
            Error::SymbolArityMismatch {
                function,
                symbols,
                values,
            } => write!(
                f,
                "Function '{function}' passed a different number of values than symbols. Got {values}, Expected {symbols}."
            ),
            Error::IntegerOverflow(op) => write!(f, "Integer overflow in {op}"),
            Error::InvalidNumber(text) => write!(f, "invalid number '{text}'"),
            Error::LoadFailed(msg) => write!(f, "Could not load Library {msg}"),
            Error::Raised(msg) => write!(f, "{msg}"),
            Error::ParseError(e) => write!(f, "ParseError: {e}"),
            Error::PoolExhausted {
                max_pools,
                chunks_per_pool,
            } => write!(
                f,
                "Memory pool exhausted ({max_pools} pools of {chunks_per_pool} chunks)"
            ),
            Error::DepthExceeded(max) => {
                write!(f, "Evaluation depth limit exceeded (max: {max})")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod mempool;
pub mod value;

#[cfg(feature = "parser")]
pub mod parser;
