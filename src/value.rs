//! The tagged value algebra. Every runtime datum is a [`Value`]: numbers,
//! errors, symbols, strings, the two list flavours (evaluable S-expressions
//! and quoted Q-expressions), functions, and the `Ok`/`Empty`/`Quit` markers
//! returned by side-effecting operations.
//!
//! Values own their children exclusively. `Clone` is the deep copy; builtin
//! descriptors are `Copy` and compared by identity, closures carry (and copy)
//! the scope they captured. Structural equality ignores captured scopes.

use crate::builtinops::Builtin;
use crate::environment::Scope;
use std::fmt;

/// Type alias for integer values in the interpreter
pub type IntegerType = i64;

/// Type alias for real values in the interpreter
pub type RealType = f64;

/// Symbol that marks the variadic rest formal in a closure's formals list
pub const REST_MARKER: &str = "&";

/// Core runtime value
#[derive(Clone)]
pub enum Value {
    Integer(IntegerType),
    Real(RealType),
    /// Terminal in reduction: an error short-circuits the evaluation of the
    /// S-expression that produced it
    Error(String),
    Symbol(String),
    String(String),
    /// Evaluated list: the first element is applied to the rest
    SExpression(Vec<Value>),
    /// Quoted list: never evaluated on its own
    QExpression(Vec<Value>),
    Function(Function),
    /// Successful side-effecting call
    Ok,
    /// Prints nothing, not even a trailing newline
    Empty,
    /// Asks the host loop to terminate with this exit code
    Quit(IntegerType),
}

/// Callable values
#[derive(Clone)]
pub enum Function {
    /// Operation whose arguments are evaluated before the call
    Builtin(Builtin),
    /// Operation that receives its arguments unevaluated
    Macro(Builtin),
    Closure(Closure),
}

/// A user-defined function.
///
/// `formals` holds the parameters still waiting for an argument: a partial
/// application produces a closure with a shorter list and a scope that
/// already holds the bound ones.
#[derive(Clone, Debug)]
pub struct Closure {
    pub formals: Vec<String>,
    /// Body elements, evaluated as an S-expression once every formal is bound
    pub body: Vec<Value>,
    pub scope: Scope,
}

impl Value {
    pub fn integer(n: IntegerType) -> Self {
        Value::Integer(n)
    }

    pub fn real(x: RealType) -> Self {
        Value::Real(x)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn sexpr(elements: Vec<Value>) -> Self {
        Value::SExpression(elements)
    }

    pub fn qexpr(elements: Vec<Value>) -> Self {
        Value::QExpression(elements)
    }

    /// A closure with a fresh, empty captured scope
    pub fn lambda(formals: Vec<String>, body: Vec<Value>) -> Self {
        Value::Function(Function::Closure(Closure {
            formals,
            body,
            scope: Scope::new(),
        }))
    }

    pub fn ok() -> Self {
        Value::Ok
    }

    pub fn empty() -> Self {
        Value::Empty
    }

    pub fn quit(code: IntegerType) -> Self {
        Value::Quit(code)
    }

    /// Human readable variant name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::Error(_) => "Error",
            Value::Symbol(_) => "Symbol",
            Value::String(_) => "String",
            Value::SExpression(_) => "S-Expression",
            Value::QExpression(_) => "Q-Expression",
            Value::Function(_) => "Function",
            Value::Ok => "Ok",
            Value::Empty => "Empty",
            Value::Quit(_) => "Quit",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// Empty results print nothing at all; callers skip their newline
    pub fn suppresses_newline(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric payload widened to a real, if this is a number
    pub(crate) fn as_real(&self) -> Option<RealType> {
        match self {
            Value::Integer(n) => Some(*n as RealType),
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }
}

impl Function {
    /// Name of the operation for builtins and macros
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Function::Builtin(b) | Function::Macro(b) => Some(b.name),
            Function::Closure(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            // NaN equals NaN so that a copy always equals its original
            (Value::Real(a), Value::Real(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::SExpression(a), Value::SExpression(b)) => a == b,
            (Value::QExpression(a), Value::QExpression(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Ok, Value::Ok) => true,
            (Value::Empty, Value::Empty) => true,
            (Value::Quit(a), Value::Quit(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Builtins are globally unique by name
            (Function::Builtin(a), Function::Builtin(b)) => a.name == b.name,
            (Function::Macro(a), Function::Macro(b)) => a.name == b.name,
            // Captured scopes are deliberately not compared
            (Function::Closure(a), Function::Closure(b)) => {
                a.formals == b.formals && a.body == b.body
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Real(x) => write!(f, "Real({x})"),
            Value::Error(msg) => write!(f, "Error({msg:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::SExpression(list) => {
                write!(f, "SExpression")?;
                f.debug_list().entries(list).finish()
            }
            Value::QExpression(list) => {
                write!(f, "QExpression")?;
                f.debug_list().entries(list).finish()
            }
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Ok => write!(f, "Ok"),
            Value::Empty => write!(f, "Empty"),
            Value::Quit(code) => write!(f, "Quit({code})"),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin(b) => write!(f, "Builtin({})", b.name),
            Function::Macro(b) => write!(f, "Macro({})", b.name),
            Function::Closure(c) => {
                write!(f, "Closure(formals={:?}, body={:?})", c.formals, c.body)
            }
        }
    }
}

/// Write list elements separated by single spaces between the delimiters
fn write_elements(
    f: &mut fmt::Formatter<'_>,
    open: char,
    elements: &[Value],
    close: char,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, elem) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{elem}")?;
    }
    write!(f, "{close}")
}

/// Canonical textual form. `Ok`, `Empty` and `Quit` print nothing.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x:.6}"),
            Value::Error(msg) => write!(f, "Error: {msg}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        '\0' => write!(f, "\\0")?,
                        '\x07' => write!(f, "\\a")?,
                        '\x08' => write!(f, "\\b")?,
                        '\x0c' => write!(f, "\\f")?,
                        '\x0b' => write!(f, "\\v")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::SExpression(elements) => write_elements(f, '(', elements, ')'),
            Value::QExpression(elements) => write_elements(f, '{', elements, '}'),
            Value::Function(func) => write!(f, "{func}"),
            Value::Ok | Value::Empty | Value::Quit(_) => Ok(()),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin(_) => write!(f, "<builtin>"),
            Function::Macro(_) => write!(f, "<macro>"),
            Function::Closure(c) => {
                write!(f, "(\\ {{")?;
                for (i, formal) in c.formals.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{formal}")?;
                }
                write!(f, "}} ")?;
                write_elements(f, '{', &c.body, '}')?;
                write!(f, ")")
            }
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<RealType> for Value {
    fn from(x: RealType) -> Self {
        Value::Real(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(IntegerType::from(b))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n as IntegerType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Vectors and arrays become Q-expressions, the language's data lists
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::QExpression(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::QExpression(arr.into_iter().map(Into::into).collect())
    }
}

/// Helper for creating symbols in mixed lists
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating values from Rust literals
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper for building an S-expression from mixed elements
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sexpr<const N: usize>(elements: [Value; N]) -> Value {
    Value::SExpression(elements.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtinops::find_builtin_op;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Integer(42)),
            (val(-17), Value::Integer(-17)),
            (val(255u8), Value::Integer(255)),
            (val(IntegerType::MIN), Value::Integer(IntegerType::MIN)),
            (val(2.5), Value::Real(2.5)),
            (val(true), Value::Integer(1)),
            (val("hello"), Value::String("hello".to_owned())),
            (sym("+"), Value::Symbol("+".to_owned())),
            (
                val([1, 2, 3]),
                Value::QExpression(vec![
                    Value::Integer(1),
                    Value::Integer(2),
                    Value::Integer(3),
                ]),
            ),
            (
                sexpr([sym("head"), val([1])]),
                Value::SExpression(vec![
                    Value::Symbol("head".to_owned()),
                    Value::QExpression(vec![Value::Integer(1)]),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_structural_equality() {
        // Same payload, different variant: never equal
        assert_ne!(Value::Integer(1), Value::Real(1.0));
        assert_ne!(Value::symbol("a"), Value::string("a"));
        assert_ne!(Value::sexpr(vec![val(1)]), Value::qexpr(vec![val(1)]));
        assert_ne!(Value::Ok, Value::Empty);

        // Lists compare by length and elements
        assert_eq!(val([1, 2]), val([1, 2]));
        assert_ne!(val([1, 2]), val([1, 2, 3]));
        assert_ne!(val([1, 2]), val([2, 1]));

        assert_eq!(Value::error("x"), Value::error("x"));
        assert_eq!(Value::quit(3), Value::quit(3));
        assert_ne!(Value::quit(3), Value::quit(4));
    }

    #[test]
    fn test_closure_equality_ignores_scope() {
        let plain = Value::lambda(vec!["x".into()], vec![sym("+"), sym("x"), val(1)]);
        let Value::Function(Function::Closure(mut closure)) = plain.clone() else {
            panic!("expected closure");
        };
        assert!(closure.scope.bind("y", val(99)).is_ok());
        let with_scope = Value::Function(Function::Closure(closure));
        assert_eq!(plain, with_scope);

        let other_body = Value::lambda(vec!["x".into()], vec![sym("-"), sym("x"), val(1)]);
        assert_ne!(plain, other_body);
    }

    #[test]
    fn test_builtin_identity() {
        let add = find_builtin_op("+").map(|op| op.to_value());
        let add_again = find_builtin_op("+").map(|op| op.to_value());
        let sub = find_builtin_op("-").map(|op| op.to_value());
        assert!(add.is_some());
        assert_eq!(add, add_again);
        assert_ne!(add, sub);

        // def is registered as a macro; a macro never equals a builtin
        let def = find_builtin_op("def").map(|op| op.to_value());
        assert!(matches!(def, Some(Value::Function(Function::Macro(_)))));
        assert_ne!(def, add);
    }

    #[test]
    fn test_copy_is_structurally_equal() {
        let mut closure = Closure {
            formals: vec!["b".into()],
            body: vec![sym("+"), sym("a"), sym("b")],
            scope: Scope::new(),
        };
        assert!(closure.scope.bind("a", val(1)).is_ok());

        let values = vec![
            val(7),
            val(1.5),
            Value::real(f64::NAN),
            Value::error("boom"),
            sym("x"),
            val("text"),
            Value::sexpr(vec![sym("+"), val(1), val(2)]),
            val([val(1), val([2, 3])]),
            Value::Function(Function::Closure(closure)),
            Value::ok(),
            Value::empty(),
            Value::quit(2),
        ];

        for (i, original) in values.iter().enumerate() {
            let copy = original.clone();
            assert_eq!(&copy, original, "copy #{i} differs from original");
        }
    }

    #[test]
    fn test_closure_copy_owns_independent_scope() {
        let mut closure = Closure {
            formals: vec![],
            body: vec![sym("a")],
            scope: Scope::new(),
        };
        assert!(closure.scope.bind("a", val(1)).is_ok());
        let mut copy = closure.clone();
        assert!(copy.scope.bind("a", val(2)).is_ok());

        assert_eq!(closure.scope.get("a"), Some(&val(1)));
        assert_eq!(copy.scope.get("a"), Some(&val(2)));
    }

    #[test]
    fn test_canonical_display() {
        let test_cases = vec![
            (val(42), "42"),
            (val(-3), "-3"),
            (val(3.0), "3.000000"),
            (val(-0.5), "-0.500000"),
            (val("a \"quoted\"\nline"), r#""a \"quoted\"\nline""#),
            (val("\x07\x08\x0c\x0b\0'"), r#""\a\b\f\v\0'""#),
            (sym("foo"), "foo"),
            (Value::error("Division By Zero!"), "Error: Division By Zero!"),
            (Value::sexpr(vec![sym("+"), val(1), val(2)]), "(+ 1 2)"),
            (val([val(1), val([2, 3])]), "{1 {2 3}}"),
            (Value::qexpr(vec![]), "{}"),
            (Value::sexpr(vec![]), "()"),
            (
                Value::lambda(
                    vec!["a".into(), "b".into()],
                    vec![sym("+"), sym("a"), sym("b")],
                ),
                "(\\ {a b} {+ a b})",
            ),
            (Value::ok(), ""),
            (Value::empty(), ""),
            (Value::quit(1), ""),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            assert_eq!(format!("{value}"), *expected, "Display case {} failed", i + 1);
        }

        assert!(Value::empty().suppresses_newline());
        assert!(!Value::ok().suppresses_newline());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(val(1).type_name(), "Integer");
        assert_eq!(val(1.0).type_name(), "Real");
        assert_eq!(val([1]).type_name(), "Q-Expression");
        assert_eq!(Value::sexpr(vec![]).type_name(), "S-Expression");
        assert_eq!(Value::lambda(vec![], vec![]).type_name(), "Function");
    }
}
