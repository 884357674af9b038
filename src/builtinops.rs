//! Built-in operations registry.
//!
//! Every builtin is a plain function `fn(&mut Evaluator, Vec<Value>) ->
//! Result<Value, Error>` described by a [`BuiltinOp`] entry: its name, its
//! [`Arity`] and whether it is a regular function or a macro. All entries are
//! installed as protected root bindings by [`create_global_env`], so user code
//! cannot redefine them.
//!
//! ## Functions vs Macros
//!
//! - **Functions**: the evaluator reduces every argument before the call
//!   (e.g. `+`, `head`, `if`; branches of `if` are Q-expressions and so are
//!   never evaluated early anyway)
//! - **Macros**: the evaluator passes the arguments untouched and the
//!   operation decides what to evaluate (`def`, `pdef`, `=`)
//!
//! ## Error Handling
//!
//! Each operation validates all of its preconditions before any side effect
//! and reports violations as an [`Error`]. The evaluator turns those into
//! `Value::Error` at its public boundary.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the `OperationFn` signature
//! 2. **Add a `BuiltinOp` entry** to `BUILTIN_OPS` with its name and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::value::{Function, IntegerType, RealType, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Canonical builtin signature. The operation owns its argument vector.
pub type OperationFn = fn(&mut Evaluator, Vec<Value>) -> Result<Value, Error>;

/// Accepted argument counts for a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    pub fn validate(self, function: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(function, self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number"),
        }
    }
}

/// A callable operation as stored inside a `Value`.
///
/// Stateless and `Copy`; two builtins are the same operation when their names
/// match.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    func: OperationFn,
}

impl Builtin {
    pub fn new(name: &'static str, arity: Arity, func: OperationFn) -> Self {
        Builtin { name, arity, func }
    }

    /// Validate the argument count, then run the operation
    pub fn call(&self, evaluator: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(evaluator, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({}, arity={:?})", self.name, self.arity)
    }
}

/// Whether the evaluator reduces the arguments before the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Function,
    Macro,
}

/// Definition of a built-in operation
#[derive(Clone, Copy)]
pub struct BuiltinOp {
    pub name: &'static str,
    pub kind: OpKind,
    pub arity: Arity,
    func: OperationFn,
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    pub fn is_macro(&self) -> bool {
        self.kind == OpKind::Macro
    }

    pub fn builtin(&self) -> Builtin {
        Builtin::new(self.name, self.arity, self.func)
    }

    /// The function value bound to this operation's name
    pub fn to_value(&self) -> Value {
        match self.kind {
            OpKind::Function => Value::Function(Function::Builtin(self.builtin())),
            OpKind::Macro => Value::Function(Function::Macro(self.builtin())),
        }
    }
}

//
// Argument helpers
//

/// Destructure an argument vector of known length
fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], Error> {
    let got = args.len();
    <[Value; N]>::try_from(args).map_err(|_| Error::arity_error(name, N, got))
}

fn expect_qexpr(name: &str, index: usize, value: Value) -> Result<Vec<Value>, Error> {
    match value {
        Value::QExpression(items) => Ok(items),
        other => Err(Error::type_error(
            name,
            index,
            "Q-Expression",
            other.type_name(),
        )),
    }
}

fn expect_string(name: &str, index: usize, value: Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_error(name, index, "String", other.type_name())),
    }
}

/// Every element must be a symbol; reported against argument `index`
fn expect_symbols(name: &str, index: usize, items: Vec<Value>) -> Result<Vec<String>, Error> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Symbol(s) => Ok(s),
            other => Err(Error::type_error(name, index, "Symbol", other.type_name())),
        })
        .collect()
}

fn non_empty(name: &str, index: usize, items: &[Value]) -> Result<(), Error> {
    if items.is_empty() {
        Err(Error::EmptyListAccess {
            function: name.to_owned(),
            index,
        })
    } else {
        Ok(())
    }
}

//
// Arithmetic
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }

    fn apply_integer(self, acc: IntegerType, n: IntegerType) -> Result<IntegerType, Error> {
        match self {
            ArithOp::Add => acc
                .checked_add(n)
                .ok_or(Error::IntegerOverflow("addition")),
            ArithOp::Sub => acc
                .checked_sub(n)
                .ok_or(Error::IntegerOverflow("subtraction")),
            ArithOp::Mul => acc
                .checked_mul(n)
                .ok_or(Error::IntegerOverflow("multiplication")),
            ArithOp::Div if n == 0 => Err(Error::DivisionByZero),
            ArithOp::Div => acc
                .checked_div(n)
                .ok_or(Error::IntegerOverflow("division")),
            ArithOp::Rem if n == 0 => Err(Error::DivisionByZero),
            ArithOp::Rem => acc
                .checked_rem(n)
                .ok_or(Error::IntegerOverflow("modulo")),
        }
    }

    fn apply_real(self, acc: RealType, x: RealType) -> Result<RealType, Error> {
        match self {
            ArithOp::Add => Ok(acc + x),
            ArithOp::Sub => Ok(acc - x),
            ArithOp::Mul => Ok(acc * x),
            ArithOp::Div | ArithOp::Rem if x == 0.0 => Err(Error::DivisionByZero),
            ArithOp::Div => Ok(acc / x),
            ArithOp::Rem => Ok(acc % x),
        }
    }
}

/// Fold the operands left to right. Any Real operand promotes the whole
/// operation to Real; a single operand is only valid for `-` (negation).
fn arithmetic(op: ArithOp, args: Vec<Value>) -> Result<Value, Error> {
    let name = op.symbol();
    for (i, arg) in args.iter().enumerate() {
        if !arg.is_number() {
            return Err(Error::type_error(name, i, "Number", arg.type_name()));
        }
    }

    if args.iter().any(|arg| matches!(arg, Value::Real(_))) {
        let mut operands = args.iter().filter_map(Value::as_real);
        let Some(first) = operands.next() else {
            return Err(Error::arity_error(name, Arity::AtLeast(1), 0));
        };
        if args.len() == 1 {
            return Ok(Value::Real(-first));
        }
        operands
            .try_fold(first, |acc, x| op.apply_real(acc, x))
            .map(Value::Real)
    } else {
        let mut operands = args.iter().filter_map(|arg| match arg {
            Value::Integer(n) => Some(*n),
            _ => None,
        });
        let Some(first) = operands.next() else {
            return Err(Error::arity_error(name, Arity::AtLeast(1), 0));
        };
        if args.len() == 1 {
            return first
                .checked_neg()
                .map(Value::Integer)
                .ok_or(Error::IntegerOverflow("negation"));
        }
        operands
            .try_fold(first, |acc, n| op.apply_integer(acc, n))
            .map(Value::Integer)
    }
}

fn builtin_add(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    arithmetic(ArithOp::Add, args)
}

fn builtin_sub(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    arithmetic(ArithOp::Sub, args)
}

fn builtin_mul(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    arithmetic(ArithOp::Mul, args)
}

fn builtin_div(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    arithmetic(ArithOp::Div, args)
}

fn builtin_rem(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    arithmetic(ArithOp::Rem, args)
}

//
// Comparison
//

// Macro to generate numeric ordering comparisons. Two Integers compare
// exactly; any Real operand compares both as reals.
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
            let [left, right] = exactly::<2>($op_str, args)?;
            let result = match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => a $op b,
                _ => match (left.as_real(), right.as_real()) {
                    (Some(a), Some(b)) => a $op b,
                    (None, _) => {
                        return Err(Error::type_error($op_str, 0, "Number", left.type_name()))
                    }
                    (_, None) => {
                        return Err(Error::type_error($op_str, 1, "Number", right.type_name()))
                    }
                },
            };
            Ok(Value::from(result))
        }
    };
}

numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_ge, >=, ">=");
numeric_comparison!(builtin_le, <=, "<=");

fn builtin_eq(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [left, right] = exactly::<2>("==", args)?;
    Ok(Value::from(left == right))
}

fn builtin_ne(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [left, right] = exactly::<2>("!=", args)?;
    Ok(Value::from(left != right))
}

//
// Q-expression operations
//

/// Retag the argument list as a Q-expression
fn builtin_list(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::QExpression(args))
}

fn builtin_head(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [list] = exactly::<1>("head", args)?;
    let mut items = expect_qexpr("head", 0, list)?;
    non_empty("head", 0, &items)?;
    items.truncate(1);
    Ok(Value::QExpression(items))
}

fn builtin_tail(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [list] = exactly::<1>("tail", args)?;
    let mut items = expect_qexpr("tail", 0, list)?;
    non_empty("tail", 0, &items)?;
    items.remove(0);
    Ok(Value::QExpression(items))
}

fn builtin_join(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let lists = args
        .into_iter()
        .enumerate()
        .map(|(i, arg)| expect_qexpr("join", i, arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::QExpression(lists.into_iter().flatten().collect()))
}

/// Retag a Q-expression as an S-expression and evaluate it
fn builtin_eval(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [list] = exactly::<1>("eval", args)?;
    let items = expect_qexpr("eval", 0, list)?;
    ev.try_eval(Value::SExpression(items))
}

//
// Definitions
//

/// Where a definition form binds its symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefineMode {
    /// `def`: root scope, unprotected
    Global,
    /// `pdef`: root scope, protected
    GlobalProtected,
    /// `=`: innermost scope, unprotected
    Local,
}

impl DefineMode {
    fn name(self) -> &'static str {
        match self {
            DefineMode::Global => "def",
            DefineMode::GlobalProtected => "pdef",
            DefineMode::Local => "=",
        }
    }

    fn is_blocked(self, env: &Environment, symbol: &str) -> bool {
        match self {
            DefineMode::Global => env.is_protected_globally(symbol),
            DefineMode::GlobalProtected => env.root().contains(symbol),
            DefineMode::Local => env.is_protected_locally(symbol),
        }
    }

    fn bind(self, env: &mut Environment, symbol: &str, value: Value) -> Result<(), Error> {
        match self {
            DefineMode::Global => env.define_global(symbol, value),
            DefineMode::GlobalProtected => env.define_global_protected(symbol, value),
            DefineMode::Local => env.bind(symbol, value),
        }
    }
}

/// The symbols named by a definition target: a bare symbol, a Q-expression
/// of symbols, or an S-expression evaluating to either
fn definition_targets(ev: &mut Evaluator, name: &str, target: Value) -> Result<Vec<String>, Error> {
    let target = match target {
        Value::SExpression(_) => ev.try_eval(target)?,
        other => other,
    };
    match target {
        Value::Symbol(symbol) => Ok(vec![symbol]),
        Value::QExpression(items) => expect_symbols(name, 0, items),
        other => Err(Error::type_error(name, 0, "Q-Expression", other.type_name())),
    }
}

/// Fail if any target is blocked. A protected definition also claims each
/// name, so a name repeated in the same `pdef` is blocked too.
fn check_targets(env: &Environment, mode: DefineMode, symbols: &[String]) -> Result<(), Error> {
    for (i, symbol) in symbols.iter().enumerate() {
        let repeated = mode == DefineMode::GlobalProtected && symbols[..i].contains(symbol);
        if repeated || mode.is_blocked(env, symbol) {
            return Err(Error::ProtectedRedefinition(symbol.clone()));
        }
    }
    Ok(())
}

/// Shared implementation of `def`, `pdef` and `=`. Operands arrive
/// unevaluated; the values are evaluated here, in order, and nothing is bound
/// until every check has passed.
fn define(ev: &mut Evaluator, mode: DefineMode, args: Vec<Value>) -> Result<Value, Error> {
    let name = mode.name();
    let mut args = args.into_iter();
    let Some(target) = args.next() else {
        return Err(Error::arity_error(name, Arity::AtLeast(2), 0));
    };
    let symbols = definition_targets(ev, name, target)?;
    let operands: Vec<Value> = args.collect();

    if symbols.len() != operands.len() {
        return Err(Error::SymbolArityMismatch {
            function: name.to_owned(),
            symbols: symbols.len(),
            values: operands.len(),
        });
    }

    check_targets(ev.environment(), mode, &symbols)?;

    let mut values = Vec::with_capacity(operands.len());
    for operand in operands {
        values.push(ev.try_eval(operand)?);
    }

    // Evaluating the values may itself have defined one of the targets
    check_targets(ev.environment(), mode, &symbols)?;

    for (symbol, value) in symbols.iter().zip(values) {
        mode.bind(ev.environment_mut(), symbol, value)?;
    }
    Ok(Value::Empty)
}

fn builtin_def(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    define(ev, DefineMode::Global, args)
}

fn builtin_pdef(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    define(ev, DefineMode::GlobalProtected, args)
}

fn builtin_put(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    define(ev, DefineMode::Local, args)
}

/// Remove bindings by name. Protected bindings are removed as well.
fn builtin_undef(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [list] = exactly::<1>("undef", args)?;
    let symbols = expect_symbols("undef", 0, expect_qexpr("undef", 0, list)?)?;
    for symbol in &symbols {
        ev.environment_mut().remove(symbol);
    }
    Ok(Value::Empty)
}

fn builtin_lambda(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [formals, body] = exactly::<2>("\\", args)?;
    let formals = expect_qexpr("\\", 0, formals)?;
    let body = expect_qexpr("\\", 1, body)?;
    let formals = expect_symbols("\\", 0, formals)?;
    Ok(Value::lambda(formals, body))
}

//
// Control flow
//

fn builtin_if(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let mut args = args.into_iter();
    let condition = match args.next() {
        Some(Value::Integer(n)) => n,
        Some(other) => return Err(Error::type_error("if", 0, "Integer", other.type_name())),
        None => return Err(Error::arity_error("if", Arity::Range(2, 3), 0)),
    };
    let then_branch = match args.next() {
        Some(branch) => expect_qexpr("if", 1, branch)?,
        None => return Err(Error::arity_error("if", Arity::Range(2, 3), 1)),
    };
    let else_branch = args
        .next()
        .map(|branch| expect_qexpr("if", 2, branch))
        .transpose()?;

    if condition != 0 {
        ev.try_eval(Value::SExpression(then_branch))
    } else {
        match else_branch {
            Some(branch) => ev.try_eval(Value::SExpression(branch)),
            None => Ok(Value::QExpression(Vec::new())),
        }
    }
}

//
// Strings, I/O and host interaction
//

fn builtin_strcat(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let mut result = String::new();
    for (i, arg) in args.into_iter().enumerate() {
        result.push_str(&expect_string("strcat", i, arg)?);
    }
    Ok(Value::String(result))
}

fn builtin_print(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Ok)
}

/// Raise an error value carrying the given message
fn builtin_error(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [message] = exactly::<1>("error", args)?;
    Err(Error::Raised(expect_string("error", 0, message)?))
}

fn builtin_exit(_ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    match args.into_iter().next() {
        None => Ok(Value::Quit(0)),
        Some(Value::Integer(code)) => Ok(Value::Quit(code)),
        Some(other) => Err(Error::type_error("exit", 0, "Integer", other.type_name())),
    }
}

fn builtin_pool_stats(ev: &mut Evaluator, _args: Vec<Value>) -> Result<Value, Error> {
    let stats = ev.pool_stats();
    let counters = [
        stats.pools_created,
        stats.chunks_allocated,
        stats.chunks_allocated_lifetime,
        stats.high_watermark,
    ];
    Ok(Value::QExpression(
        counters
            .into_iter()
            .map(|n| Value::Integer(IntegerType::try_from(n).unwrap_or(IntegerType::MAX)))
            .collect(),
    ))
}

#[cfg(feature = "parser")]
fn builtin_load(ev: &mut Evaluator, args: Vec<Value>) -> Result<Value, Error> {
    let [path] = exactly::<1>("load", args)?;
    let path = expect_string("load", 0, path)?;
    ev.load_file(&path)
}

/// Global registry of all built-in operations, in registration order.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn op(name: &'static str, kind: OpKind, arity: Arity, func: OperationFn) -> BuiltinOp {
        BuiltinOp {
            name,
            kind,
            arity,
            func,
        }
    }
    use OpKind::{Function as Fun, Macro};

    #[cfg_attr(not(feature = "parser"), expect(unused_mut))]
    let mut ops = vec![
        // Host interaction
        op("print", Fun, Arity::Any, builtin_print),
        op("error", Fun, Arity::Exact(1), builtin_error),
        op("exit", Fun, Arity::Range(0, 1), builtin_exit),
        // Variables and functions
        op("def", Macro, Arity::AtLeast(2), builtin_def),
        op("pdef", Macro, Arity::AtLeast(2), builtin_pdef),
        op("=", Macro, Arity::AtLeast(2), builtin_put),
        op("undef", Fun, Arity::Exact(1), builtin_undef),
        op("\\", Fun, Arity::Exact(2), builtin_lambda),
        // List functions
        op("list", Fun, Arity::Any, builtin_list),
        op("head", Fun, Arity::Exact(1), builtin_head),
        op("tail", Fun, Arity::Exact(1), builtin_tail),
        op("eval", Fun, Arity::Exact(1), builtin_eval),
        op("join", Fun, Arity::AtLeast(1), builtin_join),
        // Strings and introspection
        op("strcat", Fun, Arity::AtLeast(1), builtin_strcat),
        op("mem-pool-stats", Fun, Arity::Exact(0), builtin_pool_stats),
        // Arithmetic; only `-` accepts a single operand
        op("+", Fun, Arity::AtLeast(2), builtin_add),
        op("-", Fun, Arity::AtLeast(1), builtin_sub),
        op("*", Fun, Arity::AtLeast(2), builtin_mul),
        op("/", Fun, Arity::AtLeast(2), builtin_div),
        op("%", Fun, Arity::AtLeast(2), builtin_rem),
        // Conditionals and comparison
        op("if", Fun, Arity::Range(2, 3), builtin_if),
        op("==", Fun, Arity::Exact(2), builtin_eq),
        op("!=", Fun, Arity::Exact(2), builtin_ne),
        op(">", Fun, Arity::Exact(2), builtin_gt),
        op("<", Fun, Arity::Exact(2), builtin_lt),
        op(">=", Fun, Arity::Exact(2), builtin_ge),
        op("<=", Fun, Arity::Exact(2), builtin_le),
    ];

    #[cfg(feature = "parser")]
    ops.push(op("load", Fun, Arity::Exact(1), builtin_load));

    ops
});

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.name, op)).collect()
    });

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

/// Create a root environment with every builtin bound as a protected name
pub fn create_global_env() -> Environment {
    let mut env = Environment::new();
    for op in get_builtin_ops() {
        let installed = env.define_global_protected(op.name, op.to_value());
        // Names in the registry are unique
        debug_assert!(installed.is_ok(), "duplicate builtin '{}'", op.name);
    }
    env
}
