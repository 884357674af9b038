//! Expression reduction and the function call protocol.
//!
//! [`Evaluator`] owns the whole runtime state: the scope chain, the memory
//! pool that holds intermediate results and the evaluation depth counter.
//! Reduction rules:
//!
//! - Symbols evaluate to a copy of their binding
//! - S-expressions are reduced by evaluating every element left to right
//!   (unless the head is a macro) and applying the head to the rest
//! - Everything else, Q-expressions included, evaluates to itself
//!
//! Internally failures travel as `Err`; [`Evaluator::eval`] turns the
//! recoverable ones into `Value::Error` so that errors are values to the host.

use crate::builtinops::{Arity, Builtin, OperationFn, create_global_env};
use crate::environment::Environment;
use crate::mempool::{ChunkRef, MemoryPool, PoolConfig, PoolStats};
use crate::value::{Closure, Function, REST_MARKER, Value};
use crate::{Error, MAX_EVAL_DEPTH};
use tracing::{debug, trace};

/// Remaining stack below which a reduction moves to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each fresh stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Runtime limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub pool: PoolConfig,
    /// Maximum nesting of S-expression reductions, closure bodies included
    pub max_eval_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool: PoolConfig::default(),
            max_eval_depth: MAX_EVAL_DEPTH,
        }
    }
}

pub struct Evaluator {
    env: Environment,
    pool: MemoryPool<Value>,
    config: Config,
    depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// An evaluator whose root scope holds every builtin, protected
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Evaluator {
            env: create_global_env(),
            pool: MemoryPool::with_config(config.pool),
            config,
            depth: 0,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Register a host function as a protected global builtin.
    ///
    /// # Example
    /// ```
    /// use nitrogen::builtinops::Arity;
    /// use nitrogen::evaluator::Evaluator;
    /// use nitrogen::value::Value;
    /// use nitrogen::Error;
    ///
    /// fn answer(_ev: &mut Evaluator, _args: Vec<Value>) -> Result<Value, Error> {
    ///     Ok(Value::Integer(42))
    /// }
    ///
    /// let mut ev = Evaluator::new();
    /// ev.register_builtin("answer", Arity::Exact(0), answer).unwrap();
    /// let answer = ev.environment().lookup("answer").unwrap();
    /// assert_eq!(ev.eval(Value::sexpr(vec![answer])).unwrap(), Value::Integer(42));
    /// ```
    pub fn register_builtin(
        &mut self,
        name: &'static str,
        arity: Arity,
        func: OperationFn,
    ) -> Result<(), Error> {
        let builtin = Builtin::new(name, arity, func);
        self.env
            .define_global_protected(name, Value::Function(Function::Builtin(builtin)))
    }

    /// Like [`Evaluator::register_builtin`], but the operation receives its
    /// arguments unevaluated
    pub fn register_macro(
        &mut self,
        name: &'static str,
        arity: Arity,
        func: OperationFn,
    ) -> Result<(), Error> {
        let builtin = Builtin::new(name, arity, func);
        self.env
            .define_global_protected(name, Value::Function(Function::Macro(builtin)))
    }

    /// Evaluate `expr` at the host boundary.
    ///
    /// Language errors come back as `Ok(Value::Error(..))`. Only fatal errors
    /// (pool exhaustion, depth limit) are returned as `Err`.
    pub fn eval(&mut self, expr: Value) -> Result<Value, Error> {
        match self.try_eval(expr) {
            Err(e) if !e.is_fatal() => {
                debug!(error = %e, "evaluation failed");
                Ok(Value::Error(e.to_string()))
            }
            result => result,
        }
    }

    /// Evaluate `expr`, reporting every failure as `Err`
    pub fn try_eval(&mut self, expr: Value) -> Result<Value, Error> {
        match expr {
            Value::Symbol(name) => self.env.lookup(&name),
            Value::SExpression(elements) => self.eval_sexpr(elements),
            // An error met during reduction terminates it
            Value::Error(message) => Err(Error::Raised(message)),
            other => Ok(other),
        }
    }

    fn eval_sexpr(&mut self, elements: Vec<Value>) -> Result<Value, Error> {
        if elements.is_empty() {
            return Ok(Value::SExpression(elements));
        }
        if self.depth >= self.config.max_eval_depth {
            return Err(Error::DepthExceeded(self.config.max_eval_depth));
        }

        self.depth += 1;
        let result =
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.reduce(elements));
        self.depth -= 1;
        result
    }

    fn reduce(&mut self, elements: Vec<Value>) -> Result<Value, Error> {
        let mut elements = elements.into_iter();
        let Some(first) = elements.next() else {
            return Ok(Value::SExpression(Vec::new()));
        };
        let head = self.try_eval(first)?;

        // Macros see their operands as written
        if let Value::Function(Function::Macro(op)) = head {
            return self.call(Function::Macro(op), elements.collect());
        }

        let mut parked = Vec::with_capacity(elements.len() + 1);
        let parked_ok = self.park_operands(head, elements, &mut parked);
        let mut values = self.pool.release_all(parked);
        parked_ok?;

        if values.len() == 1 && !values[0].is_function() {
            return Ok(values.remove(0));
        }
        match values.remove(0) {
            Value::Function(func) => self.call(func, values),
            other => Err(Error::NotAFunction(other.type_name())),
        }
    }

    /// Evaluate the operands left to right, holding every result in the pool
    /// until the call. The caller releases `parked` whatever the outcome.
    fn park_operands(
        &mut self,
        head: Value,
        operands: impl Iterator<Item = Value>,
        parked: &mut Vec<ChunkRef>,
    ) -> Result<(), Error> {
        parked.push(self.pool.acquire(head)?);
        for operand in operands {
            let value = self.try_eval(operand)?;
            parked.push(self.pool.acquire(value)?);
        }
        Ok(())
    }

    /// Apply a function value to already prepared arguments
    pub fn call(&mut self, func: Function, args: Vec<Value>) -> Result<Value, Error> {
        let result = match func {
            Function::Builtin(op) | Function::Macro(op) => {
                trace!(builtin = op.name, args = args.len(), "calling builtin");
                op.call(self, args)
            }
            Function::Closure(closure) => self.call_closure(closure, args),
        };
        match result {
            Ok(Value::Error(message)) => Err(Error::Raised(message)),
            other => other,
        }
    }

    /// Bind arguments to formals in order. `&` collects every remaining
    /// argument into a Q-expression bound to the formal after it. Running out
    /// of arguments early yields a partially applied closure.
    fn call_closure(&mut self, closure: Closure, args: Vec<Value>) -> Result<Value, Error> {
        let Closure {
            formals,
            body,
            mut scope,
        } = closure;
        let given = args.len();
        let total = formals.len();
        let mut cursor = 0;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let Some(formal) = formals.get(cursor) else {
                return Err(Error::TooManyArguments {
                    expected: total,
                    got: given,
                });
            };
            cursor += 1;

            if formal == REST_MARKER {
                let rest_formal = variadic_formal(&formals, cursor)?;
                let mut rest = vec![arg];
                rest.extend(args.by_ref());
                scope.bind(rest_formal, Value::QExpression(rest))?;
                cursor = total;
                break;
            }
            scope.bind(formal, arg)?;
        }

        // `&` reached with every argument consumed binds an empty list
        if formals.get(cursor).is_some_and(|formal| formal == REST_MARKER) {
            let rest_formal = variadic_formal(&formals, cursor + 1)?;
            scope.bind(rest_formal, Value::QExpression(Vec::new()))?;
            cursor = total;
        }

        if cursor < total {
            debug!(bound = cursor, remaining = total - cursor, "partial application");
            return Ok(Value::Function(Function::Closure(Closure {
                formals: formals[cursor..].to_vec(),
                body,
                scope,
            })));
        }

        trace!(formals = total, args = given, "entering closure body");
        self.env.enter(scope);
        let result = self.eval_sexpr(body);
        self.env.leave();
        result
    }
}

/// The single formal that must follow `&`, which sits just before `after`
fn variadic_formal(formals: &[String], after: usize) -> Result<&str, Error> {
    match formals.get(after..) {
        Some([name]) => Ok(name.as_str()),
        _ => Err(Error::MalformedVariadic),
    }
}

#[cfg(feature = "parser")]
impl Evaluator {
    /// Parse one unit of source and evaluate it as a single S-expression,
    /// the way the interactive prompt treats a line
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        let program = crate::parser::parse_program(source)?;
        self.eval(crate::ast::read(&program))
    }

    /// Evaluate every top-level expression of a source file in order.
    ///
    /// Error values are printed and evaluation continues. A `Quit` result
    /// stops the file and is handed back to the caller.
    pub fn load_file(&mut self, path: &str) -> Result<Value, Error> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::LoadFailed(format!("{path}: {e}")))?;
        let program = crate::parser::parse_program(&source)
            .map_err(|e| Error::LoadFailed(format!("{path}: {e}")))?;

        let Value::SExpression(expressions) = crate::ast::read(&program) else {
            return Err(Error::LoadFailed(format!("{path}: not a program")));
        };
        debug!(path, expressions = expressions.len(), "loading file");

        for expr in expressions {
            match self.eval(expr)? {
                error @ Value::Error(_) => println!("{error}"),
                quit @ Value::Quit(_) => return Ok(quit),
                _ => {}
            }
        }
        Ok(Value::Ok)
    }
}
