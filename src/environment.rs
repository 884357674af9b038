//! Symbol tables.
//!
//! A [`Scope`] is a single ordered table of bindings, each optionally
//! protected against redefinition. An [`Environment`] is the chain of scopes
//! visible to the evaluator: index 0 is the root (global) scope and every
//! other scope's parent is the one below it. Invoking a closure pushes the
//! closure's own scope on top of the caller's, so the chain always mirrors
//! the active call stack.

use crate::Error;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    name: String,
    value: Value,
    protected: bool,
}

/// An ordered name -> value table. Names are unique within a scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    bindings: Vec<Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            bindings: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name && b.protected)
    }

    /// Replace an unprotected binding or insert a new unprotected one
    pub fn bind(&mut self, name: &str, value: Value) -> Result<(), Error> {
        match self.position(name) {
            Some(idx) if self.bindings[idx].protected => {
                Err(Error::ProtectedRedefinition(name.to_owned()))
            }
            Some(idx) => {
                self.bindings[idx].value = value;
                Ok(())
            }
            None => {
                self.bindings.push(Binding {
                    name: name.to_owned(),
                    value,
                    protected: false,
                });
                Ok(())
            }
        }
    }

    /// Insert a protected binding; never overwrites an existing name
    pub fn bind_protected(&mut self, name: &str, value: Value) -> Result<(), Error> {
        if self.contains(name) {
            return Err(Error::ProtectedRedefinition(name.to_owned()));
        }
        self.bindings.push(Binding {
            name: name.to_owned(),
            value,
            protected: true,
        });
        Ok(())
    }

    /// Remove a binding regardless of protection, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name)
            .map(|idx| self.bindings.remove(idx).value)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|b| (b.name.as_str(), &b.value))
    }
}

/// The chain of scopes visible to the evaluator, innermost last
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment holding only an empty root scope
    pub fn new() -> Self {
        Environment {
            scopes: vec![Scope::new()],
        }
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        // The root scope is never popped (see `leave`)
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn root_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    pub fn root(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Number of scopes in the chain, the root included
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Find `name` walking from the innermost scope to the root. The caller
    /// receives its own copy of the stored value.
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    pub fn bind(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.innermost_mut().bind(name, value)
    }

    pub fn bind_protected(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.innermost_mut().bind_protected(name, value)
    }

    /// `bind` on the root scope, whatever the current depth
    pub fn define_global(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.root_mut().bind(name, value)
    }

    /// `bind_protected` on the root scope, whatever the current depth
    pub fn define_global_protected(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.root_mut().bind_protected(name, value)
    }

    /// Whether binding `name` in the innermost scope would hit a protected entry
    pub(crate) fn is_protected_locally(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.is_protected(name))
    }

    pub(crate) fn is_protected_globally(&self, name: &str) -> bool {
        self.root().is_protected(name)
    }

    /// Remove the first binding of `name` found walking toward the root.
    ///
    /// Protection is not consulted: protected bindings can be removed too.
    pub fn remove(&mut self, name: &str) -> bool {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.remove(name))
            .is_some()
    }

    /// Push a fresh empty scope whose parent is the current innermost one
    pub fn child(&mut self) {
        self.enter(Scope::new());
    }

    /// Push an existing scope (a closure's captured scope) on top of the chain
    pub fn enter(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Pop the innermost scope. The root scope stays in place.
    pub fn leave(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// All visible bindings, inner scopes shadowing outer ones, sorted by name
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut visible: Vec<(String, Value)> = Vec::new();
        for scope in self.scopes.iter().rev() {
            for (name, value) in scope.iter() {
                if !visible.iter().any(|(seen, _)| seen == name) {
                    visible.push((name.to_owned(), value.clone()));
                }
            }
        }
        visible.sort_by(|a, b| a.0.cmp(&b.0));
        visible
    }
}
