//! Lexical scopes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// One scope in the chain.
///
/// Lookups walk outward through `parent`. `var` declarations land in the
/// nearest scope marked as a function scope; `let` and `const` land in the
/// scope they are written in.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
    function_scope: bool,
}

/// Outcome of assigning to a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    Done,
    Undeclared,
    Constant,
}

impl Scope {
    pub fn global() -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: None,
            function_scope: true,
        })
    }

    pub fn function(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            function_scope: true,
        })
    }

    pub fn block(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            function_scope: false,
        })
    }

    /// Declare in this scope, replacing any earlier binding of the same name.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Declare a `var` in the enclosing function scope. An existing binding
    /// keeps its value unless `value` is given.
    pub fn declare_var(self: &Rc<Self>, name: &str, value: Option<Value>) {
        let target = self.function_root();
        let mut vars = target.vars.borrow_mut();
        match (vars.get_mut(name), value) {
            (Some(binding), Some(value)) => binding.value = value,
            (Some(_), None) => {}
            (None, value) => {
                vars.insert(
                    name.to_string(),
                    Binding {
                        value: value.unwrap_or_default(),
                        mutable: true,
                    },
                );
            }
        }
    }

    fn function_root(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = Rc::clone(self);
        while !scope.function_scope {
            match &scope.parent {
                Some(parent) => scope = Rc::clone(parent),
                None => break,
            }
        }
        scope
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn assign(&self, name: &str, value: Value) -> Assign {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Assign::Constant;
            }
            binding.value = value;
            return Assign::Done;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Assign::Undeclared,
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}
