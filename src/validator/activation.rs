//! Per-object evaluation bindings with lazily computed variables.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::expr::{Activation, EvalError, Value};
use crate::validator::compiler::CompiledVariable;
use crate::validator::env::VARIABLES;

enum Slot {
    Evaluating,
    Ready(Result<Value, EvalError>),
}

/// Bindings for one evaluation call. Variables are evaluated on first access
/// and memoized until the input is dropped.
pub struct EvaluationInput<'c> {
    bindings: HashMap<&'static str, Value>,
    variables: &'c [CompiledVariable],
    cache: RefCell<HashMap<String, Slot>>,
}

impl<'c> EvaluationInput<'c> {
    pub fn new(variables: &'c [CompiledVariable]) -> Self {
        Self {
            bindings: HashMap::new(),
            variables,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn bind(&mut self, name: &'static str, value: Value) {
        self.bindings.insert(name, value);
    }

    fn variable(&self, name: &str) -> Option<Result<Value, EvalError>> {
        let compiled = self.variables.iter().find(|v| v.name == name)?;

        let cached = self.cache.borrow().get(name).map(|slot| match slot {
            Slot::Evaluating => Err(EvalError::runtime(format!(
                "variable {:?} refers to itself",
                name
            ))),
            Slot::Ready(result) => result.clone(),
        });
        if cached.is_some() {
            return cached;
        }

        self.cache
            .borrow_mut()
            .insert(name.to_string(), Slot::Evaluating);
        let result = compiled.program.eval(self).map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                EvalError::Variable {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            }
        });
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Slot::Ready(result.clone()));
        Some(result)
    }
}

impl Activation for EvaluationInput<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if name == VARIABLES && !self.variables.is_empty() {
            return Some(Value::namespace(VARIABLES));
        }
        self.bindings.get(name).cloned()
    }

    fn resolve_lazy(&self, namespace: &str, key: &str) -> Option<Result<Value, EvalError>> {
        if namespace != VARIABLES {
            return None;
        }
        self.variable(key)
    }

    fn has_lazy(&self, namespace: &str, key: &str) -> bool {
        namespace == VARIABLES && self.variables.iter().any(|v| v.name == key)
    }

    fn lazy_keys(&self, namespace: &str) -> Option<Vec<String>> {
        if namespace != VARIABLES {
            return None;
        }
        Some(self.variables.iter().map(|v| v.name.clone()).collect())
    }
}
