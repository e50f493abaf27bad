//! Check expression language.
//!
//! A typed subset of CEL, enough to write compliance checks over
//! Kubernetes objects:
//!
//! - **Parsing** with `nom` into an [`ast::Expr`] tree (macros expanded)
//! - **Type checking** against an [`Env`] of declared inputs, so that
//!   undeclared names and impossible operator overloads fail at compile time
//! - **Evaluation** by a tree-walking interpreter with a cost ceiling
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use kubescan::expr::{Env, Type, Value};
//!
//! let env = Env::new().with_variable("replicas", Type::Int);
//! let program = env.compile_expecting("replicas >= 2", &Type::Bool).unwrap();
//!
//! let mut bindings = HashMap::new();
//! bindings.insert("replicas".to_string(), Value::Int(3));
//! assert_eq!(program.eval(&bindings).unwrap(), Value::Bool(true));
//! ```

pub mod ast;
mod checker;
mod functions;
mod interpreter;
pub mod parser;
pub mod quantity;
pub mod types;
pub mod value;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use regex::Regex;

pub use parser::ParseError;
pub use quantity::Quantity;
pub use types::Type;
pub use value::{Key, Value};

use ast::Expr;
use interpreter::Interpreter;

/// Errors raised while turning source text into a [`Program`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(#[from] ParseError),

    #[error("type-check error: {0}")]
    Type(String),

    #[error("must evaluate to {expected}, found {found}")]
    ResultType { expected: Type, found: Type },

    #[error("invalid regular expression {pattern:?}: {message}")]
    Regex { pattern: String, message: String },
}

/// Errors raised while evaluating a [`Program`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("{0}")]
    Runtime(String),

    #[error("operation cancelled: actual cost limit exceeded")]
    CostLimitExceeded,

    #[error("variable {name:?} fails to evaluate: {message}")]
    Variable { name: String, message: String },
}

impl EvalError {
    pub fn runtime(message: impl Into<String>) -> Self {
        EvalError::Runtime(message.into())
    }

    /// Fatal errors are never absorbed by `&&` / `||`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::CostLimitExceeded)
    }
}

/// Named inputs an expression may reference, with their types.
#[derive(Debug, Clone, Default)]
pub struct Env {
    declarations: BTreeMap<String, Type>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with type `ty`, replacing any earlier declaration.
    pub fn with_variable(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.declarations.insert(name.into(), ty);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.declarations.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }

    /// Parse and type-check `source`. Any result type is accepted.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        let expr = parser::parse_expression(source)?;
        let output = checker::check(&expr, self).map_err(CompileError::Type)?;

        let mut regexes = HashMap::new();
        for pattern in expr.literal_patterns() {
            let regex = Regex::new(&pattern).map_err(|e| CompileError::Regex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            regexes.insert(pattern, regex);
        }

        Ok(Program {
            expr,
            output,
            cost_limit: 0,
            regexes: Arc::new(regexes),
        })
    }

    /// Like [`Env::compile`], but the result type must be exactly `expected`.
    /// A `dyn` result does not satisfy a concrete expectation.
    pub fn compile_expecting(&self, source: &str, expected: &Type) -> Result<Program, CompileError> {
        let program = self.compile(source)?;
        if program.output_type() != expected {
            return Err(CompileError::ResultType {
                expected: expected.clone(),
                found: program.output,
            });
        }
        Ok(program)
    }
}

/// A compiled, immutable expression. Cheap to clone and safe to share
/// between threads.
#[derive(Debug, Clone)]
pub struct Program {
    expr: Expr,
    output: Type,
    cost_limit: u64,
    regexes: Arc<HashMap<String, Regex>>,
}

impl Program {
    /// Bound the evaluation cost. `0` disables the ceiling.
    pub fn with_cost_limit(mut self, cost_limit: u64) -> Self {
        self.cost_limit = cost_limit;
        self
    }

    pub fn output_type(&self) -> &Type {
        &self.output
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn cost_limit(&self) -> u64 {
        self.cost_limit
    }

    /// Evaluate against `activation`. Every call starts with a fresh cost
    /// budget.
    pub fn eval(&self, activation: &dyn Activation) -> Result<Value, EvalError> {
        Interpreter::new(activation, &self.regexes, self.cost_limit).eval(&self.expr)
    }
}

/// Supplies values for identifiers during evaluation.
pub trait Activation {
    /// Value bound to a top-level identifier.
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Member `key` of a [`Value::Namespace`] handle. `None` means the
    /// member does not exist.
    fn resolve_lazy(&self, namespace: &str, key: &str) -> Option<Result<Value, EvalError>> {
        let _ = (namespace, key);
        None
    }

    /// Whether the namespace declares `key`, without evaluating it.
    fn has_lazy(&self, namespace: &str, key: &str) -> bool {
        let _ = (namespace, key);
        false
    }

    /// Member names of a namespace in declaration order. Listing them must
    /// not evaluate any member.
    fn lazy_keys(&self, namespace: &str) -> Option<Vec<String>> {
        let _ = namespace;
        None
    }
}

impl Activation for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}
