//! Check compilation and evaluation against a single object.
//!
//! A [`CompiledCheck`] is built once per check and then evaluated against
//! every matched object:
//!
//! 1. the environment declares which inputs the expressions may use
//!    ([`env`]),
//! 2. [`compile`] type-checks variables and validations,
//! 3. [`CompiledCheck::validate`] binds the object, parameters, pod template
//!    and lazy variables, then runs validations in order.

pub mod activation;
pub mod compiler;
pub mod env;
pub mod fixtures;
pub mod podspec;

use crate::expr::{EvalError, Value};
use activation::EvaluationInput;
use thiserror::Error;

pub use compiler::{CompiledCheck, CompiledVariable, compile};
pub use fixtures::{FixtureFailure, run_fixtures};
pub use podspec::{WorkloadKind, all_containers, extract_template, has_template};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidatorError {
    #[error("invalid check: {0}")]
    InvalidCheck(String),

    #[error("variables[{name:?}].expression: {message}")]
    Variable { name: String, message: String },

    #[error("validations[{index}].expression: {message}")]
    Validation { index: usize, message: String },

    #[error("{0}")]
    Evaluation(#[from] EvalError),

    #[error("unsupported kind {0:?}: no pod template")]
    UnsupportedKind(String),

    #[error("invalid pod template: {0}")]
    Template(String),
}

/// Result of evaluating one check against one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    /// Message of the first failing validation, empty when passed.
    pub message: String,
}

impl Outcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

fn to_value<T: serde::Serialize>(what: &str, value: &T) -> Result<Value, ValidatorError> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| ValidatorError::Template(format!("{}: {}", what, e)))
}

impl CompiledCheck {
    /// Evaluate the check against `object`.
    ///
    /// `params` overrides the check's default parameters. Validations run in
    /// declared order and stop at the first one that is not `true`.
    pub fn validate(
        &self,
        object: &serde_json::Value,
        params: Option<&serde_json::Value>,
    ) -> Result<Outcome, ValidatorError> {
        let params = params.unwrap_or(&self.check.params);

        let mut input = EvaluationInput::new(&self.variables);
        input.bind(env::OBJECT, Value::from(object));
        input.bind(env::PARAMS, Value::from(params));
        input.bind(env::API_VERSIONS, Value::from(self.api_versions.clone()));
        input.bind(
            env::KUBE_VERSION,
            match &self.kube_version {
                Some(version) => to_value("kubeVersion", version)?,
                None => Value::Null,
            },
        );

        if self.requires_template && has_template(object) {
            let (meta, spec) = extract_template(object)?;
            let containers = all_containers(&spec);
            input.bind(env::POD_META, to_value("metadata", &meta)?);
            input.bind(env::POD_SPEC, to_value("spec", &spec)?);
            input.bind(env::ALL_CONTAINERS, to_value("containers", &containers)?);
        }

        for (index, program) in self.validations.iter().enumerate() {
            let value = program.eval(&input)?;
            if value != Value::Bool(true) {
                log::trace!("{}: validation {} failed", self.check.id, index);
                return Ok(Outcome::fail(self.check.validations[index].message.clone()));
            }
        }

        Ok(Outcome::pass())
    }
}
