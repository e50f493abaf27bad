//! Check compilation.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::checks::types::{Check, KubeVersion};
use crate::expr::{Program, Type};
use crate::validator::env::{VARIABLES, check_env};
use crate::validator::podspec::matches_template_resource;
use crate::validator::ValidatorError;

/// A named variable program.
#[derive(Debug, Clone)]
pub struct CompiledVariable {
    pub name: String,
    pub program: Program,
}

/// A check with every expression compiled. Immutable apart from the cluster
/// context setters, and safe to share between threads.
#[derive(Debug, Clone)]
pub struct CompiledCheck {
    pub(crate) check: Check,
    pub(crate) validations: Vec<Program>,
    pub(crate) variables: Vec<CompiledVariable>,
    pub(crate) requires_template: bool,
    pub(crate) api_versions: Vec<String>,
    pub(crate) kube_version: Option<KubeVersion>,
}

impl CompiledCheck {
    pub fn check(&self) -> &Check {
        &self.check
    }

    pub fn validations(&self) -> &[Program] {
        &self.validations
    }

    pub fn variables(&self) -> &[CompiledVariable] {
        &self.variables
    }

    pub fn requires_template(&self) -> bool {
        self.requires_template
    }

    pub fn api_versions(&self) -> &[String] {
        &self.api_versions
    }

    pub fn kube_version(&self) -> Option<&KubeVersion> {
        self.kube_version.as_ref()
    }

    pub fn set_api_versions(&mut self, api_versions: Vec<String>) {
        self.api_versions = api_versions;
    }

    pub fn set_kube_version(&mut self, kube_version: Option<KubeVersion>) {
        self.kube_version = kube_version;
    }
}

/// Type-check and compile every expression of `check`.
///
/// `cost_limit` bounds each evaluation; `0` disables the ceiling.
pub fn compile(
    check: &Check,
    api_versions: &[String],
    kube_version: Option<&KubeVersion>,
    cost_limit: u64,
) -> Result<CompiledCheck, ValidatorError> {
    if check.validations.is_empty() {
        return Err(ValidatorError::InvalidCheck(
            "a check must have at least 1 validation".to_string(),
        ));
    }

    let env = check_env(check);

    let mut variables = Vec::with_capacity(check.variables.len());
    let mut seen = HashSet::new();
    for variable in &check.variables {
        if !seen.insert(variable.name.as_str()) {
            return Err(ValidatorError::Variable {
                name: variable.name.clone(),
                message: "duplicate variable name".to_string(),
            });
        }
        let program = env
            .compile(&variable.expression)
            .map_err(|e| ValidatorError::Variable {
                name: variable.name.clone(),
                message: e.to_string(),
            })?;
        variables.push(CompiledVariable {
            name: variable.name.clone(),
            program: program.with_cost_limit(cost_limit),
        });
    }

    if let Some((name, cycle)) = find_cycle(&variables) {
        return Err(ValidatorError::Variable {
            name,
            message: format!("reference cycle {}", cycle.join(" -> ")),
        });
    }

    let mut validations = Vec::with_capacity(check.validations.len());
    for (index, validation) in check.validations.iter().enumerate() {
        let program = env
            .compile_expecting(&validation.expression, &Type::Bool)
            .map_err(|e| ValidatorError::Validation {
                index,
                message: e.to_string(),
            })?;
        validations.push(program.with_cost_limit(cost_limit));
    }

    log::trace!(
        "Compiled check {} ({} validations, {} variables)",
        check.id,
        validations.len(),
        variables.len()
    );

    Ok(CompiledCheck {
        check: check.clone(),
        validations,
        variables,
        requires_template: matches_template_resource(check.rules()),
        api_versions: api_versions.to_vec(),
        kube_version: kube_version.cloned(),
    })
}

/// First variable, in declaration order, that reaches itself through
/// static `variables.<name>` references. Returns the name and the cycle.
fn find_cycle(variables: &[CompiledVariable]) -> Option<(String, Vec<String>)> {
    let declared: BTreeSet<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    let edges: HashMap<&str, Vec<String>> = variables
        .iter()
        .map(|v| {
            let refs = v
                .program
                .expr()
                .namespace_references(VARIABLES)
                .into_iter()
                .filter(|name| declared.contains(name.as_str()))
                .collect();
            (v.name.as_str(), refs)
        })
        .collect();

    for variable in variables {
        let start = variable.name.as_str();
        let mut path = vec![start.to_string()];
        let mut visited = HashSet::new();
        if reaches(start, start, &edges, &mut path, &mut visited) {
            return Some((start.to_string(), path));
        }
    }
    None
}

fn reaches<'a>(
    target: &str,
    current: &'a str,
    edges: &'a HashMap<&'a str, Vec<String>>,
    path: &mut Vec<String>,
    visited: &mut HashSet<&'a str>,
) -> bool {
    if !visited.insert(current) {
        return false;
    }
    let Some(next) = edges.get(current) else {
        return false;
    };
    for name in next {
        path.push(name.clone());
        if name == target || reaches(target, name, edges, path, visited) {
            return true;
        }
        path.pop();
    }
    false
}
