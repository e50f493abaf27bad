//! Typed environment declarations for check expressions.

use crate::checks::types::{Check, ResourceRule};
use crate::expr::{Env, Type};
use crate::validator::podspec::matches_template_resource;

pub const OBJECT: &str = "object";
pub const PARAMS: &str = "params";
pub const POD_META: &str = "podMeta";
pub const POD_SPEC: &str = "podSpec";
pub const ALL_CONTAINERS: &str = "allContainers";
pub const API_VERSIONS: &str = "apiVersions";
pub const KUBE_VERSION: &str = "kubeVersion";
pub const VARIABLES: &str = "variables";

/// Declare the inputs visible to a check's expressions.
///
/// `object`, `apiVersions` and `kubeVersion` are always present. `params`
/// and `variables` only exist when the check uses them, and the pod template
/// inputs only when a rule selects a workload resource.
pub fn build_env(rules: &[ResourceRule], has_variables: bool, has_params: bool) -> Env {
    let mut env = Env::new()
        .with_variable(OBJECT, Type::Dyn)
        .with_variable(API_VERSIONS, Type::list(Type::String))
        .with_variable(KUBE_VERSION, Type::Dyn);

    if has_params {
        env = env.with_variable(PARAMS, Type::Dyn);
    }
    if has_variables {
        env = env.with_variable(VARIABLES, Type::map(Type::String, Type::Dyn));
    }
    if matches_template_resource(rules) {
        env = env
            .with_variable(POD_META, Type::Dyn)
            .with_variable(POD_SPEC, Type::Dyn)
            .with_variable(ALL_CONTAINERS, Type::list(Type::Dyn));
    }
    env
}

pub fn check_env(check: &Check) -> Env {
    build_env(check.rules(), !check.variables.is_empty(), check.has_params())
}
