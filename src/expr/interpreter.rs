//! Tree-walking evaluation with cost accounting.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};
use super::checker::FUNCTION_NAMESPACES;
use super::functions;
use super::value::{map_get, Key, Value};
use super::{Activation, EvalError};

pub(crate) struct Interpreter<'a> {
    activation: &'a dyn Activation,
    regexes: &'a HashMap<String, Regex>,
    cost_limit: u64,
    cost: u64,
    scopes: Vec<(String, Value)>,
}

pub(crate) fn no_such_key(key: impl std::fmt::Display) -> EvalError {
    EvalError::runtime(format!("no such key: {}", key))
}

pub(crate) fn no_overload(function: &str, args: &[&Value]) -> EvalError {
    let types: Vec<&str> = args.iter().map(|value| value.type_name()).collect();
    EvalError::runtime(format!(
        "no such overload: {} applied to ({})",
        function,
        types.join(", ")
    ))
}

fn wrap(value: Value, optional: bool) -> Value {
    if optional { Value::some(value) } else { value }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Uint(u) => Value::Uint(*u),
        Literal::Double(d) => Value::Double(*d),
        Literal::String(s) => Value::string(s),
    }
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        activation: &'a dyn Activation,
        regexes: &'a HashMap<String, Regex>,
        cost_limit: u64,
    ) -> Self {
        Self {
            activation,
            regexes,
            cost_limit,
            cost: 0,
            scopes: Vec::new(),
        }
    }

    fn charge(&mut self, units: u64) -> Result<(), EvalError> {
        self.cost = self.cost.saturating_add(units);
        if self.cost_limit > 0 && self.cost > self.cost_limit {
            return Err(EvalError::CostLimitExceeded);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find(|(scoped, _)| scoped == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.activation.resolve(name))
    }

    fn with_binding<T>(&mut self, name: &str, value: Value, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push((name.to_string(), value));
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_bool(&mut self, expr: &Expr, context: &str) -> Result<bool, EvalError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(no_overload(context, &[&other])),
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.charge(1)?;

        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| EvalError::runtime(format!("no such attribute: {}", name))),
            Expr::Select {
                operand,
                field,
                optional,
            } => {
                let operand = self.eval(operand)?;
                self.select(operand, field, *optional)
            }
            Expr::Index { operand, index } => {
                let operand = self.eval(operand)?;
                let index = self.eval(index)?;
                self.index(operand, index)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match (op, operand) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| EvalError::runtime("int overflow")),
                    (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
                    (UnaryOp::Not, other) => Err(no_overload("!_", &[&other])),
                    (UnaryOp::Neg, other) => Err(no_overload("-_", &[&other])),
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And | BinaryOp::Or => self.eval_logical(*op, lhs, rhs),
                _ => {
                    let lhs = self.eval(lhs)?;
                    let rhs = self.eval(rhs)?;
                    match (op, &lhs, &rhs) {
                        (BinaryOp::In, Value::String(key), Value::Namespace(namespace)) => {
                            Ok(Value::Bool(self.activation.has_lazy(namespace, key)))
                        }
                        _ => binary(*op, lhs, rhs),
                    }
                }
            },
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval_bool(condition, "_?_:_")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Map(entries) => {
                let mut map = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let key = Key::from_value(&key).ok_or_else(|| {
                        EvalError::runtime(format!("unsupported map key type: {}", key.type_name()))
                    })?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Has { operand, field } => {
                let operand = self.eval(operand)?;
                match operand {
                    Value::Map(map) => Ok(Value::Bool(map.contains_key(&Key::string(field)))),
                    Value::Namespace(namespace) => {
                        Ok(Value::Bool(self.activation.has_lazy(&namespace, field)))
                    }
                    other => Err(EvalError::runtime(format!(
                        "invalid type for field selection: {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Comprehension {
                kind,
                range,
                var,
                filter,
                body,
            } => self.eval_comprehension(*kind, range, var, filter.as_deref(), body),
            Expr::Call {
                target,
                function,
                args,
            } => self.eval_call(target.as_deref(), function, args),
        }
    }

    fn select(&mut self, operand: Value, field: &str, optional: bool) -> Result<Value, EvalError> {
        match operand {
            Value::Optional(None) => Ok(Value::none()),
            Value::Optional(Some(inner)) => self.select(inner.as_ref().clone(), field, true),
            Value::Namespace(namespace) => match self.activation.resolve_lazy(&namespace, field) {
                Some(result) => Ok(wrap(result?, optional)),
                None if optional => Ok(Value::none()),
                None => Err(no_such_key(field)),
            },
            Value::Map(map) => match map.get(&Key::string(field)) {
                Some(value) => Ok(wrap(value.clone(), optional)),
                None if optional => Ok(Value::none()),
                None => Err(no_such_key(field)),
            },
            other => Err(EvalError::runtime(format!(
                "type '{}' does not support field selection",
                other.type_name()
            ))),
        }
    }

    fn index(&mut self, operand: Value, index: Value) -> Result<Value, EvalError> {
        match (operand, index) {
            (Value::Optional(None), _) => Ok(Value::none()),
            (Value::Optional(Some(inner)), index) => {
                let value = self.index(inner.as_ref().clone(), index)?;
                Ok(wrap(value, true))
            }
            (Value::List(items), index) => {
                let position = match index {
                    Value::Int(i) => usize::try_from(i).ok(),
                    Value::Uint(u) => usize::try_from(u).ok(),
                    Value::Double(d) if d.fract() == 0.0 && d >= 0.0 => Some(d as usize),
                    other => return Err(no_overload("_[_]", &[&Value::List(items), &other])),
                };
                position
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| EvalError::runtime("index out of bounds"))
            }
            (Value::Namespace(namespace), Value::String(key)) => {
                match self.activation.resolve_lazy(&namespace, &key) {
                    Some(result) => result,
                    None => Err(no_such_key(key)),
                }
            }
            (Value::Map(map), index) => {
                let key = Key::from_value(&index).ok_or_else(|| {
                    EvalError::runtime(format!("unsupported key type: {}", index.type_name()))
                })?;
                map_get(&map, &key).cloned().ok_or_else(|| no_such_key(key))
            }
            (operand, index) => Err(no_overload("_[_]", &[&operand, &index])),
        }
    }

    /// `&&` and `||` are commutative with respect to errors: an error on one
    /// side is absorbed when the other side alone decides the result.
    fn eval_logical(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        let decisive = op == BinaryOp::Or;

        let left = self.eval(lhs);
        if matches!(left, Ok(Value::Bool(b)) if b == decisive) {
            return Ok(Value::Bool(decisive));
        }
        if matches!(&left, Err(e) if e.is_fatal()) {
            return left;
        }

        let right = self.eval(rhs);
        if matches!(right, Ok(Value::Bool(b)) if b == decisive) {
            return Ok(Value::Bool(decisive));
        }
        if matches!(&right, Err(e) if e.is_fatal()) {
            return right;
        }

        match (left, right) {
            (Ok(Value::Bool(_)), Ok(Value::Bool(_))) => Ok(Value::Bool(!decisive)),
            (Err(e), _) | (_, Err(e)) => Err(e),
            (Ok(l), Ok(r)) => Err(no_overload(&format!("_{}_", op.symbol()), &[&l, &r])),
        }
    }

    fn eval_comprehension(
        &mut self,
        kind: MacroKind,
        range: &Expr,
        var: &str,
        filter: Option<&Expr>,
        body: &Expr,
    ) -> Result<Value, EvalError> {
        let items: Vec<Value> = match self.eval(range)? {
            Value::List(items) => items.as_ref().clone(),
            Value::Map(map) => map.keys().map(Key::to_value).collect(),
            Value::Namespace(namespace) => self
                .namespace_keys(&namespace)?
                .iter()
                .map(|key| Value::string(key))
                .collect(),
            other => {
                return Err(EvalError::runtime(format!(
                    "{}() cannot range over {}",
                    kind.name(),
                    other.type_name()
                )));
            }
        };

        let context = kind.name();
        let mut deferred: Option<EvalError> = None;
        let mut matches = 0usize;
        let mut output = Vec::new();

        for item in items {
            self.charge(1)?;
            match kind {
                MacroKind::All | MacroKind::Exists => {
                    let decisive = kind == MacroKind::Exists;
                    match self.with_binding(var, item, |this| this.eval_bool(body, context)) {
                        Ok(b) if b == decisive => return Ok(Value::Bool(decisive)),
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            deferred.get_or_insert(e);
                        }
                    }
                }
                MacroKind::ExistsOne => {
                    if self.with_binding(var, item, |this| this.eval_bool(body, context))? {
                        matches += 1;
                    }
                }
                MacroKind::Filter => {
                    let keep =
                        self.with_binding(var, item.clone(), |this| this.eval_bool(body, context))?;
                    if keep {
                        output.push(item);
                    }
                }
                MacroKind::Map => {
                    let mapped = self.with_binding(var, item, |this| {
                        if let Some(filter) = filter {
                            if !this.eval_bool(filter, context)? {
                                return Ok(None);
                            }
                        }
                        this.eval(body).map(Some)
                    })?;
                    output.extend(mapped);
                }
            }
        }

        match kind {
            MacroKind::All | MacroKind::Exists => match deferred {
                Some(e) => Err(e),
                None => Ok(Value::Bool(kind == MacroKind::All)),
            },
            MacroKind::ExistsOne => Ok(Value::Bool(matches == 1)),
            MacroKind::Filter | MacroKind::Map => Ok(Value::list(output)),
        }
    }

    fn namespace_keys(&self, namespace: &str) -> Result<Vec<String>, EvalError> {
        self.activation.lazy_keys(namespace).ok_or_else(|| {
            EvalError::runtime(format!("namespace {} cannot be enumerated", namespace))
        })
    }

    fn eval_call(
        &mut self,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        if let Some(Expr::Ident(namespace)) = target {
            if FUNCTION_NAMESPACES.contains(&namespace.as_str()) && self.lookup(namespace).is_none()
            {
                let args = self.eval_all(args)?;
                self.charge_args(&args)?;
                if namespace == "sets" {
                    self.charge(set_comparison_cost(function, &args))?;
                }
                return functions::call_namespaced(namespace, function, &args);
            }
        }

        let receiver = target.map(|target| self.eval(target)).transpose()?;

        // The fallback of orValue() is only evaluated when it is needed.
        if let (Some(receiver), "orValue", [fallback]) = (&receiver, function, args) {
            return match receiver {
                Value::Optional(Some(value)) => Ok(value.as_ref().clone()),
                Value::Optional(None) => self.eval(fallback),
                other => Err(no_overload("orValue", &[other])),
            };
        }

        let args = self.eval_all(args)?;

        // Sizing a namespace counts its members without evaluating them.
        if function == "size" {
            if let (Some(Value::Namespace(namespace)), []) | (None, [Value::Namespace(namespace)]) =
                (&receiver, args.as_slice())
            {
                let len = self.namespace_keys(namespace)?.len();
                return Ok(Value::Int(len as i64));
            }
        }

        self.charge_args(&args)?;
        match receiver {
            Some(receiver) => {
                self.charge_args(std::slice::from_ref(&receiver))?;
                functions::call_member(function, &receiver, &args, self.regexes)
            }
            None => functions::call_global(function, &args, self.regexes),
        }
    }

    /// Functions over strings and lists cost proportionally to their input.
    fn charge_args(&mut self, args: &[Value]) -> Result<(), EvalError> {
        let units: u64 = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => (s.len() / 16) as u64,
                Value::List(items) => items.len() as u64,
                Value::Map(entries) => entries.len() as u64,
                _ => 0,
            })
            .sum();
        self.charge(units)
    }
}

/// Set functions compare every element of one list against the other.
fn set_comparison_cost(function: &str, args: &[Value]) -> u64 {
    let [Value::List(a), Value::List(b)] = args else {
        return 0;
    };
    let pairs = (a.len() as u64).saturating_mul(b.len() as u64);
    match function {
        "equivalent" => pairs.saturating_mul(2),
        "contains" | "intersects" => pairs,
        _ => 0,
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let overload = |lhs: &Value, rhs: &Value| no_overload(&format!("_{}_", op.symbol()), &[lhs, rhs]);
    let overflow = || EvalError::runtime(format!("{} overflow", lhs.type_name()));

    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!lhs.equals(&rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = lhs.compare(&rhs).ok_or_else(|| overload(&lhs, &rhs))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => match &rhs {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|item| lhs.equals(item)))),
            Value::Map(map) => Ok(Value::Bool(
                Key::from_value(&lhs).is_some_and(|key| map_get(map, &key).is_some()),
            )),
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_add(*b).map(Value::Uint).ok_or_else(overflow)
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(Arc::from(format!("{}{}", a, b)))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::Sub => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_sub(*b).map(Value::Uint).ok_or_else(overflow)
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::Mul => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_mul(*b).map(Value::Uint).ok_or_else(overflow)
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::Div => match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::runtime("division by zero"))
            }
            (Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a / b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::Rem => match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::runtime("modulus by zero"))
            }
            (Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a % b)),
            _ => Err(overload(&lhs, &rhs)),
        },
        BinaryOp::And | BinaryOp::Or => Err(overload(&lhs, &rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Env, Type};
    use serde_json::json;

    fn eval_with(source: &str, object: serde_json::Value) -> Result<Value, EvalError> {
        let env = Env::new().with_variable("object", Type::Dyn);
        let program = env.compile(source).expect("compiles");
        let mut bindings = HashMap::new();
        bindings.insert("object".to_string(), Value::from(object));
        program.eval(&bindings)
    }

    fn eval(source: &str) -> Result<Value, EvalError> {
        eval_with(source, json!({}))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval("7 / 2").unwrap(), Value::Int(3));
        assert_eq!(eval("7 % 3").unwrap(), Value::Int(1));
        assert_eq!(eval("1.5 + 1.0").unwrap(), Value::Double(2.5));
        assert_eq!(eval("'ab' + 'cd'").unwrap(), Value::string("abcd"));
        assert_eq!(
            eval("[1] + [2]").unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(eval("1 / 0"), Err(EvalError::runtime("division by zero")));
        assert_eq!(eval("1 % 0"), Err(EvalError::runtime("modulus by zero")));
        assert!(eval("9223372036854775807 + 1").is_err());
    }

    #[test]
    fn test_field_access() {
        let object = json!({"metadata": {"name": "web", "labels": {"app": "web"}}});
        assert_eq!(
            eval_with("object.metadata.name", object.clone()).unwrap(),
            Value::string("web")
        );
        assert_eq!(
            eval_with("object.metadata.labels['app'] == 'web'", object.clone()).unwrap(),
            Value::Bool(true)
        );
        let err = eval_with("object.spec.replicas", object).unwrap_err();
        assert_eq!(err.to_string(), "no such key: spec");
    }

    #[test]
    fn test_optional_select() {
        let object = json!({"spec": {"replicas": 2}});
        assert_eq!(
            eval_with("object.?spec.?replicas.orValue(1)", object.clone()).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            eval_with("object.?status.?ready.orValue(false)", object.clone()).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_with("object.?status.ready.hasValue()", object).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_has() {
        let object = json!({"spec": {"hostNetwork": true}});
        assert_eq!(eval_with("has(object.spec)", object.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("has(object.status)", object.clone()).unwrap(), Value::Bool(false));
        assert!(eval_with("has(object.status.phase)", object).is_err());
    }

    #[test]
    fn test_error_absorption() {
        let object = json!({});
        assert_eq!(
            eval_with("object.missing || true", object.clone()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("false && object.missing", object.clone()).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_with("object.missing && false", object.clone()).unwrap(),
            Value::Bool(false)
        );
        assert!(eval_with("object.missing || false", object).is_err());
    }

    #[test]
    fn test_cost_limit_not_absorbed() {
        let env = Env::new().with_variable("items", Type::list(Type::Int));
        let program = env
            .compile("items.all(i, i > 0) || true")
            .unwrap()
            .with_cost_limit(20);
        let mut bindings = HashMap::new();
        bindings.insert(
            "items".to_string(),
            Value::list((1..100).map(Value::Int).collect()),
        );
        assert_eq!(program.eval(&bindings), Err(EvalError::CostLimitExceeded));
    }

    #[test]
    fn test_comprehensions() {
        assert_eq!(eval("[1, 2, 3].all(x, x > 0)").unwrap(), Value::Bool(true));
        assert_eq!(eval("[1, 2, 3].exists(x, x > 2)").unwrap(), Value::Bool(true));
        assert_eq!(eval("[1, 2, 3].exists_one(x, x > 1)").unwrap(), Value::Bool(false));
        assert_eq!(
            eval("[1, 2, 3].filter(x, x != 2)").unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(3)])
        );
        assert_eq!(
            eval("[1, 2, 3].map(x, x > 1, x * 10)").unwrap(),
            Value::list(vec![Value::Int(20), Value::Int(30)])
        );
        assert_eq!(eval("{'a': 1}.all(k, k == 'a')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_all_absorbs_errors_when_decided() {
        let object = json!({"items": [{"a": 1}, {"b": 2}]});
        // The second element has no `a`, but the first already fails.
        assert_eq!(
            eval_with("object.items.all(i, i.a == 2)", object.clone()).unwrap(),
            Value::Bool(false)
        );
        assert!(eval_with("object.items.all(i, i.a == 1)", object).is_err());
    }

    #[test]
    fn test_numeric_comparisons_across_types() {
        assert_eq!(eval("1 == 1u").unwrap(), Value::Bool(true));
        assert_eq!(eval("2 < 2.5").unwrap(), Value::Bool(true));
        let object = json!({"spec": {"replicas": 3}});
        assert_eq!(
            eval_with("object.spec.replicas >= 3u", object).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(eval("'a' in ['a', 'b']").unwrap(), Value::Bool(true));
        assert_eq!(eval("'c' in {'a': 1}").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_set_comparisons_charge_per_pair() {
        let env = Env::new()
            .with_variable("a", Type::list(Type::Int))
            .with_variable("b", Type::list(Type::Int));
        let mut bindings = HashMap::new();
        bindings.insert("a".to_string(), Value::list((0..100).map(Value::Int).collect()));
        bindings.insert("b".to_string(), Value::list((100..200).map(Value::Int).collect()));

        for source in ["sets.contains(a, b)", "sets.intersects(a, b)", "sets.equivalent(a, b)"] {
            let limited = env.compile(source).unwrap().with_cost_limit(5_000);
            assert_eq!(limited.eval(&bindings), Err(EvalError::CostLimitExceeded), "{}", source);
            let roomy = env.compile(source).unwrap().with_cost_limit(50_000);
            assert_eq!(roomy.eval(&bindings), Ok(Value::Bool(false)), "{}", source);
        }
        assert_eq!(set_comparison_cost("equivalent", &[Value::list(vec![]), Value::Int(1)]), 0);
    }

    #[test]
    fn test_ternary() {
        assert_eq!(eval("1 > 2 ? 'yes' : 'no'").unwrap(), Value::string("no"));
    }

    #[test]
    fn test_or_value_fallback_is_lazy() {
        let object = json!({"spec": {"paused": true}});
        assert_eq!(
            eval_with("object.?spec.?paused.orValue(object.missing)", object).unwrap(),
            Value::Bool(true)
        );
    }
}
