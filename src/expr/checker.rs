//! Static type checking of parsed expressions.
//!
//! Every identifier must be declared in the [`Env`] (or bound by an
//! enclosing comprehension) and every function must exist with a matching
//! overload. Operands typed `dyn` defer the overload check to evaluation.

use super::Env;
use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};
use super::types::Type;

/// Identifiers that name a function namespace rather than a value.
pub(crate) const FUNCTION_NAMESPACES: &[&str] = &["sets", "optional", "strings"];

const GLOBAL_FUNCTIONS: &[&str] = &[
    "size", "int", "uint", "double", "string", "bool", "dyn", "matches", "quantity", "isQuantity",
];

const MEMBER_FUNCTIONS: &[&str] = &[
    "size",
    "contains",
    "startsWith",
    "endsWith",
    "matches",
    "lowerAscii",
    "upperAscii",
    "trim",
    "split",
    "join",
    "replace",
    "indexOf",
    "lastIndexOf",
    "charAt",
    "substring",
    "reverse",
    "find",
    "findAll",
    "orValue",
    "hasValue",
    "value",
    "min",
    "max",
    "sum",
    "isSorted",
    "sign",
    "isInteger",
    "asInteger",
    "asApproximateFloat",
    "add",
    "sub",
    "compareTo",
    "isLessThan",
    "isGreaterThan",
];

const NAMESPACED_FUNCTIONS: &[&str] = &[
    "sets.contains",
    "sets.intersects",
    "sets.equivalent",
    "optional.of",
    "optional.ofNonZeroValue",
    "optional.none",
    "strings.quote",
];

/// Infer the type of `expr` in `env`.
pub(crate) fn check(expr: &Expr, env: &Env) -> Result<Type, String> {
    Checker {
        env,
        scopes: Vec::new(),
    }
    .check(expr)
}

struct Checker<'e> {
    env: &'e Env,
    scopes: Vec<(String, Type)>,
}

impl Checker<'_> {
    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find(|(scoped, _)| scoped == name)
            .map(|(_, ty)| ty.clone())
            .or_else(|| self.env.lookup(name).cloned())
    }

    fn check_all(&mut self, exprs: &[Expr]) -> Result<Vec<Type>, String> {
        exprs.iter().map(|expr| self.check(expr)).collect()
    }

    fn check(&mut self, expr: &Expr) -> Result<Type, String> {
        match expr {
            Expr::Literal(literal) => Ok(literal_type(literal)),
            Expr::Ident(name) => self.lookup(name).ok_or_else(|| undeclared(name)),
            Expr::Select {
                operand,
                optional,
                ..
            } => {
                let operand = self.check(operand)?;
                select_type(&operand, *optional)
            }
            Expr::Index { operand, index } => {
                let operand = self.check(operand)?;
                let index = self.check(index)?;
                index_type(&operand, &index)
            }
            Expr::Unary { op, operand } => {
                let operand = self.check(operand)?;
                match (op, &operand) {
                    (UnaryOp::Not, ty) if ty.may_be_bool() => Ok(Type::Bool),
                    (UnaryOp::Neg, Type::Int | Type::Double | Type::Dyn) => Ok(operand.clone()),
                    (UnaryOp::Not, _) => Err(no_overload("!_", &[operand.clone()])),
                    (UnaryOp::Neg, _) => Err(no_overload("-_", &[operand.clone()])),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.check(lhs)?;
                let rhs = self.check(rhs)?;
                binary_type(*op, &lhs, &rhs)
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.check(condition)?;
                if !condition.may_be_bool() {
                    return Err(no_overload("_?_:_", &[condition]));
                }
                let then = self.check(then)?;
                let otherwise = self.check(otherwise)?;
                Ok(then.join(&otherwise))
            }
            Expr::List(items) => {
                let types = self.check_all(items)?;
                Ok(Type::list(join_all(&types)))
            }
            Expr::Map(entries) => {
                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.check(key)?;
                    if !matches!(
                        key,
                        Type::Bool | Type::Int | Type::Uint | Type::String | Type::Dyn
                    ) {
                        return Err(format!("unsupported map key type '{}'", key));
                    }
                    keys.push(key);
                    values.push(self.check(value)?);
                }
                Ok(Type::map(join_all(&keys), join_all(&values)))
            }
            Expr::Has { operand, .. } => match self.check(operand)? {
                Type::Map(..) | Type::Dyn => Ok(Type::Bool),
                other => Err(format!(
                    "invalid argument to has() macro: type '{}' has no fields",
                    other
                )),
            },
            Expr::Comprehension {
                kind,
                range,
                var,
                filter,
                body,
            } => {
                let range = self.check(range)?;
                let element = match &range {
                    Type::List(element) => element.as_ref().clone(),
                    Type::Map(key, _) => key.as_ref().clone(),
                    Type::Dyn => Type::Dyn,
                    other => {
                        return Err(format!(
                            "expression of type '{}' cannot be the range of a comprehension",
                            other
                        ));
                    }
                };
                self.scopes.push((var.clone(), element.clone()));
                let result = self.check_comprehension(*kind, filter.as_deref(), body, element);
                self.scopes.pop();
                result
            }
            Expr::Call {
                target,
                function,
                args,
            } => self.check_call(target.as_deref(), function, args),
        }
    }

    fn check_comprehension(
        &mut self,
        kind: MacroKind,
        filter: Option<&Expr>,
        body: &Expr,
        element: Type,
    ) -> Result<Type, String> {
        if let Some(filter) = filter {
            let filter = self.check(filter)?;
            if !filter.may_be_bool() {
                return Err(format!(
                    "{}() filter must evaluate to bool, found '{}'",
                    kind.name(),
                    filter
                ));
            }
        }

        let body = self.check(body)?;
        match kind {
            MacroKind::Map => Ok(Type::list(body)),
            _ if !body.may_be_bool() => Err(format!(
                "{}() predicate must evaluate to bool, found '{}'",
                kind.name(),
                body
            )),
            MacroKind::Filter => Ok(Type::list(element)),
            MacroKind::All | MacroKind::Exists | MacroKind::ExistsOne => Ok(Type::Bool),
        }
    }

    fn check_call(
        &mut self,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<Type, String> {
        if let Some(Expr::Ident(namespace)) = target {
            if FUNCTION_NAMESPACES.contains(&namespace.as_str()) && self.lookup(namespace).is_none()
            {
                let args = self.check_all(args)?;
                return namespaced_function(namespace, function, &args);
            }
        }

        if target.is_none() && function == "has" {
            return Err("invalid argument to has() macro".to_string());
        }
        if target.is_some() {
            if let Some(kind) = MacroKind::from_name(function) {
                return Err(format!(
                    "{}() macro requires an identifier followed by an expression",
                    kind.name()
                ));
            }
        }

        let receiver = target.map(|target| self.check(target)).transpose()?;
        let args = self.check_all(args)?;
        match receiver {
            Some(receiver) => member_function(function, &receiver, &args),
            None => global_function(function, &args),
        }
    }
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Null => Type::Null,
        Literal::Bool(_) => Type::Bool,
        Literal::Int(_) => Type::Int,
        Literal::Uint(_) => Type::Uint,
        Literal::Double(_) => Type::Double,
        Literal::String(_) => Type::String,
    }
}

fn join_all(types: &[Type]) -> Type {
    match types.split_first() {
        Some((first, rest)) => rest.iter().fold(first.clone(), |acc, ty| acc.join(ty)),
        None => Type::Dyn,
    }
}

fn undeclared(name: &str) -> String {
    format!("undeclared reference to '{}'", name)
}

fn no_overload(function: &str, args: &[Type]) -> String {
    let args: Vec<String> = args.iter().map(|ty| ty.to_string()).collect();
    format!(
        "found no matching overload for '{}' applied to '({})'",
        function,
        args.join(", ")
    )
}

/// Field selection. Selecting through an optional keeps the result optional.
fn select_type(operand: &Type, optional: bool) -> Result<Type, String> {
    let (base, wrap) = match operand {
        Type::Optional(inner) => (inner.as_ref(), true),
        other => (other, optional),
    };
    let field = match base {
        Type::Map(key, value) if key.may_be_string() => value.as_ref().clone(),
        Type::Dyn => Type::Dyn,
        other => {
            return Err(format!(
                "type '{}' does not support field selection",
                other
            ));
        }
    };
    Ok(if wrap { Type::optional(field) } else { field })
}

fn index_type(operand: &Type, index: &Type) -> Result<Type, String> {
    match operand {
        Type::List(element) if matches!(index, Type::Int | Type::Uint | Type::Dyn) => {
            Ok(element.as_ref().clone())
        }
        Type::Map(key, value) if comparable(key, index) => Ok(value.as_ref().clone()),
        Type::Optional(inner) => index_type(inner, index).map(Type::optional),
        Type::Dyn => Ok(Type::Dyn),
        _ => Err(no_overload("_[_]", &[operand.clone(), index.clone()])),
    }
}

fn comparable(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Dyn, _) | (_, Type::Dyn) | (Type::Null, _) | (_, Type::Null) => true,
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (Type::List(x), Type::List(y)) => comparable(x, y),
        (Type::Map(k1, v1), Type::Map(k2, v2)) => comparable(k1, k2) && comparable(v1, v2),
        (Type::Optional(x), Type::Optional(y)) => comparable(x, y),
        (a, b) => a == b,
    }
}

fn orderable(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Dyn, _) | (_, Type::Dyn) => true,
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (Type::String, Type::String) | (Type::Bool, Type::Bool) => true,
        _ => false,
    }
}

fn binary_type(op: BinaryOp, lhs: &Type, rhs: &Type) -> Result<Type, String> {
    let fail = || {
        no_overload(
            &format!("_{}_", op.symbol()),
            &[lhs.clone(), rhs.clone()],
        )
    };

    match op {
        BinaryOp::Or | BinaryOp::And => {
            if lhs.may_be_bool() && rhs.may_be_bool() {
                Ok(Type::Bool)
            } else {
                Err(fail())
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            if comparable(lhs, rhs) {
                Ok(Type::Bool)
            } else {
                Err(fail())
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if orderable(lhs, rhs) {
                Ok(Type::Bool)
            } else {
                Err(fail())
            }
        }
        BinaryOp::In => match rhs {
            Type::List(element) if comparable(lhs, element) => Ok(Type::Bool),
            Type::Map(key, _) if comparable(lhs, key) => Ok(Type::Bool),
            Type::Dyn => Ok(Type::Bool),
            _ => Err(fail()),
        },
        BinaryOp::Add => match (lhs, rhs) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (Type::List(a), Type::List(b)) => Ok(Type::list(a.join(b))),
            (a, b) if a == b && (a.is_numeric() || *a == Type::String) => Ok(a.clone()),
            _ => Err(fail()),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => match (lhs, rhs) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (a, b) if a == b && a.is_numeric() => Ok(a.clone()),
            _ => Err(fail()),
        },
        BinaryOp::Rem => match (lhs, rhs) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (Type::Int, Type::Int) => Ok(Type::Int),
            (Type::Uint, Type::Uint) => Ok(Type::Uint),
            _ => Err(fail()),
        },
    }
}

fn is_sized(ty: &Type) -> bool {
    matches!(ty, Type::String | Type::List(_) | Type::Map(..) | Type::Dyn)
}

fn is_list_like(ty: &Type) -> bool {
    matches!(ty, Type::List(_) | Type::Dyn)
}

fn is_string_list(ty: &Type) -> bool {
    match ty {
        Type::List(element) => element.may_be_string(),
        Type::Dyn => true,
        _ => false,
    }
}

fn may_be_int(ty: &Type) -> bool {
    matches!(ty, Type::Int | Type::Dyn)
}

fn may_be_quantity(ty: &Type) -> bool {
    matches!(ty, Type::Quantity | Type::Dyn)
}

fn converts_from(ty: &Type, accepted: &[Type]) -> bool {
    ty.is_dyn() || accepted.contains(ty)
}

fn global_function(function: &str, args: &[Type]) -> Result<Type, String> {
    let result = match (function, args) {
        ("size", [arg]) if is_sized(arg) => Some(Type::Int),
        ("int", [arg]) if converts_from(arg, &[Type::Int, Type::Uint, Type::Double, Type::String]) => {
            Some(Type::Int)
        }
        ("uint", [arg]) if converts_from(arg, &[Type::Int, Type::Uint, Type::Double, Type::String]) => {
            Some(Type::Uint)
        }
        ("double", [arg])
            if converts_from(arg, &[Type::Int, Type::Uint, Type::Double, Type::String]) =>
        {
            Some(Type::Double)
        }
        ("string", [arg])
            if converts_from(
                arg,
                &[Type::Int, Type::Uint, Type::Double, Type::String, Type::Bool],
            ) =>
        {
            Some(Type::String)
        }
        ("bool", [arg]) if converts_from(arg, &[Type::Bool, Type::String]) => Some(Type::Bool),
        ("dyn", [_]) => Some(Type::Dyn),
        ("matches", [text, pattern]) if text.may_be_string() && pattern.may_be_string() => {
            Some(Type::Bool)
        }
        ("quantity", [text]) if text.may_be_string() => Some(Type::Quantity),
        ("isQuantity", [text]) if text.may_be_string() => Some(Type::Bool),
        _ => None,
    };

    result.ok_or_else(|| {
        if GLOBAL_FUNCTIONS.contains(&function) {
            no_overload(function, args)
        } else {
            undeclared(function)
        }
    })
}

fn member_function(function: &str, receiver: &Type, args: &[Type]) -> Result<Type, String> {
    let result = match (function, args) {
        ("size", []) if is_sized(receiver) => Some(Type::Int),
        ("contains" | "startsWith" | "endsWith" | "matches", [arg])
            if receiver.may_be_string() && arg.may_be_string() =>
        {
            Some(Type::Bool)
        }
        ("lowerAscii" | "upperAscii" | "trim", []) if receiver.may_be_string() => {
            Some(Type::String)
        }
        ("split", [separator]) if receiver.may_be_string() && separator.may_be_string() => {
            Some(Type::list(Type::String))
        }
        ("split", [separator, limit])
            if receiver.may_be_string() && separator.may_be_string() && may_be_int(limit) =>
        {
            Some(Type::list(Type::String))
        }
        ("replace", [from, to])
            if receiver.may_be_string() && from.may_be_string() && to.may_be_string() =>
        {
            Some(Type::String)
        }
        ("replace", [from, to, limit])
            if receiver.may_be_string()
                && from.may_be_string()
                && to.may_be_string()
                && may_be_int(limit) =>
        {
            Some(Type::String)
        }
        ("indexOf" | "lastIndexOf", [needle])
            if receiver.may_be_string() && needle.may_be_string() =>
        {
            Some(Type::Int)
        }
        ("indexOf" | "lastIndexOf", [needle, offset])
            if receiver.may_be_string() && needle.may_be_string() && may_be_int(offset) =>
        {
            Some(Type::Int)
        }
        ("indexOf" | "lastIndexOf", [_]) if is_list_like(receiver) => Some(Type::Int),
        ("charAt", [index]) if receiver.may_be_string() && may_be_int(index) => Some(Type::String),
        ("substring", [start]) if receiver.may_be_string() && may_be_int(start) => {
            Some(Type::String)
        }
        ("substring", [start, end])
            if receiver.may_be_string() && may_be_int(start) && may_be_int(end) =>
        {
            Some(Type::String)
        }
        ("reverse", []) if receiver.may_be_string() => Some(Type::String),
        ("find", [pattern]) if receiver.may_be_string() && pattern.may_be_string() => {
            Some(Type::String)
        }
        ("findAll", [pattern]) if receiver.may_be_string() && pattern.may_be_string() => {
            Some(Type::list(Type::String))
        }
        ("findAll", [pattern, limit])
            if receiver.may_be_string() && pattern.may_be_string() && may_be_int(limit) =>
        {
            Some(Type::list(Type::String))
        }
        ("sign" | "asInteger", []) if may_be_quantity(receiver) => Some(Type::Int),
        ("isInteger", []) if may_be_quantity(receiver) => Some(Type::Bool),
        ("asApproximateFloat", []) if may_be_quantity(receiver) => Some(Type::Double),
        ("add" | "sub", [other])
            if may_be_quantity(receiver) && (may_be_quantity(other) || *other == Type::Int) =>
        {
            Some(Type::Quantity)
        }
        ("compareTo", [other]) if may_be_quantity(receiver) && may_be_quantity(other) => {
            Some(Type::Int)
        }
        ("isLessThan" | "isGreaterThan", [other])
            if may_be_quantity(receiver) && may_be_quantity(other) =>
        {
            Some(Type::Bool)
        }
        ("join", []) if is_string_list(receiver) => Some(Type::String),
        ("join", [separator]) if is_string_list(receiver) && separator.may_be_string() => {
            Some(Type::String)
        }
        ("orValue", [fallback]) => match receiver {
            Type::Optional(inner) => Some(inner.join(fallback)),
            Type::Dyn => Some(Type::Dyn),
            _ => None,
        },
        ("hasValue", []) if matches!(receiver, Type::Optional(_) | Type::Dyn) => Some(Type::Bool),
        ("value", []) => match receiver {
            Type::Optional(inner) => Some(inner.as_ref().clone()),
            Type::Dyn => Some(Type::Dyn),
            _ => None,
        },
        ("min" | "max" | "sum", []) => match receiver {
            Type::List(element) if element.is_numeric() || element.is_dyn() => {
                Some(element.as_ref().clone())
            }
            Type::Dyn => Some(Type::Dyn),
            _ => None,
        },
        ("isSorted", []) if is_list_like(receiver) => Some(Type::Bool),
        _ => None,
    };

    result.ok_or_else(|| {
        if MEMBER_FUNCTIONS.contains(&function) {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(receiver.clone());
            all.extend_from_slice(args);
            no_overload(function, &all)
        } else {
            undeclared(function)
        }
    })
}

fn namespaced_function(namespace: &str, function: &str, args: &[Type]) -> Result<Type, String> {
    let qualified = format!("{}.{}", namespace, function);
    let result = match (qualified.as_str(), args) {
        ("sets.contains" | "sets.intersects" | "sets.equivalent", [a, b])
            if is_list_like(a) && is_list_like(b) =>
        {
            Some(Type::Bool)
        }
        ("optional.of" | "optional.ofNonZeroValue", [value]) => Some(Type::optional(value.clone())),
        ("optional.none", []) => Some(Type::optional(Type::Dyn)),
        ("strings.quote", [text]) if text.may_be_string() => Some(Type::String),
        _ => None,
    };

    result.ok_or_else(|| {
        if NAMESPACED_FUNCTIONS.contains(&qualified.as_str()) {
            no_overload(&qualified, args)
        } else {
            undeclared(&qualified)
        }
    })
}
