//! Syntax tree for check expressions.

use std::collections::BTreeSet;

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Operator spelling used in overload error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Comprehension macros expanded at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    All,
    Exists,
    ExistsOne,
    Map,
    Filter,
}

impl MacroKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(MacroKind::All),
            "exists" => Some(MacroKind::Exists),
            "exists_one" => Some(MacroKind::ExistsOne),
            "map" => Some(MacroKind::Map),
            "filter" => Some(MacroKind::Filter),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MacroKind::All => "all",
            MacroKind::Exists => "exists",
            MacroKind::ExistsOne => "exists_one",
            MacroKind::Map => "map",
            MacroKind::Filter => "filter",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    /// `a.f`, or `a.?f` when `optional` is set.
    Select {
        operand: Box<Expr>,
        field: String,
        optional: bool,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    /// Global call when `target` is `None`, receiver-style call otherwise.
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// `has(a.f)`
    Has {
        operand: Box<Expr>,
        field: String,
    },
    /// `range.all(var, body)` and friends. `filter` is only set by the
    /// three-argument form of `map`.
    Comprehension {
        kind: MacroKind,
        range: Box<Expr>,
        var: String,
        filter: Option<Box<Expr>>,
        body: Box<Expr>,
    },
}

impl Expr {
    /// Names selected from the identifier `namespace`, either as
    /// `namespace.name` or `namespace["name"]`.
    pub fn namespace_references(&self, namespace: &str) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_references(namespace, &mut names);
        names
    }

    fn collect_references(&self, namespace: &str, names: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) | Expr::Ident(_) => {}
            Expr::Select { operand, field, .. } => {
                if matches!(operand.as_ref(), Expr::Ident(name) if name == namespace) {
                    names.insert(field.clone());
                }
                operand.collect_references(namespace, names);
            }
            Expr::Has { operand, field } => {
                if matches!(operand.as_ref(), Expr::Ident(name) if name == namespace) {
                    names.insert(field.clone());
                }
                operand.collect_references(namespace, names);
            }
            Expr::Index { operand, index } => {
                if let (Expr::Ident(name), Expr::Literal(Literal::String(key))) =
                    (operand.as_ref(), index.as_ref())
                {
                    if name == namespace {
                        names.insert(key.clone());
                    }
                }
                operand.collect_references(namespace, names);
                index.collect_references(namespace, names);
            }
            Expr::Call { target, args, .. } => {
                if let Some(target) = target {
                    target.collect_references(namespace, names);
                }
                for arg in args {
                    arg.collect_references(namespace, names);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_references(namespace, names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(namespace, names);
                rhs.collect_references(namespace, names);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_references(namespace, names);
                then.collect_references(namespace, names);
                otherwise.collect_references(namespace, names);
            }
            Expr::List(items) => {
                for item in items {
                    item.collect_references(namespace, names);
                }
            }
            Expr::Map(entries) => {
                for (key, value) in entries {
                    key.collect_references(namespace, names);
                    value.collect_references(namespace, names);
                }
            }
            Expr::Comprehension {
                range,
                var,
                filter,
                body,
                ..
            } => {
                range.collect_references(namespace, names);
                // The loop variable shadows the namespace inside the body.
                if var != namespace {
                    if let Some(filter) = filter {
                        filter.collect_references(namespace, names);
                    }
                    body.collect_references(namespace, names);
                }
            }
        }
    }

    /// String literal patterns passed to `matches`, `find` and `findAll`,
    /// collected for precompilation.
    pub fn literal_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        self.walk(&mut |expr| {
            if let Expr::Call { function, target, args } = expr {
                let pattern = match (function.as_str(), target, args.as_slice()) {
                    ("matches", Some(_), [pattern]) | ("matches", None, [_, pattern]) => {
                        Some(pattern)
                    }
                    ("find" | "findAll", Some(_), [pattern, ..]) => Some(pattern),
                    _ => None,
                };
                if let Some(Expr::Literal(Literal::String(p))) = pattern {
                    patterns.push(p.clone());
                }
            }
        });
        patterns
    }

    fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Ident(_) => {}
            Expr::Select { operand, .. } | Expr::Has { operand, .. } => operand.walk(visit),
            Expr::Index { operand, index } => {
                operand.walk(visit);
                index.walk(visit);
            }
            Expr::Call { target, args, .. } => {
                if let Some(target) = target {
                    target.walk(visit);
                }
                args.iter().for_each(|arg| arg.walk(visit));
            }
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Expr::List(items) => items.iter().for_each(|item| item.walk(visit)),
            Expr::Map(entries) => {
                for (key, value) in entries {
                    key.walk(visit);
                    value.walk(visit);
                }
            }
            Expr::Comprehension {
                range,
                filter,
                body,
                ..
            } => {
                range.walk(visit);
                if let Some(filter) = filter {
                    filter.walk(visit);
                }
                body.walk(visit);
            }
        }
    }
}
