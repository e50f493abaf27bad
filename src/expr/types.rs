//! Static types for check expressions.

use std::fmt;

/// Type of an expression as inferred by the checker.
///
/// `Dyn` means "not known until evaluation": operations on it are always
/// accepted at compile time and checked at runtime instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    Uint,
    Double,
    String,
    Null,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Optional(Box<Type>),
    /// A parsed Kubernetes resource quantity.
    Quantity,
    Dyn,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Uint | Type::Double)
    }

    /// True when a value of this type may be a bool at runtime.
    pub fn may_be_bool(&self) -> bool {
        matches!(self, Type::Bool | Type::Dyn)
    }

    /// True when a value of this type may be a string at runtime.
    pub fn may_be_string(&self) -> bool {
        matches!(self, Type::String | Type::Dyn)
    }

    /// The common type of two branches: identical types are kept, anything
    /// else widens to `dyn`.
    pub fn join(&self, other: &Type) -> Type {
        if self == other { self.clone() } else { Type::Dyn }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Uint => write!(f, "uint"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Null => write!(f, "null_type"),
            Type::List(element) => write!(f, "list({})", element),
            Type::Map(key, value) => write!(f, "map({}, {})", key, value),
            Type::Optional(inner) => write!(f, "optional_type({})", inner),
            Type::Quantity => write!(f, "kubernetes.Quantity"),
            Type::Dyn => write!(f, "dyn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Type::list(Type::String).to_string(), "list(string)");
        assert_eq!(Type::map(Type::String, Type::Dyn).to_string(), "map(string, dyn)");
        assert_eq!(Type::optional(Type::Int).to_string(), "optional_type(int)");
    }

    #[test]
    fn test_join() {
        assert_eq!(Type::Int.join(&Type::Int), Type::Int);
        assert_eq!(Type::Int.join(&Type::String), Type::Dyn);
    }
}
