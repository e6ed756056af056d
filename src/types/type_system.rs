//! Type system for Quill

use std::collections::HashMap;

use crate::frontend::scopes::DeclId;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Bool,
    Str,
    Void,
    Null,
}

impl Primitive {
    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// Static type of a declaration or expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    /// Array type; `generic` marks the "any element type" arrays
    /// (`Template[]` and placeholder-component arrays).
    Array { elem: Box<Type>, generic: bool },
    /// Struct type, identified by its declaration
    Struct { name: String, decl: DeclId },
    /// Function type
    Fun { ret: Box<Type>, params: Vec<Type> },
    /// Generic placeholder (`T`, `T1`, ...); the reserved name `Template`
    /// denotes the wildcard type
    Placeholder { name: String },
    /// The type of type-valued expressions (struct declarations)
    TypeOfType,
}

impl Type {
    pub fn int() -> Self {
        Self::Primitive(Primitive::Int)
    }

    pub fn float() -> Self {
        Self::Primitive(Primitive::Float)
    }

    pub fn bool() -> Self {
        Self::Primitive(Primitive::Bool)
    }

    pub fn string() -> Self {
        Self::Primitive(Primitive::Str)
    }

    pub fn void() -> Self {
        Self::Primitive(Primitive::Void)
    }

    pub fn null() -> Self {
        Self::Primitive(Primitive::Null)
    }

    /// The wildcard placeholder type (`Template`)
    pub fn template() -> Self {
        Self::Placeholder {
            name: "Template".to_string(),
        }
    }

    pub fn placeholder(name: &str) -> Self {
        Self::Placeholder {
            name: name.to_string(),
        }
    }

    /// Build an array type; the generic marker is derived from the
    /// component type.
    pub fn array_of(elem: Type) -> Self {
        let generic = elem.is_placeholder();
        Self::Array {
            elem: Box::new(elem),
            generic,
        }
    }

    /// The generic "any element" array type (`Template[]`)
    pub fn template_array() -> Self {
        Self::Array {
            elem: Box::new(Self::template()),
            generic: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Primitive(p) if p.is_numeric())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Void))
    }

    pub fn is_generic_array(&self) -> bool {
        matches!(self, Self::Array { generic: true, .. })
    }

    /// The component type, for array types.
    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Self::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Does the type mention a named placeholder (`T`, `T1`, ...)? The
    /// wildcard `Template` does not count: it needs no per-site
    /// substitution.
    pub fn has_named_placeholder(&self) -> bool {
        match self {
            Self::Placeholder { name } => name != "Template",
            Self::Array { elem, .. } => elem.has_named_placeholder(),
            Self::Fun { ret, params } => {
                ret.has_named_placeholder() || params.iter().any(Type::has_named_placeholder)
            }
            _ => false,
        }
    }

    /// Reference types can hold `null` and are compared by identity.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Self::Primitive(Primitive::Str)
                | Self::Primitive(Primitive::Null)
                | Self::Array { .. }
                | Self::Struct { .. }
                | Self::Fun { .. }
        )
    }

    /// Indicates whether a value of type `self` can be assigned to a
    /// location (variable, parameter, field, ...) of type `other`.
    pub fn is_assignable_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Array { .. }, b) if !matches!(b, Type::Array { .. }) => b.is_placeholder(),
            (a, Type::Array { .. }) if !matches!(a, Type::Array { .. }) => {
                a.is_placeholder() || matches!(a, Type::Primitive(Primitive::Null))
            }
            (
                Type::Array {
                    elem: ea,
                    generic: ga,
                },
                Type::Array {
                    elem: eb,
                    generic: gb,
                },
            ) => *ga || *gb || ea.is_assignable_to(eb),
            (a, b) if a.is_void() || b.is_void() => false,
            (Type::Primitive(Primitive::Int), Type::Primitive(Primitive::Float)) => true,
            (_, Type::Placeholder { .. }) => true,
            (Type::Placeholder { .. }, _) => true,
            (Type::Primitive(Primitive::Null), b) => b.is_reference(),
            (a, b) => a == b,
        }
    }

    /// Indicates whether two types can be compared with `==`/`!=`.
    pub fn is_comparable_to(&self, other: &Type) -> bool {
        if self.is_void() || other.is_void() {
            return false;
        }
        if self.is_placeholder() || other.is_placeholder() {
            return true;
        }
        self.is_reference() && other.is_reference()
            || self == other
            || self.is_numeric() && other.is_numeric()
    }

    /// Substitute placeholders using the binding map of one instantiation
    /// site. Array placeholders prefer the recorded `T[]` entry.
    pub fn substitute(&self, bindings: &HashMap<String, Type>) -> Type {
        match self {
            Type::Placeholder { name } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Array { elem, generic } => {
                if let Type::Placeholder { name } = elem.as_ref() {
                    if let Some(bound) = bindings.get(&format!("{name}[]")) {
                        return bound.clone();
                    }
                }
                let elem = elem.substitute(bindings);
                let generic = *generic && elem.is_placeholder();
                Type::Array {
                    elem: Box::new(elem),
                    generic,
                }
            }
            Type::Fun { ret, params } => Type::Fun {
                ret: Box::new(ret.substitute(bindings)),
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
            },
            _ => self.clone(),
        }
    }
}

/// Returns the common supertype of both types, or `None` if no such
/// supertype exists.
pub fn common_supertype(a: &Type, b: &Type) -> Option<Type> {
    if a.is_void() || b.is_void() {
        None
    } else if a.is_assignable_to(b) {
        Some(b.clone())
    } else if b.is_assignable_to(a) {
        Some(a.clone())
    } else {
        None
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Primitive(Primitive::Int) => write!(f, "Int"),
            Type::Primitive(Primitive::Float) => write!(f, "Float"),
            Type::Primitive(Primitive::Bool) => write!(f, "Bool"),
            Type::Primitive(Primitive::Str) => write!(f, "String"),
            Type::Primitive(Primitive::Void) => write!(f, "Void"),
            Type::Primitive(Primitive::Null) => write!(f, "Null"),
            Type::Array { elem, .. } => write!(f, "{elem}[]"),
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Fun { ret, params } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Placeholder { name } => write!(f, "{name}"),
            Type::TypeOfType => write!(f, "Type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_assignability() {
        assert!(Type::int().is_assignable_to(&Type::float()));
        assert!(!Type::float().is_assignable_to(&Type::int()));
        assert!(Type::int().is_assignable_to(&Type::int()));
        assert!(!Type::bool().is_assignable_to(&Type::int()));
        assert!(!Type::void().is_assignable_to(&Type::void()));
    }

    #[test]
    fn test_null_into_references() {
        assert!(Type::null().is_assignable_to(&Type::string()));
        assert!(Type::null().is_assignable_to(&Type::array_of(Type::int())));
        assert!(!Type::null().is_assignable_to(&Type::int()));
    }

    #[test]
    fn test_array_assignability_is_componentwise() {
        let ints = Type::array_of(Type::int());
        let floats = Type::array_of(Type::float());
        let bools = Type::array_of(Type::bool());
        assert!(ints.is_assignable_to(&floats));
        assert!(!floats.is_assignable_to(&ints));
        assert!(!ints.is_assignable_to(&bools));
        assert!(!ints.is_assignable_to(&Type::int()));
    }

    #[test]
    fn test_generic_array_marker_wins() {
        let ints = Type::array_of(Type::int());
        let template = Type::template_array();
        assert!(ints.is_assignable_to(&template));
        assert!(template.is_assignable_to(&ints));

        let t_arr = Type::array_of(Type::placeholder("T"));
        let u_arr = Type::array_of(Type::placeholder("T1"));
        assert!(t_arr.is_assignable_to(&u_arr));
        assert!(u_arr.is_assignable_to(&t_arr));
    }

    #[test]
    fn test_placeholder_is_wildcard() {
        let t = Type::placeholder("T");
        assert!(Type::int().is_assignable_to(&t));
        assert!(t.is_assignable_to(&Type::string()));
    }

    #[test]
    fn test_comparability() {
        assert!(Type::int().is_comparable_to(&Type::float()));
        assert!(Type::float().is_comparable_to(&Type::int()));
        assert!(Type::string().is_comparable_to(&Type::string()));
        assert!(!Type::int().is_comparable_to(&Type::string()));
        assert!(!Type::void().is_comparable_to(&Type::void()));
        let ints = Type::array_of(Type::int());
        let strs = Type::array_of(Type::string());
        assert!(ints.is_comparable_to(&strs));
    }

    #[test]
    fn test_common_supertype() {
        assert_eq!(
            common_supertype(&Type::int(), &Type::float()),
            Some(Type::float())
        );
        assert_eq!(
            common_supertype(&Type::float(), &Type::int()),
            Some(Type::float())
        );
        assert_eq!(common_supertype(&Type::int(), &Type::string()), None);
        assert_eq!(common_supertype(&Type::void(), &Type::int()), None);
    }

    #[test]
    fn test_substitution() {
        let mut bindings = HashMap::new();
        bindings.insert("T".to_string(), Type::int());
        bindings.insert("T[]".to_string(), Type::array_of(Type::int()));

        assert_eq!(Type::placeholder("T").substitute(&bindings), Type::int());
        assert_eq!(
            Type::array_of(Type::placeholder("T")).substitute(&bindings),
            Type::array_of(Type::int())
        );
        // unbound placeholders survive
        assert_eq!(
            Type::placeholder("T1").substitute(&bindings),
            Type::placeholder("T1")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array_of(Type::int()).to_string(), "Int[]");
        assert_eq!(Type::template_array().to_string(), "Template[]");
        assert_eq!(
            Type::Fun {
                ret: Box::new(Type::bool()),
                params: vec![Type::int(), Type::float()],
            }
            .to_string(),
            "(Int, Float) -> Bool"
        );
    }
}
