//! Contract shapes are the type identities the resolver works with. A [Shape] is a small AST: a
//! concrete type, a generic type applied to argument shapes, or a [Marker] - a placeholder which
//! can be unified with any concrete type satisfying its constraints.
//!
//! ```
//! use graphsmith_di::shape::{Marker, MarkerConstraint, Shape};
//!
//! // IMap<TT1, TT2>
//! let contract = Shape::generic("IMap", [Shape::marker("TT1"), Shape::marker("TT2")]);
//! assert!(contract.is_open());
//! assert_eq!(contract.to_string(), "IMap<TT1, TT2>");
//!
//! // TTS : struct
//! let constrained = Shape::Marker(Marker::new("TTS").with_constraint(MarkerConstraint::Struct));
//! assert!(constrained.is_open());
//! ```

use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Opaque identity of a type definition, as provided by the front-end. Generic definitions are
/// identified by their name without arguments.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Constraint attached to a marker slot. A marker can carry several constraints, all of which
/// must be satisfied by the unified type.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum MarkerConstraint {
    /// No constraint.
    Any,
    /// Value type.
    Struct,
    /// Reference type - classes, abstract classes and interfaces.
    Class,
    /// The type must be assignable to the given shape. The shape can refer to other markers, which
    /// are substituted before checking.
    Implements(Shape),
    /// Named constraint evaluated by the [TypeCatalog](crate::catalog::TypeCatalog).
    Custom(String),
}

impl Display for MarkerConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerConstraint::Any => f.write_str("any"),
            MarkerConstraint::Struct => f.write_str("struct"),
            MarkerConstraint::Class => f.write_str("class"),
            MarkerConstraint::Implements(shape) => write!(f, "implements({shape})"),
            MarkerConstraint::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Generic placeholder type used in binding patterns over open generics.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Marker {
    pub name: String,
    pub constraints: Vec<MarkerConstraint>,
}

impl Marker {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            constraints: vec![],
        }
    }

    pub fn with_constraint(mut self, constraint: MarkerConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// A type identity, possibly containing marker slots.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Shape {
    Concrete(TypeKey),
    Generic(TypeKey, Vec<Shape>),
    Marker(Marker),
}

impl Shape {
    pub fn concrete<T: Into<String>>(name: T) -> Self {
        Shape::Concrete(TypeKey::new(name))
    }

    pub fn generic<T: Into<String>, A: IntoIterator<Item = Shape>>(name: T, arguments: A) -> Self {
        Shape::Generic(TypeKey::new(name), arguments.into_iter().collect())
    }

    pub fn marker<T: Into<String>>(name: T) -> Self {
        Shape::Marker(Marker::new(name))
    }

    /// Returns the outer type constructor, or `None` for markers.
    pub fn head(&self) -> Option<&TypeKey> {
        match self {
            Shape::Concrete(key) | Shape::Generic(key, _) => Some(key),
            Shape::Marker(_) => None,
        }
    }

    /// Returns generic arguments; empty for concrete types and markers.
    pub fn arguments(&self) -> &[Shape] {
        match self {
            Shape::Generic(_, arguments) => arguments,
            _ => &[],
        }
    }

    /// Checks if this shape contains any marker slot.
    pub fn is_open(&self) -> bool {
        match self {
            Shape::Concrete(_) => false,
            Shape::Generic(_, arguments) => arguments.iter().any(Shape::is_open),
            Shape::Marker(_) => true,
        }
    }

    /// Collects marker names in order of first appearance.
    pub fn marker_names(&self) -> Vec<&str> {
        fn collect<'a>(shape: &'a Shape, names: &mut Vec<&'a str>) {
            match shape {
                Shape::Concrete(_) => {}
                Shape::Generic(_, arguments) => {
                    for argument in arguments {
                        collect(argument, names);
                    }
                }
                Shape::Marker(marker) => {
                    if !names.contains(&marker.name.as_str()) {
                        names.push(&marker.name);
                    }
                }
            }
        }

        let mut names = vec![];
        collect(self, &mut names);
        names
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Concrete(key) => write!(f, "{key}"),
            Shape::Generic(key, arguments) => {
                write!(f, "{key}<{}>", arguments.iter().join(", "))
            }
            Shape::Marker(marker) => f.write_str(&marker.name),
        }
    }
}

impl From<TypeKey> for Shape {
    fn from(value: TypeKey) -> Self {
        Shape::Concrete(value)
    }
}
