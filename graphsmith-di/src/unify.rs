//! Marker unification between binding contracts and requested shapes.
//!
//! Unification walks both shapes structurally. A marker in the binding shape binds to the shape at
//! the same position of the requested shape, and every other occurrence of that marker must bind
//! to the same shape. Concrete positions must match exactly. Constraints are checked once the
//! structural walk succeeds, so an arity or type mismatch is always reported as
//! [UnifyError::Mismatch].
//!
//! ```
//! use graphsmith_di::catalog::StaticTypeCatalog;
//! use graphsmith_di::shape::Shape;
//! use graphsmith_di::unify::unify;
//!
//! let catalog = StaticTypeCatalog::new();
//! let contract = Shape::generic("IMap", [Shape::marker("TT1"), Shape::marker("TT2")]);
//! let requested = Shape::generic("IMap", [Shape::concrete("string"), Shape::concrete("int")]);
//!
//! let substitution = unify(&contract, &requested, &catalog).unwrap();
//! let implementation = Shape::generic("Map", [Shape::marker("TT2"), Shape::marker("TT1")]);
//!
//! assert_eq!(
//!     substitution.apply(&implementation),
//!     Shape::generic("Map", [Shape::concrete("int"), Shape::concrete("string")])
//! );
//! ```

use crate::catalog::{is_assignable, TypeCatalog, TypeKind};
use crate::shape::{Marker, MarkerConstraint, Shape};
use fxhash::FxHashMap;
use itertools::Itertools;
use thiserror::Error;

/// Mapping from marker names to the shapes they were unified with.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Substitution {
    bindings: FxHashMap<String, Shape>,
}

impl Substitution {
    #[inline]
    pub fn get(&self, marker: &str) -> Option<&Shape> {
        self.bindings.get(marker)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Binds a marker, failing if it is already bound to a different shape.
    fn bind(&mut self, marker: &str, shape: &Shape) -> Result<(), UnifyError> {
        match self.bindings.get(marker) {
            Some(bound) if bound != shape => Err(UnifyError::Mismatch),
            Some(_) => Ok(()),
            None => {
                self.bindings.insert(marker.to_string(), shape.clone());
                Ok(())
            }
        }
    }

    /// Replaces every bound marker in the given shape. Unbound markers are kept.
    pub fn apply(&self, shape: &Shape) -> Shape {
        match shape {
            Shape::Concrete(_) => shape.clone(),
            Shape::Generic(key, arguments) => Shape::Generic(
                key.clone(),
                arguments.iter().map(|argument| self.apply(argument)).collect(),
            ),
            Shape::Marker(marker) => self
                .bindings
                .get(&marker.name)
                .cloned()
                .unwrap_or_else(|| shape.clone()),
        }
    }

    /// Returns bindings ordered by marker name.
    pub fn entries(&self) -> Vec<(&str, &Shape)> {
        self.bindings
            .iter()
            .map(|(name, shape)| (name.as_str(), shape))
            .sorted()
            .collect_vec()
    }
}

impl FromIterator<(String, Shape)> for Substitution {
    fn from_iter<T: IntoIterator<Item = (String, Shape)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum UnifyError {
    #[error("Shapes cannot be unified.")]
    Mismatch,
    #[error("Marker {marker} cannot be bound to {concrete}: violates constraint {constraint}.")]
    ConstraintViolation {
        marker: String,
        concrete: Shape,
        constraint: MarkerConstraint,
    },
}

/// Unifies a binding contract with a requested shape. See module documentation for details.
pub fn unify(
    binding: &Shape,
    requested: &Shape,
    catalog: &dyn TypeCatalog,
) -> Result<Substitution, UnifyError> {
    let mut substitution = Substitution::default();
    let mut markers = vec![];

    walk(binding, requested, &mut substitution, &mut markers)?;

    for marker in markers {
        if let Some(concrete) = substitution.get(&marker.name) {
            check_constraints(marker, concrete, &substitution, catalog)?;
        }
    }

    Ok(substitution)
}

fn walk<'a>(
    binding: &'a Shape,
    requested: &Shape,
    substitution: &mut Substitution,
    markers: &mut Vec<&'a Marker>,
) -> Result<(), UnifyError> {
    match (binding, requested) {
        (Shape::Marker(marker), requested) => {
            substitution.bind(&marker.name, requested)?;
            markers.push(marker);
            Ok(())
        }
        (Shape::Concrete(expected), Shape::Concrete(actual)) if expected == actual => Ok(()),
        (Shape::Generic(expected, binding_arguments), Shape::Generic(actual, requested_arguments))
            if expected == actual && binding_arguments.len() == requested_arguments.len() =>
        {
            binding_arguments
                .iter()
                .zip(requested_arguments)
                .try_for_each(|(binding, requested)| {
                    walk(binding, requested, substitution, markers)
                })
        }
        _ => Err(UnifyError::Mismatch),
    }
}

fn check_constraints(
    marker: &Marker,
    concrete: &Shape,
    substitution: &Substitution,
    catalog: &dyn TypeCatalog,
) -> Result<(), UnifyError> {
    for constraint in &marker.constraints {
        if !satisfies(constraint, concrete, substitution, catalog) {
            return Err(UnifyError::ConstraintViolation {
                marker: marker.name.clone(),
                concrete: concrete.clone(),
                constraint: constraint.clone(),
            });
        }
    }

    Ok(())
}

fn satisfies(
    constraint: &MarkerConstraint,
    concrete: &Shape,
    substitution: &Substitution,
    catalog: &dyn TypeCatalog,
) -> bool {
    let kind = || {
        concrete
            .head()
            .and_then(|key| catalog.descriptor(key))
            .map(|descriptor| descriptor.kind)
    };

    match constraint {
        MarkerConstraint::Any => true,
        MarkerConstraint::Struct => kind() == Some(TypeKind::Struct),
        MarkerConstraint::Class => matches!(
            kind(),
            Some(TypeKind::Class | TypeKind::Abstract | TypeKind::Interface)
        ),
        MarkerConstraint::Implements(contract) => {
            is_assignable(catalog, concrete, &substitution.apply(contract))
        }
        MarkerConstraint::Custom(name) => catalog.satisfies_custom(name, concrete),
    }
}
