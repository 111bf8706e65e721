use crate::binding::{BindingId, Tag};
use crate::shape::{MarkerConstraint, Shape};
use itertools::Itertools;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Errors detected while building a construction graph.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum GraphError {
    #[error(
        "Cannot resolve {shape} tagged {tag} - no binding exists and the type cannot be \
         auto-bound."
    )]
    CannotResolve { shape: Shape, tag: Tag },
    #[error("No eligible constructor for {0} - every candidate has an unresolvable parameter.")]
    NoEligibleConstructor(Shape),
    #[error("Cyclic dependency detected: {}", .0.iter().join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error(
        "Ambiguous generic match for {shape} tagged {tag} between bindings #{first} and \
         #{second}."
    )]
    AmbiguousGenericMatch {
        shape: Shape,
        tag: Tag,
        first: BindingId,
        second: BindingId,
    },
    #[error("Marker {marker} cannot be bound to {concrete}: violates constraint {constraint}.")]
    ConstraintViolation {
        marker: String,
        concrete: Shape,
        constraint: MarkerConstraint,
    },
    #[error("Resolution depth limit of {0} exceeded.")]
    DepthLimitExceeded(usize),
}

/// Errors related to registering bindings.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BindingRegistryError {
    #[error("Binding #{0} declares no contract.")]
    EmptyContract(BindingId),
    #[error(
        "Binding #{binding} maps closed contract {contract} to open implementation \
         {implementation}."
    )]
    OpenImplementation {
        binding: BindingId,
        contract: Shape,
        implementation: Shape,
    },
    #[error(
        "Implementation {implementation} of binding #{binding} uses marker {marker} absent \
         from its contracts."
    )]
    UnknownImplementationMarker {
        binding: BindingId,
        implementation: Shape,
        marker: String,
    },
}

/// A [GraphError] attributed to the root and request path which triggered it.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub root: String,
    /// Requests from the root down to the failing one.
    pub path: Vec<String>,
    pub error: GraphError,
}

impl StdError for Diagnostic {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.path {
            write!(f, " > {segment}")?;
        }
        write!(f, ": {}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::Tag;
    use crate::error::{Diagnostic, GraphError};
    use crate::shape::Shape;

    #[test]
    fn should_format_diagnostic_path() {
        let diagnostic = Diagnostic {
            root: "Root".to_string(),
            path: vec!["IService".to_string(), "IRepository".to_string()],
            error: GraphError::CannotResolve {
                shape: Shape::concrete("IClock"),
                tag: Tag::None,
            },
        };

        assert_eq!(
            diagnostic.to_string(),
            "Root > IService > IRepository: Cannot resolve IClock tagged <none> - no binding \
             exists and the type cannot be auto-bound."
        );
    }

    #[test]
    fn should_format_cycle() {
        assert_eq!(
            GraphError::CyclicDependency(vec!["A".to_string(), "B".to_string(), "A".to_string()])
                .to_string(),
            "Cyclic dependency detected: A -> B -> A"
        );
    }
}
