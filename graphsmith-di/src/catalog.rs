//! The type catalog describes every type the resolver can construct: its kind, generic
//! parameters, implemented contracts, constructors and injectable members. Catalogs are provided
//! by a front-end which has already extracted ordinal, tag and type markers from source code.

use crate::binding::{InjectionRequest, SiteKind, Tag};
use crate::shape::{Shape, TypeKey};
use crate::unify::Substitution;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    Struct,
    Class,
    Abstract,
    Interface,
}

/// Ordered from most to least preferred when ranking constructors.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum Accessibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParameterDescriptor {
    pub name: String,
    /// May refer to the declaring type's generic parameters as markers.
    pub shape: Shape,
    pub tag: Tag,
    pub has_default: bool,
}

impl ParameterDescriptor {
    pub fn new<T: Into<String>>(name: T, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            tag: Tag::None,
            has_default: false,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Creates a request for this parameter, substituting type arguments of the declaring type.
    pub fn request(
        &self,
        type_arguments: &Substitution,
        site: SiteKind,
        ordinal: usize,
    ) -> InjectionRequest {
        let mut request = InjectionRequest::new(type_arguments.apply(&self.shape))
            .with_tag(self.tag.clone())
            .with_site(site, ordinal)
            .with_name(self.name.clone());
        request.has_default = self.has_default;
        request
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ConstructorDescriptor {
    pub accessibility: Accessibility,
    /// Explicit ordinal marker; when any constructor has one, only marked constructors count.
    pub ordinal: Option<i32>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl ConstructorDescriptor {
    pub fn new<P: IntoIterator<Item = ParameterDescriptor>>(parameters: P) -> Self {
        Self {
            accessibility: Accessibility::Public,
            ordinal: None,
            parameters: parameters.into_iter().collect(),
        }
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }
}

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum MemberKind {
    Field,
    Property,
    Method,
}

impl From<MemberKind> for SiteKind {
    fn from(value: MemberKind) -> Self {
        match value {
            MemberKind::Field => SiteKind::Field,
            MemberKind::Property => SiteKind::Property,
            MemberKind::Method => SiteKind::Method,
        }
    }
}

/// Field, property or method. Fields and properties have exactly one parameter - the member
/// type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
    /// Carries a dependency marker and takes part in injection.
    pub is_dependency: bool,
    pub ordinal: Option<i32>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl MemberDescriptor {
    pub fn field<T: Into<String>>(name: T, shape: Shape) -> Self {
        Self::value_member(name.into(), MemberKind::Field, shape)
    }

    pub fn property<T: Into<String>>(name: T, shape: Shape) -> Self {
        Self::value_member(name.into(), MemberKind::Property, shape)
    }

    pub fn method<T: Into<String>, P: IntoIterator<Item = ParameterDescriptor>>(
        name: T,
        parameters: P,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            is_dependency: true,
            ordinal: None,
            parameters: parameters.into_iter().collect(),
        }
    }

    fn value_member(name: String, kind: MemberKind, shape: Shape) -> Self {
        Self {
            parameters: vec![ParameterDescriptor::new(name.clone(), shape)],
            name,
            kind,
            is_dependency: true,
            ordinal: None,
        }
    }

    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        for parameter in &mut self.parameters {
            parameter.tag = tag.clone();
        }
        self
    }

    pub fn without_dependency(mut self) -> Self {
        self.is_dependency = false;
        self
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TypeDescriptor {
    pub key: TypeKey,
    pub kind: TypeKind,
    /// Names of generic parameters; member and constructor shapes refer to them as markers.
    pub type_parameters: Vec<String>,
    /// Directly implemented or inherited contracts.
    pub implements: Vec<Shape>,
    pub constructors: Vec<ConstructorDescriptor>,
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    pub fn new<T: Into<String>>(key: T, kind: TypeKind) -> Self {
        Self {
            key: TypeKey::new(key),
            kind,
            type_parameters: vec![],
            implements: vec![],
            constructors: vec![],
            members: vec![],
        }
    }

    pub fn with_type_parameters<P: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        parameters: P,
    ) -> Self {
        self.type_parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn implementing(mut self, contract: Shape) -> Self {
        self.implements.push(contract);
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Only non-abstract structs and classes can be constructed.
    #[inline]
    pub fn is_constructible(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Class)
    }

    /// Maps generic parameters to the arguments of the given closed shape. Returns `None` on arity
    /// mismatch.
    pub fn type_arguments(&self, shape: &Shape) -> Option<Substitution> {
        let arguments = shape.arguments();
        if arguments.len() != self.type_parameters.len() {
            return None;
        }

        Some(
            self.type_parameters
                .iter()
                .cloned()
                .zip(arguments.iter().cloned())
                .collect(),
        )
    }
}

/// Source of type information for resolution.
#[cfg_attr(test, automock)]
pub trait TypeCatalog {
    /// Returns the descriptor of a type definition.
    fn descriptor(&self, key: &TypeKey) -> Option<TypeDescriptor>;

    /// Returns statically known constructible, closed types assignable to the given contract,
    /// ordered by type key.
    fn implementers(&self, contract: &Shape) -> Vec<Shape>;

    /// Evaluates a named custom marker constraint.
    fn satisfies_custom(&self, constraint: &str, shape: &Shape) -> bool;
}

/// Checks if `source` is the same as `target` or (transitively) implements it.
pub fn is_assignable(catalog: &dyn TypeCatalog, source: &Shape, target: &Shape) -> bool {
    let mut visited = FxHashSet::default();
    is_assignable_visited(catalog, source, target, &mut visited)
}

fn is_assignable_visited(
    catalog: &dyn TypeCatalog,
    source: &Shape,
    target: &Shape,
    visited: &mut FxHashSet<Shape>,
) -> bool {
    if source == target {
        return true;
    }

    if !visited.insert(source.clone()) {
        return false;
    }

    let Some(descriptor) = source.head().and_then(|key| catalog.descriptor(key)) else {
        return false;
    };

    let Some(type_arguments) = descriptor.type_arguments(source) else {
        return false;
    };

    descriptor.implements.iter().any(|contract| {
        is_assignable_visited(catalog, &type_arguments.apply(contract), target, visited)
    })
}

/// In-memory catalog populated by a front-end.
#[derive(Clone, Debug, Default)]
pub struct StaticTypeCatalog {
    descriptors: FxHashMap<TypeKey, TypeDescriptor>,
    custom_constraints: FxHashMap<String, FxHashSet<TypeKey>>,
}

impl StaticTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.descriptors.insert(descriptor.key.clone(), descriptor);
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Declares that the given type satisfies a named custom constraint.
    pub fn with_custom_constraint<T: Into<String>>(mut self, constraint: T, key: TypeKey) -> Self {
        self.custom_constraints
            .entry(constraint.into())
            .or_default()
            .insert(key);
        self
    }
}

impl TypeCatalog for StaticTypeCatalog {
    #[inline]
    fn descriptor(&self, key: &TypeKey) -> Option<TypeDescriptor> {
        self.descriptors.get(key).cloned()
    }

    fn implementers(&self, contract: &Shape) -> Vec<Shape> {
        self.descriptors
            .values()
            .filter(|descriptor| {
                descriptor.is_constructible() && descriptor.type_parameters.is_empty()
            })
            .map(|descriptor| Shape::Concrete(descriptor.key.clone()))
            .filter(|shape| is_assignable(self, shape, contract))
            .sorted()
            .collect_vec()
    }

    fn satisfies_custom(&self, constraint: &str, shape: &Shape) -> bool {
        shape
            .head()
            .zip(self.custom_constraints.get(constraint))
            .map(|(key, keys)| keys.contains(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{
        is_assignable, MockTypeCatalog, StaticTypeCatalog, TypeCatalog, TypeDescriptor, TypeKind,
    };
    use crate::shape::{Shape, TypeKey};
    use mockall::predicate::*;

    fn create_catalog() -> StaticTypeCatalog {
        StaticTypeCatalog::new()
            .with_type(
                TypeDescriptor::new("IRepository", TypeKind::Interface)
                    .with_type_parameters(["T"]),
            )
            .with_type(
                TypeDescriptor::new("Repository", TypeKind::Class)
                    .with_type_parameters(["T"])
                    .implementing(Shape::generic("IRepository", [Shape::marker("T")])),
            )
            .with_type(
                TypeDescriptor::new("UserRepository", TypeKind::Class)
                    .implementing(Shape::generic("Repository", [Shape::concrete("User")])),
            )
            .with_type(TypeDescriptor::new("AbstractRepository", TypeKind::Abstract).implementing(
                Shape::generic("IRepository", [Shape::concrete("User")]),
            ))
    }

    #[test]
    fn should_check_transitive_assignability() {
        let catalog = create_catalog();

        assert!(is_assignable(
            &catalog,
            &Shape::concrete("UserRepository"),
            &Shape::generic("IRepository", [Shape::concrete("User")])
        ));
        assert!(!is_assignable(
            &catalog,
            &Shape::concrete("UserRepository"),
            &Shape::generic("IRepository", [Shape::concrete("Order")])
        ));
    }

    #[test]
    fn should_list_constructible_implementers() {
        let catalog = create_catalog();

        assert_eq!(
            catalog.implementers(&Shape::generic("IRepository", [Shape::concrete("User")])),
            vec![Shape::concrete("UserRepository")]
        );
    }

    #[test]
    fn should_evaluate_custom_constraints() {
        let catalog = create_catalog()
            .with_custom_constraint("Persistent", TypeKey::new("UserRepository"));

        assert!(catalog.satisfies_custom("Persistent", &Shape::concrete("UserRepository")));
        assert!(!catalog.satisfies_custom("Persistent", &Shape::concrete("Repository")));
        assert!(!catalog.satisfies_custom("Missing", &Shape::concrete("UserRepository")));
    }

    #[test]
    fn should_not_loop_on_unknown_types() {
        let mut catalog = MockTypeCatalog::new();
        catalog
            .expect_descriptor()
            .with(eq(TypeKey::new("Unknown")))
            .times(1)
            .return_const(None);

        assert!(!is_assignable(
            &catalog,
            &Shape::concrete("Unknown"),
            &Shape::concrete("IService")
        ));
    }
}
