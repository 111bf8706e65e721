//! Functionality related to looking up [Bindings](Binding) for requested shapes and tags.
//!
//! Lookup precedence, highest first:
//!
//! 1. exact shape with the exact requested tag (including [Tag::None])
//! 2. exact shape with a [Tag::Any] binding
//! 3. exact shape with a [Tag::Default] binding, only for untagged requests
//! 4. contracts with markers unifiable with the requested shape, at the same tag levels
//!
//! Within equal precedence, the binding declared last wins. If nothing matches, a constructible
//! closed type is auto-bound according to the [AutoBindingPolicy].

use crate::binding::{Binding, BindingId, BindingSource, FactoryExpr, FactoryStep, Lifetime, Tag};
use crate::catalog::TypeCatalog;
use crate::error::{BindingRegistryError, GraphError};
use crate::registry::map::BindingMap;
use crate::shape::{Shape, TypeKey};
use crate::unify::{unify, Substitution, UnifyError};
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use tracing::{debug, trace};

/// Id used by synthesized auto-bindings.
pub const AUTO_BINDING_ID: BindingId = BindingId::MAX;

/// Controls implicit bindings of unbound constructible types.
#[derive(Clone, Debug)]
pub struct AutoBindingPolicy {
    pub enabled: bool,
    pub lifetime: Lifetime,
    pub excluded: FxHashSet<TypeKey>,
}

impl Default for AutoBindingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            lifetime: Lifetime::Transient,
            excluded: Default::default(),
        }
    }
}

impl AutoBindingPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn excluding(mut self, key: TypeKey) -> Self {
        self.excluded.insert(key);
        self
    }
}

/// What a resolved binding builds, with markers substituted.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ResolvedSource {
    Implementation(Shape),
    Factory(FactoryExpr),
}

/// Result of a successful lookup.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ResolvedBinding {
    pub binding: Binding,
    /// Marker bindings from unifying the contract with the requested shape.
    pub substitution: Substitution,
    pub source: ResolvedSource,
    /// Tag of the built node - the requested tag for [Tag::Any] bindings.
    pub tag: Tag,
}

impl ResolvedBinding {
    fn new(binding: &Binding, substitution: Substitution, requested_tag: &Tag) -> Self {
        let source = match &binding.source {
            BindingSource::Implementation(implementation) => {
                ResolvedSource::Implementation(substitution.apply(implementation))
            }
            BindingSource::Factory(factory) => {
                ResolvedSource::Factory(substitute_factory(factory, &substitution))
            }
        };

        let tag = match &binding.tag {
            Tag::Any => requested_tag.clone(),
            tag => tag.clone(),
        };

        Self {
            binding: binding.clone(),
            substitution,
            source,
            tag,
        }
    }

    #[inline]
    pub fn is_auto(&self) -> bool {
        self.binding.id == AUTO_BINDING_ID
    }
}

fn substitute_factory(factory: &FactoryExpr, substitution: &Substitution) -> FactoryExpr {
    if substitution.is_empty() {
        return factory.clone();
    }

    FactoryExpr {
        name: factory.name.clone(),
        body: factory
            .body
            .iter()
            .map(|step| match step {
                FactoryStep::Override { shape, tag, value } => FactoryStep::Override {
                    shape: substitution.apply(shape),
                    tag: tag.clone(),
                    value: value.clone(),
                },
                FactoryStep::Inject(request) => {
                    let mut request = request.clone();
                    request.shape = substitution.apply(&request.shape);
                    FactoryStep::Inject(request)
                }
            })
            .collect(),
    }
}

/// Tag precedence of a binding for a requested tag; `None` if the binding does not match.
fn tag_precedence(binding: &Tag, requested: &Tag) -> Option<u8> {
    match binding {
        tag if tag == requested => Some(3),
        Tag::Any => Some(2),
        Tag::Default if requested.is_none() => Some(1),
        _ => None,
    }
}

/// A registry of bindings which can be used to resolve requests.
pub trait BindingRegistry {
    /// Finds the winning binding for a shape and tag. See module documentation for precedence.
    fn lookup(
        &self,
        shape: &Shape,
        tag: &Tag,
        catalog: &dyn TypeCatalog,
    ) -> Result<ResolvedBinding, GraphError>;

    /// Returns every binding matching the shape with any tag, in ascending declaration order.
    /// Bindings overridden by a later declaration for the same tag are skipped.
    fn lookup_all(&self, shape: &Shape, catalog: &dyn TypeCatalog) -> Vec<ResolvedBinding>;

    /// Checks if a lookup would succeed, without reporting why it would not.
    fn can_resolve(&self, shape: &Shape, tag: &Tag, catalog: &dyn TypeCatalog) -> bool {
        self.lookup(shape, tag, catalog).is_ok()
    }

    /// Returns all registered bindings in declaration order.
    fn bindings(&self) -> &[Binding];
}

/// Registry of bindings taken from a declaration set. Binding ids are reassigned to reflect
/// declaration order.
#[derive(Clone, Debug)]
pub struct StaticBindingRegistry {
    map: BindingMap,
    auto_binding: AutoBindingPolicy,
}

impl StaticBindingRegistry {
    pub fn new<B: IntoIterator<Item = Binding>>(
        bindings: B,
        auto_binding: AutoBindingPolicy,
    ) -> Result<Self, BindingRegistryError> {
        let mut map = BindingMap::default();
        for binding in bindings {
            map.try_register(binding)?;
        }

        Ok(Self { map, auto_binding })
    }

    fn lookup_exact(&self, shape: &Shape, tag: &Tag) -> Option<ResolvedBinding> {
        self.map
            .closed_candidates(shape)
            .filter_map(|binding| {
                tag_precedence(&binding.tag, tag).map(|precedence| (precedence, binding))
            })
            .max_by_key(|(precedence, binding)| (*precedence, binding.id))
            .map(|(_, binding)| ResolvedBinding::new(binding, Substitution::default(), tag))
    }

    fn lookup_generic(
        &self,
        shape: &Shape,
        tag: &Tag,
        catalog: &dyn TypeCatalog,
    ) -> Result<Option<ResolvedBinding>, GraphError> {
        let mut violation = None;
        let mut matches = vec![];

        for (binding, contract) in self.map.open_candidates(shape) {
            let Some(precedence) = tag_precedence(&binding.tag, tag) else {
                continue;
            };

            match unify(contract, shape, catalog) {
                Ok(substitution) => matches.push((
                    (precedence, binding.id),
                    ResolvedBinding::new(binding, substitution, tag),
                )),
                Err(UnifyError::ConstraintViolation {
                    marker,
                    concrete,
                    constraint,
                }) => {
                    trace!(%shape, %contract, %marker, "Constraint violated while unifying.");
                    if violation.is_none() {
                        violation = Some(GraphError::ConstraintViolation {
                            marker,
                            concrete,
                            constraint,
                        });
                    }
                }
                Err(UnifyError::Mismatch) => {}
            }
        }

        let Some(best) = matches.iter().map(|(key, _)| *key).max() else {
            return violation.map_or(Ok(None), Err);
        };

        let mut winners = matches
            .into_iter()
            .filter(|(key, _)| *key == best)
            .map(|(_, resolved)| resolved)
            .dedup_by(|first, second| first.source == second.source);

        let winner = winners.next();
        if let (Some(first), Some(second)) = (&winner, winners.next()) {
            return Err(GraphError::AmbiguousGenericMatch {
                shape: shape.clone(),
                tag: tag.clone(),
                first: first.binding.id,
                second: second.binding.id,
            });
        }

        Ok(winner)
    }

    fn auto_bind(
        &self,
        shape: &Shape,
        tag: &Tag,
        catalog: &dyn TypeCatalog,
    ) -> Option<ResolvedBinding> {
        if !self.auto_binding.enabled || !tag.is_none() || shape.is_open() {
            return None;
        }

        let key = shape.head()?;
        if self.auto_binding.excluded.contains(key) {
            return None;
        }

        let descriptor = catalog.descriptor(key)?;
        if !descriptor.is_constructible() {
            return None;
        }

        descriptor.type_arguments(shape)?;

        debug!(%shape, "Synthesizing auto-binding.");

        let mut binding = Binding::implementation([shape.clone()], shape.clone())
            .with_lifetime(self.auto_binding.lifetime);
        binding.id = AUTO_BINDING_ID;

        Some(ResolvedBinding::new(&binding, Substitution::default(), tag))
    }
}

impl BindingRegistry for StaticBindingRegistry {
    fn lookup(
        &self,
        shape: &Shape,
        tag: &Tag,
        catalog: &dyn TypeCatalog,
    ) -> Result<ResolvedBinding, GraphError> {
        if let Some(resolved) = self.lookup_exact(shape, tag) {
            trace!(%shape, %tag, binding = resolved.binding.id, "Found exact binding.");
            return Ok(resolved);
        }

        let violation = match self.lookup_generic(shape, tag, catalog) {
            Ok(Some(resolved)) => {
                trace!(%shape, %tag, binding = resolved.binding.id, "Found generic binding.");
                return Ok(resolved);
            }
            Ok(None) => None,
            Err(error @ GraphError::ConstraintViolation { .. }) => Some(error),
            Err(error) => return Err(error),
        };

        if let Some(resolved) = self.auto_bind(shape, tag, catalog) {
            return Ok(resolved);
        }

        Err(violation.unwrap_or_else(|| GraphError::CannotResolve {
            shape: shape.clone(),
            tag: tag.clone(),
        }))
    }

    fn lookup_all(&self, shape: &Shape, catalog: &dyn TypeCatalog) -> Vec<ResolvedBinding> {
        let exact = self
            .map
            .closed_candidates(shape)
            .map(|binding| ResolvedBinding::new(binding, Substitution::default(), &binding.tag));

        let generic = self
            .map
            .open_candidates(shape)
            .filter_map(|(binding, contract)| {
                unify(contract, shape, catalog)
                    .ok()
                    .map(|substitution| ResolvedBinding::new(binding, substitution, &binding.tag))
            });

        let mut latest_by_tag: FxHashMap<Tag, ResolvedBinding> = FxHashMap::default();
        for resolved in exact.chain(generic) {
            match latest_by_tag.get(&resolved.tag) {
                Some(current) if current.binding.id >= resolved.binding.id => {}
                _ => {
                    latest_by_tag.insert(resolved.tag.clone(), resolved);
                }
            }
        }

        latest_by_tag
            .into_values()
            .sorted_by_key(|resolved| resolved.binding.id)
            .collect_vec()
    }

    #[inline]
    fn bindings(&self) -> &[Binding] {
        self.map.bindings()
    }
}

mod map {
    use crate::binding::{Binding, BindingSource};
    use crate::error::BindingRegistryError;
    use crate::shape::{Shape, TypeKey};
    use fxhash::FxHashMap;

    #[derive(Default, Clone, Debug)]
    pub(super) struct BindingMap {
        bindings: Vec<Binding>,
        closed: FxHashMap<Shape, Vec<usize>>,
        open: FxHashMap<TypeKey, Vec<(usize, usize)>>,
        // contracts which are a bare marker and match any shape
        wildcard: Vec<(usize, usize)>,
    }

    impl BindingMap {
        pub(super) fn try_register(
            &mut self,
            mut binding: Binding,
        ) -> Result<(), BindingRegistryError> {
            let index = self.bindings.len();
            binding.id = index;

            if binding.contracts.is_empty() {
                return Err(BindingRegistryError::EmptyContract(index));
            }

            if let BindingSource::Implementation(implementation) = &binding.source {
                Self::validate_implementation(index, &binding.contracts, implementation)?;
            }

            for (contract_index, contract) in binding.contracts.iter().enumerate() {
                match contract {
                    Shape::Marker(_) => self.wildcard.push((index, contract_index)),
                    contract if contract.is_open() => {
                        if let Some(head) = contract.head() {
                            self.open
                                .entry(head.clone())
                                .or_default()
                                .push((index, contract_index));
                        }
                    }
                    contract => {
                        let entries = self.closed.entry(contract.clone()).or_default();
                        // a binding listing the same contract twice is registered once
                        if entries.last() != Some(&index) {
                            entries.push(index);
                        }
                    }
                }
            }

            self.bindings.push(binding);
            Ok(())
        }

        fn validate_implementation(
            index: usize,
            contracts: &[Shape],
            implementation: &Shape,
        ) -> Result<(), BindingRegistryError> {
            let markers = implementation.marker_names();
            if markers.is_empty() {
                return Ok(());
            }

            for contract in contracts {
                if !contract.is_open() {
                    return Err(BindingRegistryError::OpenImplementation {
                        binding: index,
                        contract: contract.clone(),
                        implementation: implementation.clone(),
                    });
                }

                let contract_markers = contract.marker_names();
                if let Some(marker) = markers
                    .iter()
                    .find(|marker| !contract_markers.contains(*marker))
                {
                    return Err(BindingRegistryError::UnknownImplementationMarker {
                        binding: index,
                        implementation: implementation.clone(),
                        marker: marker.to_string(),
                    });
                }
            }

            Ok(())
        }

        pub(super) fn closed_candidates<'a>(
            &'a self,
            shape: &Shape,
        ) -> impl Iterator<Item = &'a Binding> + 'a {
            self.closed
                .get(shape)
                .into_iter()
                .flatten()
                .map(|index| &self.bindings[*index])
        }

        pub(super) fn open_candidates<'a>(
            &'a self,
            shape: &Shape,
        ) -> impl Iterator<Item = (&'a Binding, &'a Shape)> + 'a {
            shape
                .head()
                .and_then(|head| self.open.get(head))
                .into_iter()
                .flatten()
                .chain(self.wildcard.iter())
                .map(|(index, contract)| {
                    let binding = &self.bindings[*index];
                    (binding, &binding.contracts[*contract])
                })
        }

        #[inline]
        pub(super) fn bindings(&self) -> &[Binding] {
            &self.bindings
        }
    }

}

#[cfg(test)]
mod tests {
    use crate::binding::{Binding, FactoryExpr, InjectionRequest, Lifetime, Tag};
    use crate::catalog::{ConstructorDescriptor, StaticTypeCatalog, TypeDescriptor, TypeKind};
    use crate::error::GraphError;
    use crate::registry::{
        AutoBindingPolicy, BindingRegistry, ResolvedSource, StaticBindingRegistry,
        AUTO_BINDING_ID,
    };
    use crate::shape::{Marker, MarkerConstraint, Shape, TypeKey};

    fn sender() -> Shape {
        Shape::concrete("IMessageSender")
    }

    fn implementation(resolved: &crate::registry::ResolvedBinding) -> Shape {
        match &resolved.source {
            ResolvedSource::Implementation(shape) => shape.clone(),
            ResolvedSource::Factory(factory) => Shape::concrete(factory.name.clone()),
        }
    }

    fn create_catalog() -> StaticTypeCatalog {
        StaticTypeCatalog::new()
            .with_type(TypeDescriptor::new("int", TypeKind::Struct))
            .with_type(TypeDescriptor::new("string", TypeKind::Class))
            .with_type(
                TypeDescriptor::new("Clock", TypeKind::Class)
                    .with_constructor(ConstructorDescriptor::new([])),
            )
            .with_type(TypeDescriptor::new("IClock", TypeKind::Interface))
    }

    #[test]
    fn should_prefer_default_tag_for_untagged_request() {
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation([sender()], Shape::concrete("EmailSender"))
                    .with_tag(Tag::Default),
                Binding::implementation([sender()], Shape::concrete("SmsSender"))
                    .with_tag(Tag::text("Sms")),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();
        let catalog = create_catalog();

        let resolved = registry.lookup(&sender(), &Tag::None, &catalog).unwrap();
        assert_eq!(implementation(&resolved), Shape::concrete("EmailSender"));
        assert_eq!(resolved.tag, Tag::Default);

        let resolved = registry
            .lookup(&sender(), &Tag::text("Sms"), &catalog)
            .unwrap();
        assert_eq!(implementation(&resolved), Shape::concrete("SmsSender"));
    }

    #[test]
    fn should_prefer_exact_tag_over_any_and_default() {
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation([sender()], Shape::concrete("Untagged")),
                Binding::implementation([sender()], Shape::concrete("Wildcard")).with_tag(Tag::Any),
                Binding::implementation([sender()], Shape::concrete("Fallback"))
                    .with_tag(Tag::Default),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();
        let catalog = create_catalog();

        assert_eq!(
            implementation(&registry.lookup(&sender(), &Tag::None, &catalog).unwrap()),
            Shape::concrete("Untagged")
        );

        let resolved = registry
            .lookup(&sender(), &Tag::text("Push"), &catalog)
            .unwrap();
        assert_eq!(implementation(&resolved), Shape::concrete("Wildcard"));
        assert_eq!(resolved.tag, Tag::text("Push"));
    }

    #[test]
    fn should_match_any_tag_for_untagged_request() {
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation([sender()], Shape::concrete("Fallback"))
                    .with_tag(Tag::Default),
                Binding::implementation([sender()], Shape::concrete("Wildcard")).with_tag(Tag::Any),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        let resolved = registry
            .lookup(&sender(), &Tag::None, &create_catalog())
            .unwrap();
        assert_eq!(implementation(&resolved), Shape::concrete("Wildcard"));
        assert_eq!(resolved.tag, Tag::None);
    }

    #[test]
    fn should_let_later_declaration_override() {
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation([sender()], Shape::concrete("First")),
                Binding::implementation([sender()], Shape::concrete("Second")),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        let resolved = registry
            .lookup(&sender(), &Tag::None, &create_catalog())
            .unwrap();
        assert_eq!(implementation(&resolved), Shape::concrete("Second"));
        assert_eq!(resolved.binding.id, 1);
    }

    #[test]
    fn should_prefer_exact_shape_over_generic() {
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation(
                    [Shape::generic("IRepository", [Shape::concrete("User")])],
                    Shape::concrete("UserRepository"),
                ),
                Binding::implementation(
                    [Shape::generic("IRepository", [Shape::marker("TT")])],
                    Shape::generic("Repository", [Shape::marker("TT")]),
                ),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();
        let catalog = create_catalog();

        assert_eq!(
            implementation(
                &registry
                    .lookup(
                        &Shape::generic("IRepository", [Shape::concrete("User")]),
                        &Tag::None,
                        &catalog
                    )
                    .unwrap()
            ),
            Shape::concrete("UserRepository")
        );
        assert_eq!(
            implementation(
                &registry
                    .lookup(
                        &Shape::generic("IRepository", [Shape::concrete("Order")]),
                        &Tag::None,
                        &catalog
                    )
                    .unwrap()
            ),
            Shape::generic("Repository", [Shape::concrete("Order")])
        );
    }

    #[test]
    fn should_remap_generic_arguments() {
        let registry = StaticBindingRegistry::new(
            [Binding::implementation(
                [Shape::generic(
                    "IMap",
                    [Shape::marker("TT1"), Shape::marker("TT2")],
                )],
                Shape::generic("Map", [Shape::marker("TT2"), Shape::marker("TT1")]),
            )],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        let resolved = registry
            .lookup(
                &Shape::generic("IMap", [Shape::concrete("string"), Shape::concrete("int")]),
                &Tag::None,
                &create_catalog(),
            )
            .unwrap();

        assert_eq!(
            implementation(&resolved),
            Shape::generic("Map", [Shape::concrete("int"), Shape::concrete("string")])
        );
    }

    #[test]
    fn should_report_constraint_violation() {
        let registry = StaticBindingRegistry::new(
            [Binding::implementation(
                [Shape::generic(
                    "IBox",
                    [Shape::Marker(
                        Marker::new("TTS").with_constraint(MarkerConstraint::Struct),
                    )],
                )],
                Shape::generic("Box", [Shape::marker("TTS")]),
            )],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        assert_eq!(
            registry
                .lookup(
                    &Shape::generic("IBox", [Shape::concrete("string")]),
                    &Tag::None,
                    &create_catalog()
                )
                .unwrap_err(),
            GraphError::ConstraintViolation {
                marker: "TTS".to_string(),
                concrete: Shape::concrete("string"),
                constraint: MarkerConstraint::Struct,
            }
        );
    }

    #[test]
    fn should_detect_ambiguous_generic_match() {
        let registry = StaticBindingRegistry::new(
            [Binding::implementation(
                [
                    Shape::generic("IPair", [Shape::marker("TT1"), Shape::concrete("int")]),
                    Shape::generic("IPair", [Shape::concrete("int"), Shape::marker("TT1")]),
                ],
                Shape::generic("Pair", [Shape::marker("TT1")]),
            )],
            AutoBindingPolicy::default(),
        )
        .unwrap();
        let catalog = create_catalog();

        assert!(registry
            .lookup(
                &Shape::generic("IPair", [Shape::concrete("string"), Shape::concrete("int")]),
                &Tag::None,
                &catalog
            )
            .is_ok());
        assert!(registry
            .lookup(
                &Shape::generic("IPair", [Shape::concrete("int"), Shape::concrete("int")]),
                &Tag::None,
                &catalog
            )
            .is_ok());

        let registry = StaticBindingRegistry::new(
            [Binding::implementation(
                [
                    Shape::generic("IPair", [Shape::marker("TT1"), Shape::marker("TT2")]),
                    Shape::generic("IPair", [Shape::marker("TT2"), Shape::marker("TT1")]),
                ],
                Shape::generic("Pair", [Shape::marker("TT1"), Shape::marker("TT2")]),
            )],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        assert!(matches!(
            registry
                .lookup(
                    &Shape::generic("IPair", [Shape::concrete("string"), Shape::concrete("int")]),
                    &Tag::None,
                    &catalog
                )
                .unwrap_err(),
            GraphError::AmbiguousGenericMatch { .. }
        ));
    }

    #[test]
    fn should_auto_bind_constructible_types() {
        let registry = StaticBindingRegistry::new([], AutoBindingPolicy::default()).unwrap();
        let catalog = create_catalog();

        let resolved = registry
            .lookup(&Shape::concrete("Clock"), &Tag::None, &catalog)
            .unwrap();
        assert!(resolved.is_auto());
        assert_eq!(resolved.binding.id, AUTO_BINDING_ID);
        assert_eq!(resolved.binding.lifetime, Lifetime::Transient);

        assert_eq!(
            registry
                .lookup(&Shape::concrete("IClock"), &Tag::None, &catalog)
                .unwrap_err(),
            GraphError::CannotResolve {
                shape: Shape::concrete("IClock"),
                tag: Tag::None
            }
        );
        assert!(!registry.can_resolve(&Shape::concrete("Clock"), &Tag::text("x"), &catalog));
    }

    #[test]
    fn should_respect_auto_binding_policy() {
        let catalog = create_catalog();

        let registry = StaticBindingRegistry::new([], AutoBindingPolicy::disabled()).unwrap();
        assert!(!registry.can_resolve(&Shape::concrete("Clock"), &Tag::None, &catalog));

        let registry = StaticBindingRegistry::new(
            [],
            AutoBindingPolicy::default().excluding(TypeKey::new("Clock")),
        )
        .unwrap();
        assert!(!registry.can_resolve(&Shape::concrete("Clock"), &Tag::None, &catalog));
    }

    #[test]
    fn should_list_all_bindings_in_declaration_order() {
        let plugin = Shape::concrete("IPlugin");
        let registry = StaticBindingRegistry::new(
            [
                Binding::implementation([plugin.clone()], Shape::concrete("A"))
                    .with_tag(Tag::text("a")),
                Binding::implementation([plugin.clone()], Shape::concrete("B")),
                Binding::implementation([plugin.clone()], Shape::concrete("C"))
                    .with_tag(Tag::text("a")),
                Binding::implementation([Shape::concrete("Other")], Shape::concrete("D")),
            ],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        let all = registry.lookup_all(&plugin, &create_catalog());
        assert_eq!(
            all.iter().map(implementation).collect::<Vec<_>>(),
            vec![Shape::concrete("B"), Shape::concrete("C")]
        );
    }

    #[test]
    fn should_substitute_markers_in_factories() {
        let registry = StaticBindingRegistry::new(
            [Binding::factory(
                [Shape::generic("ICache", [Shape::marker("TT")])],
                FactoryExpr::new("CreateCache").with_injection(InjectionRequest::new(
                    Shape::generic("IStore", [Shape::marker("TT")]),
                )),
            )],
            AutoBindingPolicy::default(),
        )
        .unwrap();

        let resolved = registry
            .lookup(
                &Shape::generic("ICache", [Shape::concrete("int")]),
                &Tag::None,
                &create_catalog(),
            )
            .unwrap();

        let ResolvedSource::Factory(factory) = resolved.source else {
            panic!("expected factory");
        };
        assert_eq!(
            factory.body[0],
            crate::binding::FactoryStep::Inject(InjectionRequest::new(Shape::generic(
                "IStore",
                [Shape::concrete("int")]
            )))
        );
    }
}
