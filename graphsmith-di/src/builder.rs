//! Core functionality for building the [ConstructionGraph] of a single root.
//!
//! Every request is classified first. Plain requests consult the override stack, then the
//! [BindingRegistry]; the winning binding is either reused from the store of its [Lifetime] or
//! constructed, recursively resolving the dependencies of the selected constructor, members or
//! factory body. A `(shape, tag)` pair requested again while it is still being constructed is a
//! cycle. Deferred wrappers start a new block with a fresh set of pairs under construction, which
//! is what allows `Func<A>` to break an otherwise cyclic graph.

use crate::binding::{
    FactoryExpr, FactoryStep, InjectionRequest, Lifetime, RootArgument, RootKind, RootSpec,
    SiteKind, Tag,
};
use crate::catalog::{TypeCatalog, TypeDescriptor};
use crate::classify::{CollectionKind, RequestClassifier, Wrapper, CANCELLATION_TOKEN};
use crate::error::{Diagnostic, GraphError};
use crate::graph::{
    BlockId, ConstructionGraph, ConstructionNode, DeferredRef, Edge, NodeId, NodeKind,
};
use crate::overrides::{OverrideEntry, OverrideTarget, ResolutionScope};
use crate::registry::{BindingRegistry, ResolvedBinding, ResolvedSource};
use crate::scope::{InstanceKey, LifetimeStores, StoreLayout};
use crate::shape::Shape;
use crate::site::{candidate_sites, select_members, ConstructionRecipe, Resolvability};
use crate::unify::Substitution;
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::iter;
use std::mem;
use tracing::{debug, trace};

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
struct DeferredKey {
    wrapper: Wrapper,
    shape: Shape,
    tag: Tag,
    overrides: Vec<OverrideEntry>,
}

type PendingKey = (Shape, Tag);

/// Builder state restored when a constructor candidate cannot be built.
struct Checkpoint {
    graph: ConstructionGraph,
    stores: LifetimeStores,
    layout: StoreLayout,
    deferred: FxHashMap<DeferredKey, DeferredRef>,
    failure_path: Option<Vec<String>>,
}

/// Builds the graph of one root. Slots of shared lifetimes are allocated in the given
/// composition-wide [StoreLayout].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GraphBuilder<'a> {
    #[derivative(Debug = "ignore")]
    registry: &'a dyn BindingRegistry,
    #[derivative(Debug = "ignore")]
    catalog: &'a dyn TypeCatalog,
    classifier: &'a RequestClassifier,
    layout: &'a mut StoreLayout,
    max_depth: usize,
    root: String,
    graph: ConstructionGraph,
    stores: LifetimeStores,
    scope: ResolutionScope,
    under_construction: FxHashSet<PendingKey>,
    construction_stack: Vec<PendingKey>,
    path: Vec<String>,
    failure_path: Option<Vec<String>>,
    deferred: FxHashMap<DeferredKey, DeferredRef>,
    block: BlockId,
    cancellation: Option<RootArgument>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        registry: &'a dyn BindingRegistry,
        catalog: &'a dyn TypeCatalog,
        classifier: &'a RequestClassifier,
        layout: &'a mut StoreLayout,
        max_depth: usize,
    ) -> Self {
        Self {
            registry,
            catalog,
            classifier,
            layout,
            max_depth,
            root: String::new(),
            graph: Default::default(),
            stores: Default::default(),
            scope: Default::default(),
            under_construction: Default::default(),
            construction_stack: vec![],
            path: vec![],
            failure_path: None,
            deferred: Default::default(),
            block: BlockId::default(),
            cancellation: None,
        }
    }

    /// Builds the graph for the given root, returning the graph and its entry node.
    pub fn build(mut self, root: &RootSpec) -> Result<(ConstructionGraph, NodeId), Diagnostic> {
        debug!(root = %root.name, shape = %root.shape, "Building construction graph.");

        self.root = root.name.clone();
        for argument in &root.arguments {
            self.scope.insert(
                argument.shape.clone(),
                argument.tag.clone(),
                OverrideTarget::RootArgument {
                    name: argument.name.clone(),
                },
            );
        }

        self.cancellation = root
            .arguments
            .iter()
            .find(|argument| {
                argument.shape.head().map(|key| key.as_str()) == Some(CANCELLATION_TOKEN)
            })
            .cloned();

        let request = InjectionRequest::new(root.shape.clone())
            .with_tag(root.tag.clone())
            .with_site(SiteKind::Root, 0)
            .with_name(root.name.clone());

        let entry = match root.kind {
            RootKind::Builder => self.build_up_root(request),
            _ => self.resolve(request),
        };

        match entry {
            Ok(entry) => {
                debug!(
                    root = %root.name,
                    nodes = self.graph.len(),
                    blocks = self.graph.block_count(),
                    "Construction graph built."
                );
                Ok((self.graph, entry))
            }
            Err(error) => Err(Diagnostic {
                root: root.name.clone(),
                path: self.failure_path.unwrap_or_default(),
                error,
            }),
        }
    }

    /// Runs `build` with `segment` appended to the request path, recording the path of the first
    /// failure.
    fn traced<F>(&mut self, segment: String, build: F) -> Result<NodeId, GraphError>
    where
        F: FnOnce(&mut Self) -> Result<NodeId, GraphError>,
    {
        self.path.push(segment);

        let result = if self.path.len() > self.max_depth {
            Err(GraphError::DepthLimitExceeded(self.max_depth))
        } else {
            build(self)
        };

        if result.is_err() && self.failure_path.is_none() {
            self.failure_path = Some(self.path.clone());
        }

        self.path.pop();
        result
    }

    fn resolve(&mut self, request: InjectionRequest) -> Result<NodeId, GraphError> {
        Ok(self.resolve_edge(request)?.target.node())
    }

    /// Resolves a request into an edge carrying the classified request.
    fn resolve_edge(&mut self, request: InjectionRequest) -> Result<Edge, GraphError> {
        let request = self.classifier.classify_request(request);
        let node = self.traced(request.to_string(), |builder| {
            builder.resolve_classified(&request)
        })?;

        Ok(Edge::new(request, node))
    }

    fn resolve_classified(&mut self, request: &InjectionRequest) -> Result<NodeId, GraphError> {
        match &request.wrapper {
            Wrapper::None => self.resolve_value(request),
            Wrapper::Collection(kind) => self.resolve_collection(request, *kind),
            Wrapper::WeakRef => {
                let value = self.resolve_edge(self.core_request(request))?;
                Ok(self.graph.add(
                    ConstructionNode::new(
                        NodeKind::WeakRef,
                        request.shape.clone(),
                        request.tag.clone(),
                        self.block,
                    )
                    .with_children(vec![value]),
                ))
            }
            Wrapper::Func { arguments } => self.resolve_deferred(
                request,
                arguments,
                NodeKind::Func {
                    arguments: arguments.clone(),
                },
            ),
            Wrapper::Lazy => self.resolve_deferred(request, &[], NodeKind::Lazy),
            Wrapper::Task(kind) => {
                self.resolve_deferred(request, &[], NodeKind::Task { kind: *kind })
            }
            Wrapper::Owned => self.resolve_deferred(
                request,
                &[],
                NodeKind::Owned {
                    tracker: self.block,
                },
            ),
        }
    }

    /// Strips the outer wrapper, classifying what remains.
    fn core_request(&self, request: &InjectionRequest) -> InjectionRequest {
        self.classifier.classify_request(InjectionRequest {
            wrapper: Wrapper::None,
            ..request.clone()
        })
    }

    fn resolve_value(&mut self, request: &InjectionRequest) -> Result<NodeId, GraphError> {
        if let Some(target) = self.scope.lookup(&request.shape, &request.tag).cloned() {
            trace!(%request, %target, "Using override.");
            return Ok(self.add_override(request, target));
        }

        let resolved = match self
            .registry
            .lookup(&request.shape, &request.tag, self.catalog)
        {
            Ok(resolved) => resolved,
            Err(GraphError::CannotResolve { .. }) if request.has_default => {
                trace!(%request, "Using default value.");
                return Ok(self.graph.add(ConstructionNode::new(
                    NodeKind::DefaultValue,
                    request.shape.clone(),
                    request.tag.clone(),
                    self.block,
                )));
            }
            Err(error) => return Err(error),
        };

        self.resolve_binding(request, &resolved)
    }

    fn resolve_binding(
        &mut self,
        request: &InjectionRequest,
        resolved: &ResolvedBinding,
    ) -> Result<NodeId, GraphError> {
        let pending = (request.shape.clone(), request.tag.clone());
        if self.under_construction.contains(&pending) {
            return Err(self.cycle_error(&pending));
        }

        let lifetime = resolved.binding.lifetime;
        let instance_key = self.instance_key(resolved);
        if let Some(node) = self.stores.store(lifetime).instance(&instance_key) {
            trace!(%request, %node, %lifetime, "Reusing instance.");
            return Ok(node);
        }

        self.under_construction.insert(pending.clone());
        self.construction_stack.push(pending.clone());
        let node = self.construct(request, resolved);
        self.construction_stack.pop();
        self.under_construction.remove(&pending);

        let node = node?;

        self.stores
            .store_mut(lifetime)
            .store_instance(&instance_key, node);

        let slot = self.layout.slot_for(&self.root, lifetime, &instance_key);
        if let Some(built) = self.graph.node_mut(node) {
            built.slot = slot;
        }

        Ok(node)
    }

    fn instance_key(&self, resolved: &ResolvedBinding) -> InstanceKey {
        let context = match resolved.binding.lifetime {
            Lifetime::PerBlock | Lifetime::PerResolve => self.scope.visible(),
            _ => vec![],
        };

        InstanceKey {
            binding: resolved.binding.id,
            source: resolved.source.clone(),
            tag: resolved.tag.clone(),
            context,
        }
    }

    fn cycle_error(&self, pending: &PendingKey) -> GraphError {
        let start = self
            .construction_stack
            .iter()
            .position(|entry| entry == pending)
            .unwrap_or_default();

        GraphError::CyclicDependency(
            self.construction_stack[start..]
                .iter()
                .chain(iter::once(pending))
                .map(|(shape, tag)| {
                    if tag.is_none() {
                        shape.to_string()
                    } else {
                        format!("{shape}({tag})")
                    }
                })
                .collect_vec(),
        )
    }

    fn construct(
        &mut self,
        request: &InjectionRequest,
        resolved: &ResolvedBinding,
    ) -> Result<NodeId, GraphError> {
        match &resolved.source {
            ResolvedSource::Implementation(implementation) => {
                self.construct_implementation(request, resolved, implementation)
            }
            ResolvedSource::Factory(factory) => self.invoke_factory(request, resolved, factory),
        }
    }

    fn descriptor(&self, shape: &Shape, tag: &Tag) -> Result<TypeDescriptor, GraphError> {
        shape
            .head()
            .and_then(|key| self.catalog.descriptor(key))
            .ok_or_else(|| GraphError::CannotResolve {
                shape: shape.clone(),
                tag: tag.clone(),
            })
    }

    fn type_arguments(
        descriptor: &TypeDescriptor,
        shape: &Shape,
        tag: &Tag,
    ) -> Result<Substitution, GraphError> {
        descriptor
            .type_arguments(shape)
            .ok_or_else(|| GraphError::CannotResolve {
                shape: shape.clone(),
                tag: tag.clone(),
            })
    }

    fn construct_implementation(
        &mut self,
        request: &InjectionRequest,
        resolved: &ResolvedBinding,
        implementation: &Shape,
    ) -> Result<NodeId, GraphError> {
        let descriptor = self.descriptor(implementation, &resolved.tag)?;
        if !descriptor.is_constructible() {
            return Err(GraphError::CannotResolve {
                shape: implementation.clone(),
                tag: resolved.tag.clone(),
            });
        }

        let type_arguments = Self::type_arguments(&descriptor, implementation, &resolved.tag)?;
        let candidates = candidate_sites(&descriptor, implementation, &type_arguments, &*self)?;
        let (constructor, children) = self.build_first_candidate(implementation, candidates)?;

        trace!(
            %request,
            %implementation,
            binding = resolved.binding.id,
            constructor,
            "Constructed implementation."
        );

        Ok(self.add_bound(
            NodeKind::Construct {
                implementation: implementation.clone(),
                type_arguments: owned_entries(&type_arguments),
                constructor,
            },
            request,
            resolved,
            children,
        ))
    }

    /// Builds the dependencies of the first candidate whose whole subgraph can be built. A failed
    /// candidate is rolled back before trying the next one. If every candidate fails, the error of
    /// the first one is returned.
    fn build_first_candidate(
        &mut self,
        implementation: &Shape,
        candidates: Vec<ConstructionRecipe>,
    ) -> Result<(usize, Vec<Edge>), GraphError> {
        if let [recipe] = candidates.as_slice() {
            let children = self.resolve_all(recipe.requests().cloned())?;
            return Ok((recipe.constructor, children));
        }

        let mut first_failure = None;
        for recipe in candidates {
            let checkpoint = self.checkpoint();
            match self.resolve_all(recipe.requests().cloned()) {
                Ok(children) => return Ok((recipe.constructor, children)),
                Err(error) => {
                    trace!(
                        %implementation,
                        constructor = recipe.constructor,
                        %error,
                        "Constructor cannot be built, trying next candidate."
                    );

                    let failure_path = self.failure_path.take();
                    self.restore(checkpoint);
                    first_failure.get_or_insert((error, failure_path));
                }
            }
        }

        let (error, failure_path) = first_failure
            .ok_or_else(|| GraphError::NoEligibleConstructor(implementation.clone()))?;
        self.failure_path = failure_path;
        Err(error)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            graph: self.graph.clone(),
            stores: self.stores.clone(),
            layout: self.layout.clone(),
            deferred: self.deferred.clone(),
            failure_path: self.failure_path.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.graph = checkpoint.graph;
        self.stores = checkpoint.stores;
        *self.layout = checkpoint.layout;
        self.deferred = checkpoint.deferred;
        self.failure_path = checkpoint.failure_path;
    }

    fn invoke_factory(
        &mut self,
        request: &InjectionRequest,
        resolved: &ResolvedBinding,
        factory: &FactoryExpr,
    ) -> Result<NodeId, GraphError> {
        trace!(
            %request,
            factory = %factory.name,
            binding = resolved.binding.id,
            "Invoking factory."
        );

        self.scope.push();
        let children = self.run_factory_body(factory);
        self.scope.pop();

        Ok(self.add_bound(
            NodeKind::Factory {
                name: factory.name.clone(),
                type_arguments: owned_entries(&resolved.substitution),
            },
            request,
            resolved,
            children?,
        ))
    }

    fn run_factory_body(&mut self, factory: &FactoryExpr) -> Result<Vec<Edge>, GraphError> {
        let mut children = vec![];
        for step in &factory.body {
            match step {
                FactoryStep::Override { shape, tag, value } => {
                    self.scope
                        .insert(shape.clone(), tag.clone(), value.clone().into());
                }
                FactoryStep::Inject(request) => {
                    let request = request.clone().with_site(SiteKind::Factory, children.len());
                    children.push(self.resolve_edge(request)?);
                }
            }
        }

        Ok(children)
    }

    fn resolve_all<I>(&mut self, requests: I) -> Result<Vec<Edge>, GraphError>
    where
        I: IntoIterator<Item = InjectionRequest>,
    {
        requests
            .into_iter()
            .map(|request| self.resolve_edge(request))
            .collect()
    }

    fn resolve_deferred(
        &mut self,
        request: &InjectionRequest,
        arguments: &[Shape],
        kind: NodeKind,
    ) -> Result<NodeId, GraphError> {
        let core = self.core_request(request);

        self.scope.push();
        for (index, argument) in arguments.iter().enumerate() {
            self.scope.insert(
                argument.clone(),
                Tag::None,
                OverrideTarget::FactoryArgument { index },
            );
        }

        let deferred = self.deferred_block(&request.wrapper, &core);
        self.scope.pop();

        let mut children = vec![Edge::deferred(core, deferred?)];

        if let (NodeKind::Task { .. }, Some(token)) = (&kind, self.cancellation.clone()) {
            let token_request = InjectionRequest::new(token.shape)
                .with_tag(token.tag)
                .with_site(SiteKind::Factory, 1)
                .with_name(token.name);
            children.push(self.resolve_edge(token_request)?);
        }

        Ok(self.graph.add(
            ConstructionNode::new(kind, request.shape.clone(), request.tag.clone(), self.block)
                .with_children(children),
        ))
    }

    /// Returns the block producing the core value, building it on first use. The block sees no
    /// pairs under construction and gets its own per-block store.
    fn deferred_block(
        &mut self,
        wrapper: &Wrapper,
        core: &InjectionRequest,
    ) -> Result<DeferredRef, GraphError> {
        let key = DeferredKey {
            wrapper: wrapper.clone(),
            shape: core.shape.clone(),
            tag: core.tag.clone(),
            overrides: self.scope.visible(),
        };

        if let Some(deferred) = self.deferred.get(&key) {
            trace!(request = %core, entry = %deferred.entry, "Reusing deferred block.");
            return Ok(*deferred);
        }

        let deferred = self.graph.open_block(core.shape.clone(), core.tag.clone());
        self.deferred.insert(key, deferred);

        trace!(request = %core, entry = %deferred.entry, "Opening deferred block.");

        let under_construction = mem::take(&mut self.under_construction);
        let construction_stack = mem::take(&mut self.construction_stack);
        let block = mem::replace(&mut self.block, deferred.block);
        self.stores.enter_block();

        let value = self.resolve_edge(core.clone());

        self.stores.exit_block();
        self.block = block;
        self.construction_stack = construction_stack;
        self.under_construction = under_construction;

        self.graph.complete_block(deferred, value?);

        Ok(deferred)
    }

    fn resolve_collection(
        &mut self,
        request: &InjectionRequest,
        kind: CollectionKind,
    ) -> Result<NodeId, GraphError> {
        let elements = self.registry.lookup_all(&request.shape, self.catalog);

        trace!(%request, elements = elements.len(), "Resolving collection.");

        let mut children = Vec::with_capacity(elements.len());
        for (index, resolved) in elements.iter().enumerate() {
            let element = InjectionRequest {
                shape: request.shape.clone(),
                tag: resolved.tag.clone(),
                wrapper: Wrapper::None,
                site: request.site,
                ordinal: index,
                name: request.name.clone(),
                has_default: false,
            };

            let node = self.traced(element.to_string(), |builder| {
                builder.resolve_binding(&element, resolved)
            })?;
            children.push(Edge::new(element, node));
        }

        Ok(self.graph.add(
            ConstructionNode::new(
                NodeKind::Collection {
                    kind,
                    streaming: kind.is_streaming(),
                },
                request.shape.clone(),
                request.tag.clone(),
                self.block,
            )
            .with_children(children),
        ))
    }

    fn build_up_root(&mut self, request: InjectionRequest) -> Result<NodeId, GraphError> {
        self.traced(request.to_string(), |builder| {
            let target = request.shape.clone();
            let descriptor = builder.descriptor(&target, &request.tag)?;
            if descriptor.is_constructible() {
                return builder.build_up(&request, &target, &descriptor);
            }

            let cases = builder.catalog.implementers(&target);
            if cases.is_empty() {
                return Err(GraphError::CannotResolve {
                    shape: target,
                    tag: request.tag.clone(),
                });
            }

            debug!(%target, cases = cases.len(), "Dispatching builder over implementers.");

            let mut children = Vec::with_capacity(cases.len());
            for (index, case) in cases.iter().enumerate() {
                let case_request = InjectionRequest::new(case.clone())
                    .with_tag(request.tag.clone())
                    .with_site(SiteKind::Root, index)
                    .with_name(request.name.clone());
                let descriptor = builder.descriptor(case, &request.tag)?;
                let node = builder.traced(case_request.to_string(), |builder| {
                    builder.build_up(&case_request, case, &descriptor)
                })?;

                children.push(Edge::new(case_request, node));
            }

            Ok(builder.graph.add(
                ConstructionNode::new(
                    NodeKind::Dispatch {
                        target: target.clone(),
                        cases,
                    },
                    target,
                    request.tag.clone(),
                    builder.block,
                )
                .with_children(children),
            ))
        })
    }

    fn build_up(
        &mut self,
        request: &InjectionRequest,
        target: &Shape,
        descriptor: &TypeDescriptor,
    ) -> Result<NodeId, GraphError> {
        let type_arguments = Self::type_arguments(descriptor, target, &request.tag)?;
        let members = select_members(descriptor, &type_arguments);
        let children = self.resolve_all(members.into_iter().flat_map(|member| member.requests))?;

        Ok(self.graph.add(
            ConstructionNode::new(
                NodeKind::BuildUp {
                    target: target.clone(),
                },
                target.clone(),
                request.tag.clone(),
                self.block,
            )
            .with_children(children),
        ))
    }

    fn add_override(&mut self, request: &InjectionRequest, target: OverrideTarget) -> NodeId {
        let kind = match target {
            OverrideTarget::Expr(expr) => NodeKind::Override { expr },
            OverrideTarget::FactoryArgument { index } => NodeKind::FactoryArgument { index },
            OverrideTarget::RootArgument { name } => NodeKind::RootArgument { name },
        };

        self.graph.add(ConstructionNode::new(
            kind,
            request.shape.clone(),
            request.tag.clone(),
            self.block,
        ))
    }

    fn add_bound(
        &mut self,
        kind: NodeKind,
        request: &InjectionRequest,
        resolved: &ResolvedBinding,
        children: Vec<Edge>,
    ) -> NodeId {
        let mut node = ConstructionNode::new(
            kind,
            request.shape.clone(),
            resolved.tag.clone(),
            self.block,
        )
        .with_lifetime(resolved.binding.lifetime)
        .with_children(children);

        if !resolved.is_auto() {
            node = node.with_binding(resolved.binding.id);
        }

        self.graph.add(node)
    }
}

impl Resolvability for GraphBuilder<'_> {
    fn is_resolvable(&self, request: &InjectionRequest) -> bool {
        if request.has_default {
            return true;
        }

        let request = self.classifier.classify_request(request.clone());
        match &request.wrapper {
            Wrapper::None => {
                self.scope.lookup(&request.shape, &request.tag).is_some()
                    || self
                        .registry
                        .can_resolve(&request.shape, &request.tag, self.catalog)
            }
            Wrapper::Collection(_) => true,
            _ => self.is_resolvable(&self.core_request(&request)),
        }
    }
}

fn owned_entries(substitution: &Substitution) -> Vec<(String, Shape)> {
    substitution
        .entries()
        .into_iter()
        .map(|(name, shape)| (name.to_string(), shape.clone()))
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use crate::binding::{
        Binding, FactoryExpr, InjectionRequest, Lifetime, OverrideValue, RootArgument, RootKind,
        RootSpec, SiteKind, Tag,
    };
    use crate::builder::GraphBuilder;
    use crate::catalog::{
        ConstructorDescriptor, MemberDescriptor, MockTypeCatalog, ParameterDescriptor,
        StaticTypeCatalog, TypeDescriptor, TypeKind,
    };
    use crate::classify::{RequestClassifier, Wrapper};
    use crate::error::GraphError;
    use crate::graph::{ConstructionGraph, EdgeTarget, NodeId, NodeKind};
    use crate::registry::{AutoBindingPolicy, StaticBindingRegistry};
    use crate::scope::StoreLayout;
    use crate::shape::Shape;

    fn class(name: &str, dependencies: &[(&str, &str)]) -> TypeDescriptor {
        TypeDescriptor::new(name, TypeKind::Class).with_constructor(ConstructorDescriptor::new(
            dependencies.iter().map(|(parameter, shape)| {
                ParameterDescriptor::new(*parameter, Shape::concrete(*shape))
            }),
        ))
    }

    fn build(
        catalog: &StaticTypeCatalog,
        bindings: Vec<Binding>,
        root: &RootSpec,
    ) -> Result<(ConstructionGraph, NodeId), crate::error::Diagnostic> {
        let registry = StaticBindingRegistry::new(bindings, AutoBindingPolicy::default()).unwrap();
        let classifier = RequestClassifier::default();
        let mut layout = StoreLayout::new(true);
        GraphBuilder::new(&registry, catalog, &classifier, &mut layout, 64).build(root)
    }

    fn child(graph: &ConstructionGraph, node: NodeId, index: usize) -> NodeId {
        graph.node(node).unwrap().children[index].target.node()
    }

    #[test]
    fn should_resolve_dependencies_through_bindings() {
        let catalog = StaticTypeCatalog::new()
            .with_type(class("Service", &[("repository", "IRepository")]))
            .with_type(class("Repository", &[]))
            .with_type(TypeDescriptor::new("IRepository", TypeKind::Interface));

        let (graph, entry) = build(
            &catalog,
            vec![Binding::implementation(
                [Shape::concrete("IRepository")],
                Shape::concrete("Repository"),
            )],
            &RootSpec::new("Root", Shape::concrete("Service")),
        )
        .unwrap();

        let repository = child(&graph, entry, 0);
        assert!(matches!(
            &graph.node(repository).unwrap().kind,
            NodeKind::Construct { implementation, .. }
                if *implementation == Shape::concrete("Repository")
        ));
        assert_eq!(graph.node(repository).unwrap().binding, Some(0));
        assert_eq!(graph.node(entry).unwrap().binding, None);
    }

    #[test]
    fn should_detect_cycles() {
        let catalog = StaticTypeCatalog::new()
            .with_type(class("A", &[("b", "B")]))
            .with_type(class("B", &[("a", "A")]));

        let diagnostic = build(&catalog, vec![], &RootSpec::new("Root", Shape::concrete("A")))
            .unwrap_err();

        assert_eq!(
            diagnostic.error,
            GraphError::CyclicDependency(vec!["A".to_string(), "B".to_string(), "A".to_string()])
        );
        assert_eq!(diagnostic.path, vec!["A", "B", "A"]);
    }

    #[test]
    fn should_break_cycles_with_deferred_wrappers() {
        let catalog = StaticTypeCatalog::new()
            .with_type(TypeDescriptor::new("A", TypeKind::Class).with_constructor(
                ConstructorDescriptor::new([ParameterDescriptor::new(
                    "b",
                    Shape::generic("Func", [Shape::concrete("B")]),
                )]),
            ))
            .with_type(class("B", &[("a", "A")]));

        let (graph, entry) =
            build(&catalog, vec![], &RootSpec::new("Root", Shape::concrete("A"))).unwrap();

        let func = child(&graph, entry, 0);
        assert!(matches!(
            graph.node(func).unwrap().children[0].target,
            EdgeTarget::Deferred(_)
        ));
        assert_eq!(graph.deferred_blocks().len(), 1);
    }

    #[test]
    fn should_share_per_block_instances_within_block() {
        let catalog = StaticTypeCatalog::new()
            .with_type(class("Service", &[("first", "Session"), ("second", "Session")]))
            .with_type(class("Session", &[]));

        let (graph, entry) = build(
            &catalog,
            vec![Binding::implementation(
                [Shape::concrete("Session")],
                Shape::concrete("Session"),
            )
            .with_lifetime(Lifetime::PerBlock)],
            &RootSpec::new("Root", Shape::concrete("Service")),
        )
        .unwrap();

        assert_eq!(child(&graph, entry, 0), child(&graph, entry, 1));
    }

    #[test]
    fn should_apply_factory_overrides_in_order() {
        let catalog = StaticTypeCatalog::new().with_type(class("Greeter", &[("name", "string")]));

        let factory = FactoryExpr::new("CreateGreeter")
            .with_injection(InjectionRequest::new(Shape::concrete("string")))
            .with_override(
                Shape::concrete("string"),
                Tag::None,
                OverrideValue::Expr("\"World\"".to_string()),
            )
            .with_injection(InjectionRequest::new(Shape::concrete("Greeter")));

        let (graph, entry) = build(
            &catalog,
            vec![Binding::factory([Shape::concrete("IGreeter")], factory)],
            &RootSpec::new("Root", Shape::concrete("IGreeter"))
                .with_argument(RootArgument::new("name", Shape::concrete("string"))),
        )
        .unwrap();

        let first = child(&graph, entry, 0);
        assert_eq!(
            graph.node(first).unwrap().kind,
            NodeKind::RootArgument {
                name: "name".to_string()
            }
        );

        let greeter = child(&graph, entry, 1);
        let name = child(&graph, greeter, 0);
        assert_eq!(
            graph.node(name).unwrap().kind,
            NodeKind::Override {
                expr: "\"World\"".to_string()
            }
        );
    }

    #[test]
    fn should_use_default_values() {
        let catalog = StaticTypeCatalog::new().with_type(
            TypeDescriptor::new("Client", TypeKind::Class).with_constructor(
                ConstructorDescriptor::new([
                    ParameterDescriptor::new("timeout", Shape::concrete("TimeSpan")).with_default(),
                ]),
            ),
        );

        let (graph, entry) =
            build(&catalog, vec![], &RootSpec::new("Root", Shape::concrete("Client"))).unwrap();

        assert_eq!(
            graph.node(child(&graph, entry, 0)).unwrap().kind,
            NodeKind::DefaultValue
        );
    }

    #[test]
    fn should_limit_resolution_depth() {
        let catalog = StaticTypeCatalog::new()
            .with_type(class("A", &[("b", "B")]))
            .with_type(class("B", &[("c", "C")]))
            .with_type(class("C", &[]));
        let registry = StaticBindingRegistry::new(vec![], AutoBindingPolicy::default()).unwrap();
        let classifier = RequestClassifier::default();
        let mut layout = StoreLayout::new(true);

        let diagnostic = GraphBuilder::new(&registry, &catalog, &classifier, &mut layout, 2)
            .build(&RootSpec::new("Root", Shape::concrete("A")))
            .unwrap_err();

        assert_eq!(diagnostic.error, GraphError::DepthLimitExceeded(2));
    }

    #[test]
    fn should_build_up_members() {
        let catalog = StaticTypeCatalog::new()
            .with_type(
                TypeDescriptor::new("Page", TypeKind::Class)
                    .with_member(MemberDescriptor::property("Clock", Shape::concrete("Clock"))),
            )
            .with_type(class("Clock", &[]));

        let (graph, entry) = build(
            &catalog,
            vec![],
            &RootSpec::new("BuildUp", Shape::concrete("Page")).with_kind(RootKind::Builder),
        )
        .unwrap();

        let node = graph.node(entry).unwrap();
        assert_eq!(
            node.kind,
            NodeKind::BuildUp {
                target: Shape::concrete("Page")
            }
        );
        assert_eq!(node.children[0].request.name, "Clock");
    }

    #[test]
    fn should_record_classified_requests_on_factory_edges() {
        let catalog = StaticTypeCatalog::new().with_type(class("Greeter", &[]));

        let factory = FactoryExpr::new("CreateGreeting")
            .with_injection(InjectionRequest::new(Shape::generic(
                "Lazy",
                [Shape::concrete("Greeter")],
            )))
            .with_injection(InjectionRequest::new(Shape::concrete("Greeter")));

        let (graph, entry) = build(
            &catalog,
            vec![Binding::factory([Shape::concrete("IGreeting")], factory)],
            &RootSpec::new("Root", Shape::concrete("IGreeting")),
        )
        .unwrap();

        let edges = &graph.node(entry).unwrap().children;
        assert_eq!(edges[0].request.shape, Shape::concrete("Greeter"));
        assert_eq!(edges[0].request.wrapper, Wrapper::Lazy);
        assert_eq!(edges[0].request.site, SiteKind::Factory);
        assert_eq!(edges[0].request.ordinal, 0);
        assert_eq!(edges[1].request.shape, Shape::concrete("Greeter"));
        assert_eq!(edges[1].request.wrapper, Wrapper::None);
        assert_eq!(edges[1].request.ordinal, 1);
        assert!(matches!(
            graph.node(edges[0].target.node()).unwrap().kind,
            NodeKind::Lazy
        ));
    }

    #[test]
    fn should_fall_back_to_next_buildable_constructor() {
        let catalog = StaticTypeCatalog::new()
            .with_type(
                class("Service", &[("dependency", "Dependency")])
                    .with_constructor(ConstructorDescriptor::new([])),
            )
            .with_type(class("Dependency", &[("missing", "IMissing")]))
            .with_type(TypeDescriptor::new("IMissing", TypeKind::Interface));

        let (graph, entry) = build(
            &catalog,
            vec![],
            &RootSpec::new("Root", Shape::concrete("Service")),
        )
        .unwrap();

        assert!(matches!(
            graph.node(entry).unwrap().kind,
            NodeKind::Construct { constructor: 1, .. }
        ));
        assert_eq!(graph.nodes().len(), 1);
    }

    #[test]
    fn should_report_first_constructor_failure_when_none_can_be_built() {
        let catalog = StaticTypeCatalog::new()
            .with_type(
                class("Service", &[("dependency", "Dependency")]).with_constructor(
                    ConstructorDescriptor::new([ParameterDescriptor::new(
                        "other",
                        Shape::concrete("Other"),
                    )]),
                ),
            )
            .with_type(class("Dependency", &[("inner", "Inner")]))
            .with_type(class("Inner", &[("missing", "IMissing")]))
            .with_type(class("Other", &[("absent", "IAbsent")]))
            .with_type(TypeDescriptor::new("IMissing", TypeKind::Interface))
            .with_type(TypeDescriptor::new("IAbsent", TypeKind::Interface));

        let diagnostic = build(
            &catalog,
            vec![],
            &RootSpec::new("Root", Shape::concrete("Service")),
        )
        .unwrap_err();

        assert_eq!(
            diagnostic.error,
            GraphError::NoEligibleConstructor(Shape::concrete("Inner"))
        );
        assert_eq!(diagnostic.path, vec!["Service", "Dependency", "Inner"]);
    }

    #[test]
    fn should_report_unconstructible_implementations() {
        let mut catalog = MockTypeCatalog::new();
        catalog
            .expect_descriptor()
            .returning(|key| Some(TypeDescriptor::new(key.as_str(), TypeKind::Interface)));

        let registry = StaticBindingRegistry::new(vec![], AutoBindingPolicy::default()).unwrap();
        let classifier = RequestClassifier::default();
        let mut layout = StoreLayout::new(true);

        let diagnostic = GraphBuilder::new(&registry, &catalog, &classifier, &mut layout, 8)
            .build(&RootSpec::new("Root", Shape::concrete("IService")))
            .unwrap_err();

        assert_eq!(
            diagnostic.error,
            GraphError::CannotResolve {
                shape: Shape::concrete("IService"),
                tag: Tag::None,
            }
        );
    }
}
