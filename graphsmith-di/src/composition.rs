//! A composition ties a [BindingRegistry] to a [TypeCatalog] and compiles roots into
//! [RootPlans](RootPlan). Roots are built independently - a failing root is reported as a
//! [Diagnostic] and does not affect the others. Slots of shared lifetimes are allocated in one
//! [StoreLayout] for the whole composition.

use crate::binding::{Binding, BindingDeclarationSet, RootSpec};
use crate::builder::GraphBuilder;
use crate::catalog::TypeCatalog;
use crate::classify::RequestClassifier;
use crate::error::{BindingRegistryError, Diagnostic};
use crate::plan::{CompositionPlan, RootPlan};
use crate::registry::{AutoBindingPolicy, BindingRegistry, StaticBindingRegistry};
use crate::scope::StoreLayout;
use derivative::Derivative;
use itertools::Itertools;
use tracing::{debug, info};

pub type BindingRegistryPtr<'a> = Box<dyn BindingRegistry + 'a>;

/// Options controlling graph building.
#[derive(Clone, Debug)]
pub struct ResolverOptions {
    /// Mark shared slots for double-checked locking.
    pub thread_safe: bool,
    /// Maximum number of nested requests in a single root.
    pub max_resolution_depth: usize,
    pub auto_binding: AutoBindingPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            thread_safe: true,
            max_resolution_depth: 256,
            auto_binding: Default::default(),
        }
    }
}

/// Builder for [Composition] with sensible defaults, for easy construction.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CompositionBuilder<'a> {
    #[derivative(Debug = "ignore")]
    catalog: &'a dyn TypeCatalog,
    options: ResolverOptions,
    classifier: RequestClassifier,
}

impl<'a> CompositionBuilder<'a> {
    /// Creates a new builder with a default configuration.
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self {
            catalog,
            options: Default::default(),
            classifier: Default::default(),
        }
    }

    /// Sets new [ResolverOptions].
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets new [RequestClassifier].
    pub fn with_classifier(mut self, classifier: RequestClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Builds a [Composition] backed by a [StaticBindingRegistry] with the given bindings.
    pub fn build<B: IntoIterator<Item = Binding>>(
        self,
        bindings: B,
    ) -> Result<Composition<'a>, BindingRegistryError> {
        let registry = StaticBindingRegistry::new(bindings, self.options.auto_binding.clone())?;
        Ok(self.build_with_registry(Box::new(registry)))
    }

    /// Builds a [Composition] backed by a custom registry. Auto-binding options are then up to
    /// the registry.
    pub fn build_with_registry(self, registry: BindingRegistryPtr<'a>) -> Composition<'a> {
        Composition {
            registry,
            catalog: self.catalog,
            options: self.options,
            classifier: self.classifier,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Composition<'a> {
    #[derivative(Debug = "ignore")]
    registry: BindingRegistryPtr<'a>,
    #[derivative(Debug = "ignore")]
    catalog: &'a dyn TypeCatalog,
    options: ResolverOptions,
    classifier: RequestClassifier,
}

impl<'a> Composition<'a> {
    #[inline]
    pub fn registry(&self) -> &dyn BindingRegistry {
        self.registry.as_ref()
    }

    #[inline]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Builds a single root with its own store layout.
    pub fn build_root(&self, root: &RootSpec) -> Result<RootPlan, Diagnostic> {
        let mut layout = StoreLayout::new(self.options.thread_safe);
        self.build_root_in(root, &mut layout)
    }

    /// Builds a single root, allocating slots in the given layout. The layout is left untouched
    /// when the root fails.
    pub fn build_root_in(
        &self,
        root: &RootSpec,
        layout: &mut StoreLayout,
    ) -> Result<RootPlan, Diagnostic> {
        let mut root_layout = layout.clone();
        let (graph, entry) = GraphBuilder::new(
            self.registry.as_ref(),
            self.catalog,
            &self.classifier,
            &mut root_layout,
            self.options.max_resolution_depth,
        )
        .build(root)?;

        *layout = root_layout;

        let slots = graph
            .nodes()
            .iter()
            .filter_map(|node| node.slot)
            .sorted()
            .dedup()
            .filter_map(|slot| layout.slot(slot).cloned())
            .collect_vec();

        Ok(RootPlan {
            root: root.clone(),
            entry,
            graph,
            slots,
        })
    }

    /// Compiles all roots. Successful roots are returned in declaration order, failures are
    /// collected as diagnostics.
    pub fn compile(&self, roots: &[RootSpec]) -> CompositionPlan {
        let mut layout = StoreLayout::new(self.options.thread_safe);
        let mut plans = vec![];
        let mut diagnostics = vec![];

        for root in roots {
            match self.build_root_in(root, &mut layout) {
                Ok(plan) => {
                    debug!(root = %root.name, nodes = plan.graph.len(), "Root compiled.");
                    plans.push(plan);
                }
                Err(diagnostic) => {
                    debug!(%diagnostic, "Root failed.");
                    diagnostics.push(diagnostic);
                }
            }
        }

        info!(
            roots = plans.len(),
            failed = diagnostics.len(),
            slots = layout.slots().len(),
            "Composition compiled."
        );

        CompositionPlan {
            roots: plans,
            layout,
            diagnostics,
        }
    }

    /// Compiles the roots of a declaration set, using its bindings.
    pub fn compile_declarations(
        catalog: &'a dyn TypeCatalog,
        declarations: BindingDeclarationSet,
        options: ResolverOptions,
    ) -> Result<CompositionPlan, BindingRegistryError> {
        let composition = CompositionBuilder::new(catalog)
            .with_options(options)
            .build(declarations.bindings)?;

        Ok(composition.compile(&declarations.roots))
    }
}
