//! Compile-time dependency injection graph resolver.
//!
//! Given declarative [bindings](binding::Binding) and a [catalog](catalog::TypeCatalog) of known
//! types, the resolver computes, for every composition root, a complete construction graph: which
//! implementation satisfies each dependency, which constructor and members are used, how
//! instances are shared according to their [lifetimes](binding::Lifetime), and where deferred
//! evaluation (factories, lazy values, tasks) starts a new block. All failures - unresolvable
//! dependencies, cycles, ambiguous or constraint-violating generic matches - are reported before
//! any code runs, as [diagnostics](error::Diagnostic) attributed to a root and request path.
//!
//! The resolver does not generate code. The resulting [plan](plan::CompositionPlan) is handed to
//! [emitters](plan::PlanEmitter).
//!
//! ```
//! use graphsmith_di::binding::{Binding, Lifetime, RootSpec};
//! use graphsmith_di::catalog::{
//!     ConstructorDescriptor, StaticTypeCatalog, TypeDescriptor, TypeKind,
//! };
//! use graphsmith_di::composition::CompositionBuilder;
//! use graphsmith_di::shape::Shape;
//!
//! let catalog = StaticTypeCatalog::new()
//!     .with_type(TypeDescriptor::new("IClock", TypeKind::Interface))
//!     .with_type(
//!         TypeDescriptor::new("SystemClock", TypeKind::Class)
//!             .implementing(Shape::concrete("IClock"))
//!             .with_constructor(ConstructorDescriptor::default()),
//!     );
//!
//! let composition = CompositionBuilder::new(&catalog)
//!     .build([Binding::implementation(
//!         [Shape::concrete("IClock")],
//!         Shape::concrete("SystemClock"),
//!     )
//!     .with_lifetime(Lifetime::Singleton)])
//!     .unwrap();
//!
//! let plan = composition.compile(&[RootSpec::new("Clock", Shape::concrete("IClock"))]);
//! assert!(plan.is_success());
//! assert_eq!(plan.layout.slots().len(), 1);
//! ```

pub mod binding;
pub mod builder;
pub mod catalog;
pub mod classify;
pub mod composition;
pub mod error;
pub mod graph;
pub mod overrides;
pub mod plan;
pub mod registry;
pub mod scope;
pub mod shape;
pub mod site;
pub mod unify;

pub use error::{BindingRegistryError, Diagnostic, GraphError};
