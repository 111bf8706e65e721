//! Compilation driver for [graphsmith_di] dependency injection plans.
//!
//! The resolution engine in [graphsmith_di] turns bindings and composition roots into a
//! [CompositionPlan](graphsmith_di::plan::CompositionPlan). This crate wraps it in a
//! [Compiler](compiler::Compiler), which loads [configuration](config::CompilerConfig), installs
//! a tracing logger, reports roots which cannot be compiled and hands the plan to registered
//! [PlanEmitters](graphsmith_di::plan::PlanEmitter) in priority order.
//!
//! ```
//! use graphsmith::compiler::Compiler;
//! use graphsmith::config::DefaultCompilerConfigProvider;
//! use graphsmith_di::binding::{Binding, BindingDeclarationSet, RootSpec};
//! use graphsmith_di::catalog::{
//!     ConstructorDescriptor, StaticTypeCatalog, TypeDescriptor, TypeKind,
//! };
//! use graphsmith_di::shape::Shape;
//!
//! let catalog = StaticTypeCatalog::new().with_type(
//!     TypeDescriptor::new("SystemClock", TypeKind::Class)
//!         .with_constructor(ConstructorDescriptor::default()),
//! );
//!
//! let declarations = BindingDeclarationSet {
//!     bindings: vec![Binding::implementation(
//!         [Shape::concrete("IClock")],
//!         Shape::concrete("SystemClock"),
//!     )],
//!     roots: vec![RootSpec::new("Clock", Shape::concrete("IClock"))],
//! };
//!
//! let compiler = Compiler::new(DefaultCompilerConfigProvider::new(), vec![]);
//! let plan = compiler.compile(&catalog, declarations).unwrap();
//! assert!(plan.is_success());
//! ```

pub mod compiler;
pub mod config;
