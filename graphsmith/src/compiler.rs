//! Core compilation functionality.

use crate::config::CompilerConfigProvider;
use derive_more::Constructor;
use graphsmith_di::binding::BindingDeclarationSet;
use graphsmith_di::catalog::TypeCatalog;
use graphsmith_di::composition::{Composition, ResolverOptions};
use graphsmith_di::plan::{CompositionPlan, ErrorPtr, PlanEmitter};
use graphsmith_di::BindingRegistryError;
use itertools::Itertools;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub type PlanEmitterPtr = Box<dyn PlanEmitter>;

#[derive(Clone, Error, Debug)]
pub enum CompilerError {
    #[error("Error loading configuration: {0}")]
    ConfigError(ErrorPtr),
    #[error("Invalid bindings: {0}")]
    RegistryError(#[from] BindingRegistryError),
    #[error("Emitter error: {0}")]
    EmitterError(ErrorPtr),
}

/// Main entrypoint for compilation. Resolves every root of a declaration set and hands the
/// resulting plan to [PlanEmitters](PlanEmitter).
#[derive(Constructor)]
pub struct Compiler<CP: CompilerConfigProvider> {
    config_provider: CP,
    emitters: Vec<PlanEmitterPtr>,
}

impl<CP: CompilerConfigProvider> Compiler<CP> {
    /// Compiles the declarations and runs all emitters, highest priority first. Roots which cannot
    /// be compiled are reported as diagnostics in the returned plan and do not stop emission of
    /// the others.
    pub fn compile(
        &self,
        catalog: &dyn TypeCatalog,
        declarations: BindingDeclarationSet,
    ) -> Result<CompositionPlan, CompilerError> {
        let config = self
            .config_provider
            .config()
            .map_err(CompilerError::ConfigError)?;

        if config.install_tracing_logger {
            install_tracing_logger();
        }

        info!(
            bindings = declarations.bindings.len(),
            roots = declarations.roots.len(),
            "Compiling composition..."
        );

        let plan = Composition::compile_declarations(
            catalog,
            declarations,
            ResolverOptions::from(&config),
        )?;

        for diagnostic in &plan.diagnostics {
            warn!(%diagnostic, "Cannot compile root.");
        }

        info!("Running plan emitters...");

        for emitter in self
            .emitters
            .iter()
            .sorted_by_key(|emitter| Reverse(emitter.priority()))
        {
            emitter.emit(&plan).map_err(CompilerError::EmitterError)?;
        }

        Ok(plan)
    }
}

fn install_tracing_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        debug!("Global tracing subscriber already installed.");
    }
}
