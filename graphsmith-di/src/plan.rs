//! The result of compiling a composition and the interface of code emitters consuming it.
//!
//! The plan fully describes what the emitted code must do: for every root, a construction graph
//! with its entry node, and for the whole composition the [StoreLayout] with one slot per shared
//! instance. Emitting source text from it is up to [PlanEmitter] implementations.

use crate::binding::RootSpec;
use crate::error::Diagnostic;
use crate::graph::{ConstructionGraph, ConstructionNode, NodeId};
use crate::scope::{StoreLayout, StoreSlot};
#[cfg(test)]
use mockall::automock;
use std::error::Error;
use std::sync::Arc;

pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Compiled root.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RootPlan {
    pub root: RootSpec,
    pub entry: NodeId,
    pub graph: ConstructionGraph,
    /// Slots used by this root, ordered by id.
    pub slots: Vec<StoreSlot>,
}

impl RootPlan {
    #[inline]
    pub fn entry_node(&self) -> Option<&ConstructionNode> {
        self.graph.node(self.entry)
    }

    /// Renders the construction graph as an indented tree, for logging and debugging.
    pub fn outline(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.root.name,
            self.root.shape,
            self.graph.outline(self.entry)
        )
    }
}

/// Result of compiling every root of a composition.
#[derive(Clone, Debug)]
pub struct CompositionPlan {
    pub roots: Vec<RootPlan>,
    pub layout: StoreLayout,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompositionPlan {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn root(&self, name: &str) -> Option<&RootPlan> {
        self.roots.iter().find(|plan| plan.root.name == name)
    }
}

/// Consumes a compiled plan, e.g. by generating source code.
#[cfg_attr(test, automock)]
pub trait PlanEmitter {
    /// Emits code for the plan. Only successfully compiled roots are present in the plan.
    fn emit(&self, plan: &CompositionPlan) -> Result<(), ErrorPtr>;

    /// Returns the priority for this emitter. Higher priorities get run first. Default 0.
    fn priority(&self) -> i8 {
        0
    }
}
