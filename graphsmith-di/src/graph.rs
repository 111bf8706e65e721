//! Construction graph of a single root.
//!
//! Nodes live in an arena and refer to each other by [NodeId]. Eager dependencies are regular
//! [EdgeTarget::Node] edges and always form a DAG. Deferred wrappers (`Func`, `Lazy`, tasks and
//! owned values) point to a [NodeKind::Block] entry node through [EdgeTarget::Deferred]; such
//! edges may close cycles, since the value is only produced on demand.

use crate::binding::{BindingId, InjectionRequest, Lifetime, Tag};
use crate::classify::{CollectionKind, TaskKind};
use crate::scope::SlotId;
use crate::shape::Shape;
use fxhash::FxHashSet;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Block in which a node is evaluated. Block 0 is the root's top-level build; every deferred
/// sub-root gets its own block.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct BlockId(pub usize);

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum NodeKind {
    /// Constructor call followed by member injection. Children are the constructor arguments in
    /// parameter order, then member arguments in injection order.
    Construct {
        implementation: Shape,
        type_arguments: Vec<(String, Shape)>,
        constructor: usize,
    },
    /// Factory invocation; children are the factory's injections in body order.
    Factory {
        name: String,
        type_arguments: Vec<(String, Shape)>,
    },
    /// Member injection into an instance supplied by the caller.
    BuildUp { target: Shape },
    /// Runtime type switch; one child per case, in case order.
    Dispatch { target: Shape, cases: Vec<Shape> },
    /// Value taken from a factory override step.
    Override { expr: String },
    RootArgument { name: String },
    /// Positional argument of the enclosing `Func`.
    FactoryArgument { index: usize },
    /// Parameter left to its declared default value.
    DefaultValue,
    /// Entry of a deferred sub-root. The only child is the value produced by the block.
    Block { block: BlockId },
    Func { arguments: Vec<Shape> },
    /// `Func` with first-access caching.
    Lazy,
    /// Deferred evaluation on a task scheduler. The optional second child is the cancellation
    /// token threaded from the root.
    Task { kind: TaskKind },
    /// Deferred value with a disposal tracker owned by the enclosing block.
    Owned { tracker: BlockId },
    WeakRef,
    /// Every binding of the element shape, in declaration order.
    Collection {
        kind: CollectionKind,
        streaming: bool,
    },
}

impl NodeKind {
    fn label(&self) -> String {
        match self {
            NodeKind::Construct { implementation, .. } => format!("new {implementation}"),
            NodeKind::Factory { name, .. } => format!("factory {name}"),
            NodeKind::BuildUp { target } => format!("build up {target}"),
            NodeKind::Dispatch { target, .. } => format!("dispatch {target}"),
            NodeKind::Override { expr } => format!("override `{expr}`"),
            NodeKind::RootArgument { name } => format!("argument {name}"),
            NodeKind::FactoryArgument { index } => format!("arg{index}"),
            NodeKind::DefaultValue => "default".to_string(),
            NodeKind::Block { block } => format!("block {}", block.0),
            NodeKind::Func { arguments } => format!("Func/{}", arguments.len()),
            NodeKind::Lazy => "Lazy".to_string(),
            NodeKind::Task { kind } => format!("{kind:?}"),
            NodeKind::Owned { .. } => "Owned".to_string(),
            NodeKind::WeakRef => "WeakRef".to_string(),
            NodeKind::Collection { kind, .. } => format!("{kind:?}"),
        }
    }
}

/// Reference to a deferred sub-root.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct DeferredRef {
    pub entry: NodeId,
    pub block: BlockId,
}

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum EdgeTarget {
    Node(NodeId),
    Deferred(DeferredRef),
}

impl EdgeTarget {
    #[inline]
    pub fn node(self) -> NodeId {
        match self {
            EdgeTarget::Node(id) => id,
            EdgeTarget::Deferred(deferred) => deferred.entry,
        }
    }
}

/// Dependency edge; the request carries the injection site.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Edge {
    pub request: InjectionRequest,
    pub target: EdgeTarget,
}

impl Edge {
    pub fn new(request: InjectionRequest, target: NodeId) -> Self {
        Self {
            request,
            target: EdgeTarget::Node(target),
        }
    }

    pub fn deferred(request: InjectionRequest, deferred: DeferredRef) -> Self {
        Self {
            request,
            target: EdgeTarget::Deferred(deferred),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ConstructionNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Provided contract or value shape.
    pub shape: Shape,
    pub tag: Tag,
    pub lifetime: Lifetime,
    pub binding: Option<BindingId>,
    pub slot: Option<SlotId>,
    pub block: BlockId,
    pub children: Vec<Edge>,
}

impl ConstructionNode {
    pub fn new(kind: NodeKind, shape: Shape, tag: Tag, block: BlockId) -> Self {
        Self {
            id: NodeId(0),
            kind,
            shape,
            tag,
            lifetime: Lifetime::Transient,
            binding: None,
            slot: None,
            block,
            children: vec![],
        }
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_binding(mut self, binding: BindingId) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_children(mut self, children: Vec<Edge>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ConstructionGraph {
    nodes: Vec<ConstructionNode>,
    blocks: usize,
}

impl ConstructionGraph {
    /// Adds a node, assigning its id.
    pub fn add(&mut self, mut node: ConstructionNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.id = id;
        self.nodes.push(node);
        id
    }

    /// Allocates a new block and its entry node. The entry has no children until
    /// [ConstructionGraph::complete_block] is called.
    pub fn open_block(&mut self, shape: Shape, tag: Tag) -> DeferredRef {
        self.blocks += 1;
        let block = BlockId(self.blocks);
        let entry = self.add(ConstructionNode::new(
            NodeKind::Block { block },
            shape,
            tag,
            block,
        ));

        DeferredRef { entry, block }
    }

    pub fn complete_block(&mut self, deferred: DeferredRef, value: Edge) {
        if let Some(node) = self.nodes.get_mut(deferred.entry.0) {
            node.children = vec![value];
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&ConstructionNode> {
        self.nodes.get(id.0)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ConstructionNode> {
        self.nodes.get_mut(id.0)
    }

    #[inline]
    pub fn nodes(&self) -> &[ConstructionNode] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of deferred blocks, excluding the top-level one.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    /// Returns nodes reachable from `start` through eager edges, dependencies first. Each node
    /// appears once.
    pub fn eager_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut visited = FxHashSet::default();
        let mut order = vec![];
        self.post_order(start, &mut visited, &mut order);
        order
    }

    fn post_order(&self, id: NodeId, visited: &mut FxHashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }

        if let Some(node) = self.node(id) {
            for edge in &node.children {
                if let EdgeTarget::Node(child) = edge.target {
                    self.post_order(child, visited, order);
                }
            }
        }

        order.push(id);
    }

    /// Returns distinct deferred sub-roots referenced from the graph, ordered by entry.
    pub fn deferred_blocks(&self) -> Vec<DeferredRef> {
        let mut blocks = self
            .nodes
            .iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|edge| match edge.target {
                EdgeTarget::Deferred(deferred) => Some(deferred),
                EdgeTarget::Node(_) => None,
            })
            .collect::<Vec<_>>();

        blocks.sort();
        blocks.dedup();
        blocks
    }

    /// Renders an indented tree of the graph starting at `start`. Shared nodes are expanded once
    /// and referenced by id afterwards.
    pub fn outline(&self, start: NodeId) -> String {
        let mut output = String::new();
        let mut expanded = FxHashSet::default();
        self.outline_node(start, None, 0, &mut expanded, &mut output);
        output
    }

    fn outline_node(
        &self,
        id: NodeId,
        request: Option<&InjectionRequest>,
        depth: usize,
        expanded: &mut FxHashSet<NodeId>,
        output: &mut String,
    ) {
        let Some(node) = self.node(id) else {
            return;
        };

        output.push_str(&"  ".repeat(depth));
        if let Some(request) = request.filter(|request| !request.name.is_empty()) {
            output.push_str(&request.name);
            output.push_str(": ");
        }

        output.push_str(&format!("{id} {} [{}]", node.kind.label(), node.lifetime));
        if let Some(slot) = node.slot {
            output.push_str(&format!(" {slot}"));
        }

        if !expanded.insert(id) {
            output.push_str(" (see above)\n");
            return;
        }

        output.push('\n');
        for edge in &node.children {
            match edge.target {
                EdgeTarget::Node(child) => {
                    self.outline_node(child, Some(&edge.request), depth + 1, expanded, output)
                }
                EdgeTarget::Deferred(deferred) => {
                    output.push_str(&"  ".repeat(depth + 1));
                    output.push_str(&format!("-> deferred {}\n", deferred.entry));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::{InjectionRequest, Tag};
    use crate::graph::{BlockId, ConstructionGraph, ConstructionNode, Edge, NodeKind};
    use crate::shape::Shape;

    fn create_node(name: &str) -> ConstructionNode {
        ConstructionNode::new(
            NodeKind::Construct {
                implementation: Shape::concrete(name),
                type_arguments: vec![],
                constructor: 0,
            },
            Shape::concrete(name),
            Tag::None,
            BlockId::default(),
        )
    }

    #[test]
    fn should_order_dependencies_first() {
        let mut graph = ConstructionGraph::default();
        let leaf = graph.add(create_node("Leaf"));
        let middle = graph.add(
            create_node("Middle").with_children(vec![Edge::new(
                InjectionRequest::new(Shape::concrete("Leaf")),
                leaf,
            )]),
        );
        let root = graph.add(create_node("Root").with_children(vec![
            Edge::new(InjectionRequest::new(Shape::concrete("Middle")), middle),
            Edge::new(InjectionRequest::new(Shape::concrete("Leaf")), leaf),
        ]));

        assert_eq!(graph.eager_order(root), vec![leaf, middle, root]);
    }

    #[test]
    fn should_not_follow_deferred_edges() {
        let mut graph = ConstructionGraph::default();
        let deferred = graph.open_block(Shape::concrete("Root"), Tag::None);
        let func = graph.add(
            ConstructionNode::new(
                NodeKind::Func { arguments: vec![] },
                Shape::concrete("Root"),
                Tag::None,
                BlockId::default(),
            )
            .with_children(vec![Edge::deferred(
                InjectionRequest::new(Shape::concrete("Root")),
                deferred,
            )]),
        );
        let root = graph.add(
            create_node("Root").with_children(vec![Edge::new(
                InjectionRequest::new(Shape::concrete("Root")),
                func,
            )]),
        );
        graph.complete_block(
            deferred,
            Edge::new(InjectionRequest::new(Shape::concrete("Root")), root),
        );

        assert_eq!(graph.eager_order(root), vec![func, root]);
        assert_eq!(graph.deferred_blocks(), vec![deferred]);
        assert_eq!(graph.block_count(), 1);
        assert!(graph.outline(root).contains("-> deferred #0"));
    }
}
