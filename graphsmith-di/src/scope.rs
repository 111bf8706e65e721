//! Constructed instances are contained in stores - containers which decide when a node of the
//! construction graph can be reused instead of building a new one. Each [Lifetime] has its own
//! store and no lifetime reads another lifetime's store:
//!
//! * [Lifetime::Transient] - [TransientStore], never caches
//! * [Lifetime::PerBlock] - one store per block (the root's top-level build or a deferred
//!   closure body)
//! * [Lifetime::PerResolve] - one store per root invocation, shared across nested blocks
//! * [Lifetime::Scoped] and [Lifetime::Singleton] - shared stores backed by [StoreSlot]s of the
//!   composition-wide [StoreLayout]
//!
//! Note: lifetimes are applied at construction time, so a singleton depending on a per-resolve
//! instance captures whichever instance existed when the singleton was first created.
//!
//! Slots of shared lifetimes are raced by concurrent root calls at runtime. With thread safety
//! enabled, they are marked with [Locking::DoubleChecked] and the emitter is expected to check the
//! slot, take the composition lock, check again, create and publish the instance.

use crate::binding::{BindingId, Lifetime, Tag};
use crate::graph::NodeId;
use crate::overrides::OverrideEntry;
use crate::registry::ResolvedSource;
use fxhash::FxHashMap;
use std::fmt::{Display, Formatter};

/// Identity of a cached instance.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct InstanceKey {
    pub binding: BindingId,
    pub source: ResolvedSource,
    pub tag: Tag,
    /// Overrides visible when the instance was built; empty for shared lifetimes.
    pub context: Vec<OverrideEntry>,
}

/// A store of built nodes for a single lifetime.
pub trait InstanceStore {
    /// Gets the node built for the given key, if available in this store.
    fn instance(&self, key: &InstanceKey) -> Option<NodeId>;

    /// Stores a node for the given key. The store might not support storing and ignore it.
    fn store_instance(&mut self, key: &InstanceKey, node: NodeId);
}

/// Store reusing nodes by key.
#[derive(Default, Clone, Debug)]
pub struct SharedInstanceStore {
    instances: FxHashMap<InstanceKey, NodeId>,
}

impl InstanceStore for SharedInstanceStore {
    #[inline]
    fn instance(&self, key: &InstanceKey) -> Option<NodeId> {
        self.instances.get(key).copied()
    }

    #[inline]
    fn store_instance(&mut self, key: &InstanceKey, node: NodeId) {
        self.instances.insert(key.clone(), node);
    }
}

/// Store which never reuses anything.
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub struct TransientStore;

impl InstanceStore for TransientStore {
    #[inline]
    fn instance(&self, _key: &InstanceKey) -> Option<NodeId> {
        None
    }

    #[inline]
    fn store_instance(&mut self, _key: &InstanceKey, _node: NodeId) {}
}

/// All stores used while building a single root.
#[derive(Clone, Debug)]
pub struct LifetimeStores {
    transient: TransientStore,
    blocks: Vec<SharedInstanceStore>,
    per_resolve: SharedInstanceStore,
    scoped: SharedInstanceStore,
    singleton: SharedInstanceStore,
}

impl Default for LifetimeStores {
    fn default() -> Self {
        Self {
            transient: TransientStore,
            blocks: vec![SharedInstanceStore::default()],
            per_resolve: Default::default(),
            scoped: Default::default(),
            singleton: Default::default(),
        }
    }
}

impl LifetimeStores {
    /// Starts a new block; per-block instances of enclosing blocks are not visible until
    /// [LifetimeStores::exit_block].
    pub fn enter_block(&mut self) {
        self.blocks.push(SharedInstanceStore::default());
    }

    pub fn exit_block(&mut self) {
        if self.blocks.len() > 1 {
            self.blocks.pop();
        }
    }

    pub fn store(&self, lifetime: Lifetime) -> &dyn InstanceStore {
        match lifetime {
            Lifetime::Transient => &self.transient,
            Lifetime::PerBlock => self.current_block(),
            Lifetime::PerResolve => &self.per_resolve,
            Lifetime::Scoped => &self.scoped,
            Lifetime::Singleton => &self.singleton,
        }
    }

    pub fn store_mut(&mut self, lifetime: Lifetime) -> &mut dyn InstanceStore {
        match lifetime {
            Lifetime::Transient => &mut self.transient,
            Lifetime::PerBlock => {
                if self.blocks.is_empty() {
                    self.blocks.push(SharedInstanceStore::default());
                }

                let last = self.blocks.len() - 1;
                &mut self.blocks[last]
            }
            Lifetime::PerResolve => &mut self.per_resolve,
            Lifetime::Scoped => &mut self.scoped,
            Lifetime::Singleton => &mut self.singleton,
        }
    }

    fn current_block(&self) -> &dyn InstanceStore {
        match self.blocks.last() {
            Some(block) => block,
            None => &self.transient,
        }
    }
}

/// Index of a slot in a [StoreLayout].
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct SlotId(pub usize);

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// Where the emitted code keeps a slot.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum StoreLocation {
    /// Local to one root call; never shared between calls.
    ResolveLocal,
    /// Field of a scope instance; child scopes own their own copy and look up through the
    /// owning scope, never a sibling.
    ScopeField,
    /// Field of the composition instance, shared by all its scopes.
    CompositionField,
}

/// Synchronization applied around slot initialization.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Locking {
    Unsynchronized,
    /// Check, lock, check again, create, publish.
    DoubleChecked,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StoreSlot {
    pub id: SlotId,
    pub lifetime: Lifetime,
    pub location: StoreLocation,
    pub locking: Locking,
    pub key: InstanceKey,
    /// Owning root of a per-resolve slot.
    pub root: Option<String>,
}

/// Composition-wide assignment of store slots. Shared lifetimes get a single slot per instance
/// key regardless of how many roots use them; per-resolve slots are allocated per root.
#[derive(Clone, Debug, Default)]
pub struct StoreLayout {
    thread_safe: bool,
    slots: Vec<StoreSlot>,
    index: FxHashMap<(Option<String>, InstanceKey), SlotId>,
}

impl StoreLayout {
    pub fn new(thread_safe: bool) -> Self {
        Self {
            thread_safe,
            ..Default::default()
        }
    }

    /// Returns the slot for an instance, allocating it on first use. Lifetimes without slots
    /// return `None`.
    pub fn slot_for(
        &mut self,
        root: &str,
        lifetime: Lifetime,
        key: &InstanceKey,
    ) -> Option<SlotId> {
        let (location, owner) = match lifetime {
            Lifetime::Transient | Lifetime::PerBlock => return None,
            Lifetime::PerResolve => (StoreLocation::ResolveLocal, Some(root.to_string())),
            Lifetime::Scoped => (StoreLocation::ScopeField, None),
            Lifetime::Singleton => (StoreLocation::CompositionField, None),
        };

        let index_key = (owner, key.clone());
        if let Some(id) = self.index.get(&index_key) {
            return Some(*id);
        }

        let locking = if lifetime.is_shared() && self.thread_safe {
            Locking::DoubleChecked
        } else {
            Locking::Unsynchronized
        };

        let id = SlotId(self.slots.len());
        self.slots.push(StoreSlot {
            id,
            lifetime,
            location,
            locking,
            key: key.clone(),
            root: index_key.0.clone(),
        });
        self.index.insert(index_key, id);

        Some(id)
    }

    #[inline]
    pub fn slot(&self, id: SlotId) -> Option<&StoreSlot> {
        self.slots.get(id.0)
    }

    #[inline]
    pub fn slots(&self) -> &[StoreSlot] {
        &self.slots
    }

    #[inline]
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }
}
