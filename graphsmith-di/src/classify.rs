//! Classification of wrapper request shapes.
//!
//! Some requested shapes are not resolved through bindings directly, but wrap another request:
//! factories, lazy values, collections, tasks, owned and weak references. The
//! [RequestClassifier] recognizes them by the outer type constructor and rewrites the request into
//! its core shape plus a [Wrapper] describing how the core value is delivered.
//!
//! | shape | wrapper | core evaluation |
//! |-------|---------|-----------------|
//! | `Func<A1, .., T>` | [Wrapper::Func] | deferred, per call, arguments become overrides |
//! | `Lazy<T>` | [Wrapper::Lazy] | deferred, cached on first access |
//! | `List<T>`, `IEnumerable<T>`, .. | [Wrapper::Collection] | every binding of `T` |
//! | `Task<T>`, `ValueTask<T>` | [Wrapper::Task] | deferred, on a task scheduler |
//! | `Owned<T>` | [Wrapper::Owned] | deferred, with a disposal tracker |
//! | `WeakReference<T>` | [Wrapper::WeakRef] | eager |

use crate::binding::InjectionRequest;
use crate::shape::{Shape, TypeKey};
use fxhash::FxHashMap;
use std::fmt::{Display, Formatter};

/// Collection flavors. Streaming shapes are materialized lazily on iteration.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum CollectionKind {
    Array,
    List,
    Set,
    Enumerable,
    AsyncEnumerable,
}

impl CollectionKind {
    #[inline]
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            CollectionKind::Enumerable | CollectionKind::AsyncEnumerable
        )
    }
}

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TaskKind {
    Task,
    ValueTask,
}

/// How the core value of a request is delivered.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum Wrapper {
    #[default]
    None,
    Func {
        arguments: Vec<Shape>,
    },
    Lazy,
    Collection(CollectionKind),
    Task(TaskKind),
    Owned,
    WeakRef,
}

impl Wrapper {
    /// Deferred wrappers are not evaluated inline, therefore they form a boundary for cycle
    /// detection and start a new block.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Wrapper::Func { .. } | Wrapper::Lazy | Wrapper::Task(_) | Wrapper::Owned
        )
    }
}

impl Display for Wrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Wrapper::None => f.write_str("None"),
            Wrapper::Func { arguments } if arguments.is_empty() => f.write_str("Func"),
            Wrapper::Func { arguments } => write!(f, "Func/{}", arguments.len()),
            Wrapper::Lazy => f.write_str("Lazy"),
            Wrapper::Collection(kind) => write!(f, "{kind:?}"),
            Wrapper::Task(kind) => write!(f, "{kind:?}"),
            Wrapper::Owned => f.write_str("Owned"),
            Wrapper::WeakRef => f.write_str("WeakRef"),
        }
    }
}

/// Wrapper family registered for a type constructor.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum WrapperShape {
    Func,
    Lazy,
    Collection(CollectionKind),
    Task(TaskKind),
    Owned,
    WeakRef,
}

/// Name of the cancellation token type threaded into task factories.
pub const CANCELLATION_TOKEN: &str = "CancellationToken";

/// Recognizes wrapper shapes by their type constructor.
#[derive(Clone, Debug)]
pub struct RequestClassifier {
    wrappers: FxHashMap<TypeKey, WrapperShape>,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self {
            wrappers: [
                ("Func", WrapperShape::Func),
                ("Lazy", WrapperShape::Lazy),
                ("Array", WrapperShape::Collection(CollectionKind::Array)),
                (
                    "ImmutableArray",
                    WrapperShape::Collection(CollectionKind::Array),
                ),
                ("List", WrapperShape::Collection(CollectionKind::List)),
                ("IList", WrapperShape::Collection(CollectionKind::List)),
                ("ICollection", WrapperShape::Collection(CollectionKind::List)),
                (
                    "IReadOnlyList",
                    WrapperShape::Collection(CollectionKind::List),
                ),
                (
                    "IReadOnlyCollection",
                    WrapperShape::Collection(CollectionKind::List),
                ),
                ("HashSet", WrapperShape::Collection(CollectionKind::Set)),
                ("ISet", WrapperShape::Collection(CollectionKind::Set)),
                (
                    "IEnumerable",
                    WrapperShape::Collection(CollectionKind::Enumerable),
                ),
                (
                    "IAsyncEnumerable",
                    WrapperShape::Collection(CollectionKind::AsyncEnumerable),
                ),
                ("Task", WrapperShape::Task(TaskKind::Task)),
                ("ValueTask", WrapperShape::Task(TaskKind::ValueTask)),
                ("Owned", WrapperShape::Owned),
                ("WeakReference", WrapperShape::WeakRef),
            ]
            .into_iter()
            .map(|(name, shape)| (TypeKey::new(name), shape))
            .collect(),
        }
    }
}

impl RequestClassifier {
    /// Creates a classifier which recognizes no wrappers.
    pub fn empty() -> Self {
        Self {
            wrappers: Default::default(),
        }
    }

    /// Registers an additional wrapper type constructor.
    pub fn with_wrapper(mut self, key: TypeKey, shape: WrapperShape) -> Self {
        self.wrappers.insert(key, shape);
        self
    }

    /// Splits a shape into its core shape and wrapper. Only the outermost wrapper is removed.
    pub fn classify(&self, shape: &Shape) -> (Shape, Wrapper) {
        let Shape::Generic(key, arguments) = shape else {
            return (shape.clone(), Wrapper::None);
        };

        let Some((core, leading)) = arguments.split_last() else {
            return (shape.clone(), Wrapper::None);
        };

        let wrapper = match self.wrappers.get(key) {
            Some(WrapperShape::Func) => Wrapper::Func {
                arguments: leading.to_vec(),
            },
            Some(_) if !leading.is_empty() => return (shape.clone(), Wrapper::None),
            Some(WrapperShape::Lazy) => Wrapper::Lazy,
            Some(WrapperShape::Collection(kind)) => Wrapper::Collection(*kind),
            Some(WrapperShape::Task(kind)) => Wrapper::Task(*kind),
            Some(WrapperShape::Owned) => Wrapper::Owned,
            Some(WrapperShape::WeakRef) => Wrapper::WeakRef,
            None => return (shape.clone(), Wrapper::None),
        };

        (core.clone(), wrapper)
    }

    /// Classifies a request, replacing its shape with the core shape. Already classified requests
    /// are returned unchanged.
    pub fn classify_request(&self, request: InjectionRequest) -> InjectionRequest {
        if request.wrapper != Wrapper::None {
            return request;
        }

        let (shape, wrapper) = self.classify(&request.shape);
        InjectionRequest {
            shape,
            wrapper,
            ..request
        }
    }
}
