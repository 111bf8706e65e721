//! Declarative binding rules and requests - the already-parsed input of the resolver.
//!
//! A [Binding] maps one or more contract [shapes](Shape) with a [Tag] to an implementation type
//! or a factory, together with a [Lifetime] deciding how instances are shared. Bindings are
//! immutable after the composition is set up and are identified by their declaration order,
//! which also breaks ties - later declarations override earlier ones.
//!
//! ```
//! use graphsmith_di::binding::{Binding, Lifetime, Tag};
//! use graphsmith_di::shape::Shape;
//!
//! let binding = Binding::implementation(
//!     [Shape::concrete("IMessageSender")],
//!     Shape::concrete("EmailSender"),
//! )
//! .with_tag(Tag::Default)
//! .with_lifetime(Lifetime::Singleton);
//!
//! assert_eq!(binding.lifetime, Lifetime::Singleton);
//! ```

use crate::classify::Wrapper;
use crate::shape::{Shape, TypeKey};
use std::fmt::{Display, Formatter};

/// Opaque, equality-comparable tag value.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Type(TypeKey),
    Enum { ty: TypeKey, variant: String },
}

impl Display for TagValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Text(text) => write!(f, "\"{text}\""),
            TagValue::Integer(value) => write!(f, "{value}"),
            TagValue::Type(ty) => write!(f, "typeof({ty})"),
            TagValue::Enum { ty, variant } => write!(f, "{ty}.{variant}"),
        }
    }
}

/// Distinguishes bindings of the same contract.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum Tag {
    /// Untagged.
    #[default]
    None,
    /// Chosen for untagged requests when no untagged binding exists.
    Default,
    /// Wildcard matching every requested tag, including [Tag::None].
    Any,
    Value(TagValue),
}

impl Tag {
    pub fn text<T: Into<String>>(text: T) -> Self {
        Tag::Value(TagValue::Text(text.into()))
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Tag::None)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::None => f.write_str("<none>"),
            Tag::Default => f.write_str("Default"),
            Tag::Any => f.write_str("Any"),
            Tag::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Sharing policy for constructed instances.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum Lifetime {
    /// A new instance for every request.
    #[default]
    Transient,
    /// Shared within one block - a root's top-level build or one deferred closure body.
    PerBlock,
    /// Shared within one root invocation, across nested blocks.
    PerResolve,
    /// Shared within one child composition scope.
    Scoped,
    /// Shared for the whole lifetime of a composition instance.
    Singleton,
}

impl Lifetime {
    /// Checks if instances of this lifetime live in a store shared between threads.
    #[inline]
    pub fn is_shared(self) -> bool {
        matches!(self, Lifetime::Scoped | Lifetime::Singleton)
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Transient => "Transient",
            Lifetime::PerBlock => "PerBlock",
            Lifetime::PerResolve => "PerResolve",
            Lifetime::Scoped => "Scoped",
            Lifetime::Singleton => "Singleton",
        };
        f.write_str(name)
    }
}

/// Declaration order of a binding within a composition. Greater means declared later.
pub type BindingId = usize;

/// Value installed by a factory override.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum OverrideValue {
    /// Opaque expression passed through to the emitter.
    Expr(String),
}

/// One step of a factory body, executed in declaration order.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum FactoryStep {
    /// Replaces the value for `(shape, tag)` in the factory's own override scope.
    Override {
        shape: Shape,
        tag: Tag,
        value: OverrideValue,
    },
    /// Requests a dependency, seeing every override installed so far.
    Inject(InjectionRequest),
}

/// Factory expression used instead of an implementation constructor.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FactoryExpr {
    pub name: String,
    pub body: Vec<FactoryStep>,
}

impl FactoryExpr {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            body: vec![],
        }
    }

    pub fn with_override(mut self, shape: Shape, tag: Tag, value: OverrideValue) -> Self {
        self.body.push(FactoryStep::Override { shape, tag, value });
        self
    }

    pub fn with_injection(mut self, request: InjectionRequest) -> Self {
        self.body.push(FactoryStep::Inject(request));
        self
    }
}

/// What a binding builds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum BindingSource {
    /// Implementation type; may refer to markers used in the contracts.
    Implementation(Shape),
    Factory(FactoryExpr),
}

/// A rule mapping contracts and a tag to a source and a lifetime.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Binding {
    pub contracts: Vec<Shape>,
    pub tag: Tag,
    pub lifetime: Lifetime,
    pub source: BindingSource,
    /// Assigned by the registry on registration.
    pub id: BindingId,
}

impl Binding {
    pub fn implementation<C: IntoIterator<Item = Shape>>(
        contracts: C,
        implementation: Shape,
    ) -> Self {
        Self::new(contracts, BindingSource::Implementation(implementation))
    }

    pub fn factory<C: IntoIterator<Item = Shape>>(contracts: C, factory: FactoryExpr) -> Self {
        Self::new(contracts, BindingSource::Factory(factory))
    }

    pub fn new<C: IntoIterator<Item = Shape>>(contracts: C, source: BindingSource) -> Self {
        Self {
            contracts: contracts.into_iter().collect(),
            tag: Tag::None,
            lifetime: Lifetime::Transient,
            source,
            id: 0,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Where a requested value is injected.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum SiteKind {
    #[default]
    Constructor,
    Property,
    Field,
    Method,
    /// Factory body injection.
    Factory,
    /// Top-level root request.
    Root,
}

/// Request for a value at a single injection site.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct InjectionRequest {
    pub shape: Shape,
    pub tag: Tag,
    /// Filled in by the [RequestClassifier](crate::classify::RequestClassifier); `shape` then
    /// holds the wrapped core shape.
    pub wrapper: Wrapper,
    pub site: SiteKind,
    pub ordinal: usize,
    /// Name of the parameter or member, for diagnostics.
    pub name: String,
    /// A parameter with a default value is resolvable even without a binding.
    pub has_default: bool,
}

impl InjectionRequest {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            tag: Tag::None,
            wrapper: Wrapper::None,
            site: SiteKind::Constructor,
            ordinal: 0,
            name: String::new(),
            has_default: false,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_site(mut self, site: SiteKind, ordinal: usize) -> Self {
        self.site = site;
        self.ordinal = ordinal;
        self
    }

    pub fn with_name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

impl Display for InjectionRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.wrapper {
            Wrapper::None => write!(f, "{}", self.shape)?,
            wrapper => write!(f, "{wrapper}[{}]", self.shape)?,
        }

        if !self.tag.is_none() {
            write!(f, "({})", self.tag)?;
        }

        Ok(())
    }
}

/// Kind of composition root, passed through to the emitter.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum RootKind {
    #[default]
    Regular,
    Anonymous,
    Static,
    Exposed,
    /// Injects members into an existing instance instead of constructing one.
    Builder,
}

/// Named argument of a root, visible to the whole root graph as an override.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct RootArgument {
    pub name: String,
    pub shape: Shape,
    pub tag: Tag,
}

impl RootArgument {
    pub fn new<T: Into<String>>(name: T, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            tag: Tag::None,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }
}

/// Requested composition root.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct RootSpec {
    pub name: String,
    pub shape: Shape,
    pub tag: Tag,
    pub arguments: Vec<RootArgument>,
    pub kind: RootKind,
}

impl RootSpec {
    pub fn new<T: Into<String>>(name: T, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            tag: Tag::None,
            arguments: vec![],
            kind: RootKind::Regular,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_argument(mut self, argument: RootArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_kind(mut self, kind: RootKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Ordered bindings and roots parsed by a front-end.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct BindingDeclarationSet {
    pub bindings: Vec<Binding>,
    pub roots: Vec<RootSpec>,
}
