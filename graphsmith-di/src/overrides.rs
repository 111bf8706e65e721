//! Lexically scoped value overrides.
//!
//! Root arguments, `Func` arguments and factory override steps replace the value of a
//! `(shape, tag)` pair for everything resolved underneath them. Frames form a stack; lookups see
//! the innermost frame first and inserting into the current frame replaces an earlier override of
//! the same pair.

use crate::binding::{OverrideValue, Tag};
use crate::shape::Shape;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Where an overridden value comes from.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum OverrideTarget {
    /// Expression from a factory override step.
    Expr(String),
    /// Positional argument of the enclosing `Func` wrapper.
    FactoryArgument { index: usize },
    /// Named argument of the root.
    RootArgument { name: String },
}

impl From<OverrideValue> for OverrideTarget {
    fn from(value: OverrideValue) -> Self {
        match value {
            OverrideValue::Expr(expr) => OverrideTarget::Expr(expr),
        }
    }
}

impl Display for OverrideTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OverrideTarget::Expr(expr) => write!(f, "`{expr}`"),
            OverrideTarget::FactoryArgument { index } => write!(f, "arg{index}"),
            OverrideTarget::RootArgument { name } => write!(f, "root argument {name}"),
        }
    }
}

/// A visible override, as captured in instance keys.
pub type OverrideEntry = (Shape, Tag, OverrideTarget);

#[derive(Clone, Default, Debug)]
struct OverrideFrame {
    overrides: FxHashMap<(Shape, Tag), OverrideTarget>,
}

/// Stack of override frames. The bottom frame is never popped.
#[derive(Clone, Debug)]
pub struct ResolutionScope {
    frames: Vec<OverrideFrame>,
}

impl Default for ResolutionScope {
    fn default() -> Self {
        Self {
            frames: vec![OverrideFrame::default()],
        }
    }
}

impl ResolutionScope {
    #[inline]
    pub fn push(&mut self) {
        self.frames.push(OverrideFrame::default());
    }

    #[inline]
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Installs an override in the innermost frame.
    pub fn insert(&mut self, shape: Shape, tag: Tag, target: OverrideTarget) {
        if let Some(frame) = self.frames.last_mut() {
            frame.overrides.insert((shape, tag), target);
        }
    }

    pub fn lookup(&self, shape: &Shape, tag: &Tag) -> Option<&OverrideTarget> {
        let key = (shape.clone(), tag.clone());
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.overrides.get(&key))
    }

    /// Returns every visible override, sorted. Shadowed overrides are excluded.
    pub fn visible(&self) -> Vec<OverrideEntry> {
        let mut visible: FxHashMap<&(Shape, Tag), &OverrideTarget> = FxHashMap::default();
        for frame in &self.frames {
            visible.extend(frame.overrides.iter());
        }

        visible
            .into_iter()
            .map(|((shape, tag), target)| (shape.clone(), tag.clone(), target.clone()))
            .sorted()
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::Tag;
    use crate::overrides::{OverrideTarget, ResolutionScope};
    use crate::shape::Shape;

    #[test]
    fn should_prefer_innermost_override() {
        let shape = Shape::concrete("string");
        let mut scope = ResolutionScope::default();
        scope.insert(
            shape.clone(),
            Tag::None,
            OverrideTarget::RootArgument {
                name: "tenant".to_string(),
            },
        );

        scope.push();
        scope.insert(
            shape.clone(),
            Tag::None,
            OverrideTarget::Expr("\"System\"".to_string()),
        );
        assert_eq!(
            scope.lookup(&shape, &Tag::None),
            Some(&OverrideTarget::Expr("\"System\"".to_string()))
        );
        assert_eq!(scope.visible().len(), 1);

        scope.pop();
        assert_eq!(
            scope.lookup(&shape, &Tag::None),
            Some(&OverrideTarget::RootArgument {
                name: "tenant".to_string()
            })
        );
    }

    #[test]
    fn should_replace_override_within_frame() {
        let shape = Shape::concrete("int");
        let mut scope = ResolutionScope::default();
        scope.push();
        scope.insert(shape.clone(), Tag::None, OverrideTarget::Expr("1".to_string()));
        scope.insert(shape.clone(), Tag::None, OverrideTarget::Expr("2".to_string()));

        assert_eq!(
            scope.lookup(&shape, &Tag::None),
            Some(&OverrideTarget::Expr("2".to_string()))
        );
    }

    #[test]
    fn should_match_tags_exactly() {
        let shape = Shape::concrete("int");
        let mut scope = ResolutionScope::default();
        scope.insert(
            shape.clone(),
            Tag::text("port"),
            OverrideTarget::FactoryArgument { index: 0 },
        );

        assert!(scope.lookup(&shape, &Tag::None).is_none());
        assert!(scope.lookup(&shape, &Tag::text("port")).is_some());
    }

    #[test]
    fn should_never_pop_bottom_frame() {
        let mut scope = ResolutionScope::default();
        scope.pop();
        scope.insert(
            Shape::concrete("int"),
            Tag::None,
            OverrideTarget::FactoryArgument { index: 0 },
        );

        assert_eq!(scope.depth(), 1);
        assert!(scope.lookup(&Shape::concrete("int"), &Tag::None).is_some());
    }
}
