//! Compound selectors with descendant chains.

use super::WidgetState;

/// What a selector sees of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleNode {
    pub type_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub state: WidgetState,
}

/// `(ids, classes + states, types)`, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub types: u16,
}

/// A compound selector (type, id, classes, state) optionally scoped to
/// descendants of an ancestor selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    type_name: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    state: WidgetState,
    ancestor: Option<Box<Selector>>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && trimmed != "*").then(|| trimmed.to_string())
}

impl Selector {
    /// Match every widget.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match widgets of `type_name` (`"*"` matches any type).
    pub fn of(type_name: &str) -> Self {
        Self {
            type_name: non_empty(type_name),
            ..Self::default()
        }
    }

    /// Match the widget with style id `id`, any type.
    pub fn id_only(id: &str) -> Self {
        Self::any().id(id)
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = non_empty(id);
        self
    }

    /// Require a class. Blank names are ignored.
    pub fn class(mut self, class: &str) -> Self {
        if let Some(name) = non_empty(class) {
            self.classes.push(name);
        }
        self
    }

    /// Require every flag in `state`.
    pub fn state(mut self, state: WidgetState) -> Self {
        self.state |= state;
        self
    }

    /// Require an ancestor matching `ancestor`. Repeated calls extend the
    /// chain outward.
    pub fn inside(mut self, ancestor: Selector) -> Self {
        self.push_outermost(ancestor);
        self
    }

    fn push_outermost(&mut self, ancestor: Selector) {
        match &mut self.ancestor {
            Some(outer) => outer.push_outermost(ancestor),
            None => self.ancestor = Some(Box::new(ancestor)),
        }
    }

    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity {
            ids: self.id.is_some() as u16,
            classes: self.classes.len() as u16 + self.state.bits().count_ones() as u16,
            types: self.type_name.is_some() as u16,
        };
        if let Some(ancestor) = &self.ancestor {
            let outer = ancestor.specificity();
            spec.ids += outer.ids;
            spec.classes += outer.classes;
            spec.types += outer.types;
        }
        spec
    }

    /// `ancestors` are ordered root first.
    pub fn matches(&self, node: &StyleNode, ancestors: &[StyleNode]) -> bool {
        if !self.matches_self(node) {
            return false;
        }
        let Some(outer) = &self.ancestor else {
            return true;
        };
        (0..ancestors.len())
            .rev()
            .any(|i| outer.matches(&ancestors[i], &ancestors[..i]))
    }

    fn matches_self(&self, node: &StyleNode) -> bool {
        if self.type_name.as_ref().is_some_and(|t| *t != node.type_name) {
            return false;
        }
        if self.id.is_some() && self.id != node.id {
            return false;
        }
        self.classes.iter().all(|c| node.classes.contains(c)) && node.state.contains(self.state)
    }
}
