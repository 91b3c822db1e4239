//! Per-pass style resolution over widget trees.
//!
//! Widgets do not keep parent pointers, so the resolver walks the layer
//! roots once and records each widget's parent and selector view in a side
//! table keyed by [`WidgetId`]. Resolved styles are cached per widget for
//! the lifetime of the resolver; the screen drops it whenever layout, focus
//! or the layer stack changes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use super::media::MediaContext;
use super::selector::StyleNode;
use super::sheet::Stylesheet;
use super::{Style, WidgetState};
use crate::widget::{Widget, WidgetId};

struct Entry {
    parent: Option<WidgetId>,
    node: StyleNode,
}

pub struct StyleResolver {
    sheet: Arc<Stylesheet>,
    media: MediaContext,
    entries: HashMap<WidgetId, Entry>,
    cache: RefCell<HashMap<(WidgetId, bool), Style>>,
}

impl StyleResolver {
    pub fn new<'a>(
        sheet: Arc<Stylesheet>,
        media: MediaContext,
        roots: impl IntoIterator<Item = &'a dyn Widget>,
    ) -> Self {
        let mut entries = HashMap::new();
        for root in roots {
            collect(root, None, WidgetState::empty(), &mut entries);
        }
        Self {
            sheet,
            media,
            entries,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.sheet
    }

    pub fn media(&self) -> MediaContext {
        self.media
    }

    /// Parent recorded for `id` when the resolver was built.
    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.entries.get(&id).and_then(|e| e.parent)
    }

    pub fn node(&self, id: WidgetId) -> Option<&StyleNode> {
        self.entries.get(&id).map(|e| &e.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cascaded style of `id`, inheriting from its parent. Focus state only
    /// counts when the widget's layer is the focused one.
    pub fn resolve(&self, id: WidgetId, layer_focused: bool) -> Style {
        if let Some(style) = self.cache.borrow().get(&(id, layer_focused)) {
            return *style;
        }
        let Some(entry) = self.entries.get(&id) else {
            return Style::new();
        };

        let parent_style = entry
            .parent
            .map(|parent| self.resolve(parent, layer_focused))
            .unwrap_or_default();
        let node = gated(&entry.node, layer_focused);
        let ancestors = self.ancestors(id, layer_focused);
        let style = self
            .sheet
            .resolve(&node, &ancestors, &self.media)
            .inherit(parent_style);

        self.cache.borrow_mut().insert((id, layer_focused), style);
        style
    }

    /// Ancestor views, root first.
    fn ancestors(&self, id: WidgetId, layer_focused: bool) -> Vec<StyleNode> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            let Some(entry) = self.entries.get(&parent) else {
                break;
            };
            out.push(gated(&entry.node, layer_focused));
            cursor = entry.parent;
        }
        out.reverse();
        out
    }
}

fn gated(node: &StyleNode, layer_focused: bool) -> StyleNode {
    let mut node = node.clone();
    if !layer_focused {
        node.state.remove(WidgetState::FOCUSED);
    }
    node
}

fn collect(
    widget: &dyn Widget,
    parent: Option<WidgetId>,
    position: WidgetState,
    entries: &mut HashMap<WidgetId, Entry>,
) {
    let id = widget.id();
    if entries.contains_key(&id) {
        return;
    }

    let mut state = widget.style_state().unwrap_or_else(|| {
        let mut derived = WidgetState::empty();
        if let Some(handle) = widget.focus_handle() {
            derived.set(WidgetState::FOCUSED, handle.is_focused());
            derived.set(WidgetState::DISABLED, !handle.can_focus());
        }
        derived
    });
    state.remove(WidgetState::FIRST_CHILD | WidgetState::LAST_CHILD);
    state |= position;

    let node = StyleNode {
        type_name: widget.style_type().trim().to_string(),
        id: widget
            .style_id()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        classes: widget
            .style_classes()
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        state,
    };
    entries.insert(id, Entry { parent, node });

    let mut count = 0usize;
    widget.visit_children(&mut |_| count += 1);
    let mut index = 0usize;
    widget.visit_children(&mut |child| {
        let mut position = WidgetState::empty();
        position.set(WidgetState::FIRST_CHILD, index == 0);
        position.set(WidgetState::LAST_CHILD, index + 1 == count);
        collect(child, Some(id), position, entries);
        index += 1;
    });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Message;
    use crate::screen::RenderContext;
    use crate::state::focus::FocusHandle;
    use crate::style::Selector;
    use crate::types::{Constraints, Rect, Rgba, Size};
    use crate::widget::HandleResult;

    struct Item {
        id: WidgetId,
        kind: &'static str,
        classes: Vec<String>,
        focus: Option<FocusHandle>,
        children: Vec<Item>,
    }

    impl Item {
        fn new(kind: &'static str, children: Vec<Item>) -> Self {
            Self {
                id: WidgetId::next(),
                kind,
                classes: Vec::new(),
                focus: None,
                children,
            }
        }
    }

    impl Widget for Item {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn measure(&mut self, c: Constraints) -> Size {
            c.min_size()
        }
        fn layout(&mut self, _bounds: Rect) {}
        fn render(&self, _ctx: &mut RenderContext<'_>) {}
        fn handle_message(&mut self, _msg: &Message) -> HandleResult {
            HandleResult::unhandled()
        }
        fn visit_children(&self, f: &mut dyn FnMut(&dyn Widget)) {
            for c in &self.children {
                f(c);
            }
        }
        fn style_type(&self) -> String {
            self.kind.to_string()
        }
        fn style_classes(&self) -> Vec<String> {
            self.classes.clone()
        }
        fn focus_handle(&self) -> Option<FocusHandle> {
            self.focus.clone()
        }
    }

    fn setup() -> (Item, Stylesheet) {
        let mut field = Item::new("Input", vec![]);
        field.classes = vec![" wide ".into(), "".into()];
        let handle = FocusHandle::new(field.id);
        handle.set_focused(true);
        field.focus = Some(handle);

        let root = Item::new(
            "Panel",
            vec![Item::new("Label", vec![]), field, Item::new("Label", vec![])],
        );

        let mut sheet = Stylesheet::new();
        sheet.add(Selector::of("Panel"), Style::new().fg(Rgba::WHITE).bold(true));
        sheet.add(Selector::of("Label").state(WidgetState::FIRST_CHILD), Style::new().fg(Rgba::RED));
        sheet.add(Selector::any().class("wide").state(WidgetState::FOCUSED), Style::new().bg(Rgba::BLUE));
        (root, sheet)
    }

    #[test]
    fn test_inherits_from_parent() {
        let (root, sheet) = setup();
        let resolver = StyleResolver::new(Arc::new(sheet), MediaContext::default(), [&root as &dyn Widget]);

        let last = resolver.resolve(root.children[2].id, true);
        assert_eq!(last.fg, Some(Rgba::WHITE));
        assert!(last.active_attrs().contains(crate::types::Attr::BOLD));
        assert_eq!(resolver.parent(root.children[2].id), Some(root.id));
    }

    #[test]
    fn test_child_position_states() {
        let (root, sheet) = setup();
        let resolver = StyleResolver::new(Arc::new(sheet), MediaContext::default(), [&root as &dyn Widget]);

        assert_eq!(resolver.resolve(root.children[0].id, true).fg, Some(Rgba::RED));
        let last = resolver.node(root.children[2].id).map(|n| n.state);
        assert_eq!(last, Some(WidgetState::LAST_CHILD));
    }

    #[test]
    fn test_focus_only_in_focused_layer() {
        let (root, sheet) = setup();
        let resolver = StyleResolver::new(Arc::new(sheet), MediaContext::default(), [&root as &dyn Widget]);
        let field = root.children[1].id;

        assert_eq!(resolver.node(field).map(|n| n.classes.clone()), Some(vec!["wide".to_string()]));
        assert_eq!(resolver.resolve(field, true).bg, Some(Rgba::BLUE));
        assert_eq!(resolver.resolve(field, false).bg, None);
    }

    #[test]
    fn test_unknown_widget_is_unstyled() {
        let (root, sheet) = setup();
        let resolver = StyleResolver::new(Arc::new(sheet), MediaContext::default(), [&root as &dyn Widget]);
        assert!(resolver.resolve(WidgetId::next(), true).is_empty());
        assert_eq!(resolver.len(), 4);
    }
}
