//! Ordered style rules and the cascade.

use super::media::{MediaContext, MediaQuery, any_matches};
use super::selector::{Selector, StyleNode};
use super::Style;

/// A selector bound to declared and important styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: Selector,
    pub declared: Style,
    pub important: Style,
    /// Disjunction of conditions; empty means unconditional.
    pub media: Vec<MediaQuery>,
}

impl StyleRule {
    pub fn new(selector: Selector, declared: Style) -> Self {
        Self {
            selector,
            declared,
            important: Style::new(),
            media: Vec::new(),
        }
    }

    pub fn important(mut self, style: Style) -> Self {
        self.important = style;
        self
    }

    pub fn when(mut self, query: MediaQuery) -> Self {
        self.media.push(query);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
    relayout_on_focus: bool,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unconditional rule.
    pub fn add(&mut self, selector: Selector, style: Style) -> &mut Self {
        self.add_rule(StyleRule::new(selector, style))
    }

    pub fn add_rule(&mut self, rule: StyleRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Focus changes relayout the screen instead of only restyling it.
    pub fn relayout_on_focus(&self) -> bool {
        self.relayout_on_focus
    }

    pub fn set_relayout_on_focus(&mut self, on: bool) -> &mut Self {
        self.relayout_on_focus = on;
        self
    }

    /// Concatenate sheets; later sheets win ties.
    pub fn merged<'a>(sheets: impl IntoIterator<Item = &'a Stylesheet>) -> Stylesheet {
        let mut out = Stylesheet::new();
        for sheet in sheets {
            out.rules.extend(sheet.rules.iter().cloned());
            out.relayout_on_focus |= sheet.relayout_on_focus;
        }
        out
    }

    /// Cascade for one node. Matching rules are ordered by specificity, then
    /// declaration order; declared styles merge first, important ones after.
    pub fn resolve(&self, node: &StyleNode, ancestors: &[StyleNode], media: &MediaContext) -> Style {
        let mut matched: Vec<(usize, &StyleRule)> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| any_matches(&rule.media, media) && rule.selector.matches(node, ancestors))
            .collect();
        matched.sort_by_key(|(order, rule)| (rule.selector.specificity(), *order));

        let declared = matched
            .iter()
            .fold(Style::new(), |acc, (_, rule)| acc.merge(rule.declared));
        matched
            .iter()
            .fold(declared, |acc, (_, rule)| acc.merge(rule.important))
    }
}
