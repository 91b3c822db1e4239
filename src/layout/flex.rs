//! Flex container and the grow/shrink distribution it is built on.
//!
//! # Algorithm
//!
//! 1. Measure every child along the main axis (or take its basis)
//! 2. `slack = container - gaps - sum(base)`
//! 3. Positive slack is split between children with `grow > 0`;
//!    negative slack is taken from children with `shrink > 0`, weighted by
//!    `shrink * base` and never below zero
//! 4. Place children one after another with `gap` cells between them
//!
//! Both distributions hand out whole cells: every child first gets the
//! floor of its exact share, then the leftover cells go one at a time to the
//! largest fractional parts. Equal fractions go to the lowest index.

use crate::app::Message;
use crate::screen::RenderContext;
use crate::types::{Constraints, Rect, Size};
use crate::widget::{HandleResult, Widget, WidgetId};

// =============================================================================
// DISTRIBUTION
// =============================================================================

/// Split `available` cells by `weights`. Only positive weights receive
/// cells; when any weight is positive the result sums to `available`.
pub fn distribute_grow(available: u32, weights: &[f64]) -> Vec<u32> {
    let mut out = vec![0u32; weights.len()];
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if available == 0 || total <= 0.0 {
        return out;
    }

    let mut fractions: Vec<Option<f64>> = vec![None; weights.len()];
    let mut used = 0u32;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        let share = available as f64 * (w / total);
        let base = (share.floor() as u32).min(available - used);
        out[i] = base;
        used += base;
        fractions[i] = Some(share - base as f64);
    }

    let mut remaining = available - used;
    while remaining > 0 {
        let Some(idx) = largest_fraction(&fractions, |_| true) else {
            break;
        };
        out[idx] += 1;
        fractions[idx] = None;
        remaining -= 1;
    }
    // Float error can leave a cell over when every fraction was consumed.
    if remaining > 0 {
        if let Some(idx) = weights.iter().position(|w| *w > 0.0) {
            out[idx] += remaining;
        }
    }
    out
}

/// Take `deficit` cells from children weighted by `weights`, never taking
/// more than a child's own `sizes[i]`. Runs rounds over the children that
/// still have room until the deficit is gone or nothing can shrink.
pub fn distribute_shrink(deficit: u32, weights: &[f64], sizes: &[u32]) -> Vec<u32> {
    let mut out = vec![0u32; weights.len()];
    let mut remaining = deficit;
    let capacity = |out: &[u32], i: usize| sizes.get(i).copied().unwrap_or(0).saturating_sub(out[i]);

    while remaining > 0 {
        let total: f64 = weights
            .iter()
            .enumerate()
            .filter(|(i, w)| **w > 0.0 && capacity(&out, *i) > 0)
            .map(|(_, w)| *w)
            .sum();
        if total <= 0.0 {
            break;
        }

        let mut fractions: Vec<Option<f64>> = vec![None; weights.len()];
        let mut used = 0u32;
        for (i, &w) in weights.iter().enumerate() {
            let room = capacity(&out, i);
            if w <= 0.0 || room == 0 {
                continue;
            }
            let share = remaining as f64 * (w / total);
            let base = (share.floor() as u32).min(room).min(remaining - used);
            out[i] += base;
            used += base;
            fractions[i] = Some(share - base as f64);
        }
        remaining -= used;

        let mut progress = used > 0;
        while remaining > 0 {
            let Some(idx) = largest_fraction(&fractions, |i| capacity(&out, i) > 0) else {
                break;
            };
            out[idx] += 1;
            fractions[idx] = None;
            remaining -= 1;
            progress = true;
        }
        if !progress {
            break;
        }
    }
    out
}

fn largest_fraction(fractions: &[Option<f64>], eligible: impl Fn(usize) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, frac) in fractions.iter().enumerate() {
        let Some(frac) = *frac else { continue };
        if !eligible(i) {
            continue;
        }
        if best.is_none_or(|(_, b)| frac > b) {
            best = Some((i, frac));
        }
    }
    best.map(|(i, _)| i)
}

/// Flex inputs for one child along the main axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlexItem {
    pub base: u16,
    pub grow: f64,
    pub shrink: f64,
}

/// Final main-axis sizes for `items` in a container of `container` cells.
pub fn solve(container: u16, gap: u16, items: &[FlexItem]) -> Vec<u16> {
    let gaps = gap as i64 * items.len().saturating_sub(1) as i64;
    let total_base: i64 = items.iter().map(|it| it.base as i64).sum();
    let slack = container as i64 - gaps - total_base;

    let mut sizes: Vec<u32> = items.iter().map(|it| it.base as u32).collect();
    if slack > 0 {
        let weights: Vec<f64> = items.iter().map(|it| it.grow.max(0.0)).collect();
        let extra = distribute_grow(slack as u32, &weights);
        for (size, add) in sizes.iter_mut().zip(extra) {
            *size += add;
        }
    } else if slack < 0 {
        let weights: Vec<f64> = items
            .iter()
            .map(|it| if it.shrink > 0.0 { it.shrink * it.base as f64 } else { 0.0 })
            .collect();
        let deficit = u32::try_from(-slack).unwrap_or(u32::MAX);
        let cut = distribute_shrink(deficit, &weights, &sizes);
        for (size, sub) in sizes.iter_mut().zip(cut) {
            *size = size.saturating_sub(sub);
        }
    }
    sizes
        .into_iter()
        .map(|s| u16::try_from(s).unwrap_or(u16::MAX))
        .collect()
}

// =============================================================================
// FLEX WIDGET
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Children stacked top to bottom.
    Column,
    /// Children side by side.
    Row,
}

impl Axis {
    fn main(self, size: Size) -> u16 {
        match self {
            Axis::Column => size.height,
            Axis::Row => size.width,
        }
    }

    fn cross(self, size: Size) -> u16 {
        match self {
            Axis::Column => size.width,
            Axis::Row => size.height,
        }
    }

    fn size(self, main: u16, cross: u16) -> Size {
        match self {
            Axis::Column => Size::new(cross, main),
            Axis::Row => Size::new(main, cross),
        }
    }
}

/// A child of a [`Flex`] with its flex factors.
pub struct FlexChild {
    pub widget: Box<dyn Widget>,
    pub grow: f64,
    pub shrink: f64,
    /// Main-axis size to use instead of measuring.
    pub basis: Option<u16>,
}

impl FlexChild {
    /// Never grows or shrinks.
    pub fn fixed(widget: impl Widget + 'static) -> Self {
        Self::with_factors(widget, 0.0, 0.0, None)
    }

    /// Grows by `grow`, shrinks normally.
    pub fn flexible(widget: impl Widget + 'static, grow: f64) -> Self {
        Self::with_factors(widget, grow, 1.0, None)
    }

    /// Takes an equal share of free space.
    pub fn expanded(widget: impl Widget + 'static) -> Self {
        Self::with_factors(widget, 1.0, 1.0, None)
    }

    /// Exactly `basis` cells along the main axis.
    pub fn sized(widget: impl Widget + 'static, basis: u16) -> Self {
        Self::with_factors(widget, 0.0, 0.0, Some(basis))
    }

    pub fn with_factors(widget: impl Widget + 'static, grow: f64, shrink: f64, basis: Option<u16>) -> Self {
        Self {
            widget: Box::new(widget),
            grow,
            shrink,
            basis,
        }
    }
}

/// Lays children out along one axis.
pub struct Flex {
    id: WidgetId,
    axis: Axis,
    gap: u16,
    children: Vec<FlexChild>,
    bounds: Rect,
    child_bounds: Vec<Rect>,
}

impl Flex {
    pub fn new(axis: Axis) -> Self {
        Self {
            id: WidgetId::next(),
            axis,
            gap: 0,
            children: Vec::new(),
            bounds: Rect::default(),
            child_bounds: Vec::new(),
        }
    }

    pub fn column() -> Self {
        Self::new(Axis::Column)
    }

    pub fn row() -> Self {
        Self::new(Axis::Row)
    }

    pub fn with_gap(mut self, gap: u16) -> Self {
        self.gap = gap;
        self
    }

    pub fn push(mut self, child: FlexChild) -> Self {
        self.children.push(child);
        self
    }

    pub fn add(&mut self, child: FlexChild) {
        self.children.push(child);
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn children(&self) -> &[FlexChild] {
        &self.children
    }

    /// Bounds assigned to each child by the last layout.
    pub fn child_bounds(&self) -> &[Rect] {
        &self.child_bounds
    }

    fn gaps(&self) -> u16 {
        let between = self.children.len().saturating_sub(1) as u32;
        u16::try_from(self.gap as u32 * between).unwrap_or(u16::MAX)
    }

    fn measure_child(&self, child: &mut FlexChild, constraints: Constraints) -> Size {
        match child.basis {
            Some(basis) => self.axis.size(basis, 0),
            None => child.widget.measure(constraints),
        }
    }
}

impl Widget for Flex {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn measure(&mut self, constraints: Constraints) -> Size {
        if self.children.is_empty() {
            return constraints.min_size();
        }
        let child_constraints = match self.axis {
            Axis::Column => Constraints::new(constraints.min_width, constraints.max_width, 0, Constraints::UNBOUNDED),
            Axis::Row => Constraints::new(0, Constraints::UNBOUNDED, constraints.min_height, constraints.max_height),
        };

        let mut total_main = self.gaps() as u32;
        let mut max_cross = 0u16;
        let mut children = std::mem::take(&mut self.children);
        for child in &mut children {
            let size = self.measure_child(child, child_constraints);
            total_main += self.axis.main(size) as u32;
            max_cross = max_cross.max(self.axis.cross(size));
        }
        self.children = children;

        let main = u16::try_from(total_main).unwrap_or(u16::MAX);
        constraints.constrain(self.axis.size(main, max_cross))
    }

    fn layout(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.child_bounds.clear();
        if self.children.is_empty() {
            return;
        }

        let child_constraints = match self.axis {
            Axis::Column => Constraints::loose(bounds.width, Constraints::UNBOUNDED),
            Axis::Row => Constraints::loose(Constraints::UNBOUNDED, bounds.height),
        };
        let mut children = std::mem::take(&mut self.children);
        let items: Vec<FlexItem> = children
            .iter_mut()
            .map(|child| FlexItem {
                base: self.axis.main(self.measure_child(child, child_constraints)),
                grow: child.grow,
                shrink: child.shrink,
            })
            .collect();
        let sizes = solve(self.axis.main(bounds.size()), self.gap, &items);

        let mut offset = 0u16;
        for (child, size) in children.iter_mut().zip(sizes) {
            let rect = match self.axis {
                Axis::Column => Rect::new(bounds.x, bounds.y.saturating_add(offset), bounds.width, size),
                Axis::Row => Rect::new(bounds.x.saturating_add(offset), bounds.y, size, bounds.height),
            };
            child.widget.layout(rect);
            self.child_bounds.push(rect);
            offset = offset.saturating_add(size).saturating_add(self.gap);
        }
        self.children = children;
    }

    fn render(&self, ctx: &mut RenderContext<'_>) {
        for (child, bounds) in self.children.iter().zip(&self.child_bounds) {
            if !bounds.is_empty() {
                ctx.render_child(child.widget.as_ref(), *bounds);
            }
        }
    }

    /// First child that handles the message wins.
    fn handle_message(&mut self, msg: &Message) -> HandleResult {
        for child in &mut self.children {
            let result = child.widget.handle_message(msg);
            if result.handled {
                return result;
            }
        }
        HandleResult::unhandled()
    }

    fn visit_children(&self, f: &mut dyn FnMut(&dyn Widget)) {
        for child in &self.children {
            f(child.widget.as_ref());
        }
    }

    fn visit_children_mut(&mut self, f: &mut dyn FnMut(&mut dyn Widget)) {
        for child in &mut self.children {
            f(child.widget.as_mut());
        }
    }

    fn bounds(&self) -> Option<Rect> {
        Some(self.bounds)
    }

    fn path_segment(&self, child: WidgetId) -> Option<String> {
        self.children
            .iter()
            .position(|c| c.widget.id() == child)
            .map(|i| format!("Flex[{i}]"))
    }
}

// =============================================================================
// SPACER
// =============================================================================

/// Invisible filler.
pub struct Spacer {
    id: WidgetId,
    bounds: Rect,
}

impl Spacer {
    pub fn new() -> Self {
        Self {
            id: WidgetId::next(),
            bounds: Rect::default(),
        }
    }

    /// A spacer taking an equal share of free space.
    pub fn space() -> FlexChild {
        FlexChild::expanded(Self::new())
    }

    /// A spacer of exactly `size` cells.
    pub fn fixed(size: u16) -> FlexChild {
        FlexChild::sized(Self::new(), size)
    }
}

impl Default for Spacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for Spacer {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn measure(&mut self, constraints: Constraints) -> Size {
        constraints.min_size()
    }

    fn layout(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn render(&self, _ctx: &mut RenderContext<'_>) {}

    fn handle_message(&mut self, _msg: &Message) -> HandleResult {
        HandleResult::unhandled()
    }

    fn bounds(&self) -> Option<Rect> {
        Some(self.bounds)
    }
}

// =============================================================================
// TESTS
// =============================================================================
