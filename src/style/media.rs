//! Media conditions on style rules.

/// Environment media queries are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaContext {
    pub width: u16,
    pub height: u16,
    pub reduced_motion: bool,
}

impl MediaContext {
    pub fn orientation(&self) -> Orientation {
        if self.width >= self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A conjunction of conditions. Unset conditions always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaQuery {
    pub min_width: Option<u16>,
    pub max_width: Option<u16>,
    pub min_height: Option<u16>,
    pub max_height: Option<u16>,
    pub orientation: Option<Orientation>,
    pub reduced_motion: Option<bool>,
}

impl MediaQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_width(mut self, width: u16) -> Self {
        self.min_width = Some(width);
        self
    }

    pub fn max_width(mut self, width: u16) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn min_height(mut self, height: u16) -> Self {
        self.min_height = Some(height);
        self
    }

    pub fn max_height(mut self, height: u16) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = Some(reduced);
        self
    }

    pub fn matches(&self, ctx: &MediaContext) -> bool {
        self.min_width.is_none_or(|w| ctx.width >= w)
            && self.max_width.is_none_or(|w| ctx.width <= w)
            && self.min_height.is_none_or(|h| ctx.height >= h)
            && self.max_height.is_none_or(|h| ctx.height <= h)
            && self.orientation.is_none_or(|o| ctx.orientation() == o)
            && self.reduced_motion.is_none_or(|r| ctx.reduced_motion == r)
    }
}

/// Any query matching is enough; an empty list always matches.
pub(crate) fn any_matches(queries: &[MediaQuery], ctx: &MediaContext) -> bool {
    queries.is_empty() || queries.iter().any(|q| q.matches(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(width: u16, height: u16) -> MediaContext {
        MediaContext {
            width,
            height,
            reduced_motion: false,
        }
    }

    #[test]
    fn test_width_bounds() {
        let q = MediaQuery::new().min_width(80).max_width(120);
        assert!(!q.matches(&ctx(79, 24)));
        assert!(q.matches(&ctx(80, 24)));
        assert!(q.matches(&ctx(120, 24)));
        assert!(!q.matches(&ctx(121, 24)));
    }

    #[test]
    fn test_orientation_square_is_landscape() {
        let q = MediaQuery::new().orientation(Orientation::Landscape);
        assert!(q.matches(&ctx(30, 30)));
        assert!(!q.matches(&ctx(20, 30)));
    }

    #[test]
    fn test_query_list_is_disjunction() {
        let list = [MediaQuery::new().max_width(40), MediaQuery::new().reduced_motion(true)];
        assert!(any_matches(&list, &ctx(30, 10)));
        assert!(!any_matches(&list, &ctx(100, 10)));
        assert!(any_matches(&[], &ctx(100, 10)));
    }
}
