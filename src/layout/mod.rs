//! Layout.
//!
//! Widgets lay themselves out in two passes: `measure` under
//! [`Constraints`](crate::types::Constraints), then `layout` with final
//! bounds. [`Flex`] is the stock container; the distribution functions it
//! uses are public for widgets that split space themselves.
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::layout::{Flex, FlexChild, Spacer};
//!
//! let toolbar = Flex::row()
//!     .with_gap(1)
//!     .push(FlexChild::fixed(title))
//!     .push(Spacer::space())
//!     .push(FlexChild::sized(clock, 8));
//! ```

mod flex;

pub use flex::{distribute_grow, distribute_shrink, solve, Axis, Flex, FlexChild, FlexItem, Spacer};
