//! Byte-span position tracking for graphlang source text.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
mod line_index;
mod span;
pub use line_index::LineIndex;
pub use span::Pos;
