//! Abstract syntax tree types produced by the graphlang parser.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod ast;

pub use ast::*;
pub use graphlang_position::Pos;
