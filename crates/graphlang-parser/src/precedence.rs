//! Binding-power ladder for the Pratt dispatcher, lowest to highest.
//!
//! Right-associative operators (`^`, the bare comma that builds a
//! [`graphlang_ast::SequenceExpression`]) recurse into their right operand at
//! `bp - 1` instead of `bp`, so a run of them nests right instead of left.

pub type Bp = u16;

pub const TOP: Bp = 0;
pub const META: Bp = 100;
pub const SEQ: Bp = 200;
pub const REL: Bp = 300;
pub const SIM: Bp = 400;
pub const UPDATE_RULE: Bp = 500;
pub const SUBSTITUTION: Bp = 600;
pub const DERIVATIVE: Bp = 700;
pub const ADD: Bp = 800;
pub const MUL: Bp = 900;
pub const PREFIX: Bp = 1000;
pub const POW: Bp = 1100;
pub const POSTFIX: Bp = 1200;
pub const CALL: Bp = 1300;
pub const ACCESS: Bp = 1400;
pub const MEMBER: Bp = 1500;
