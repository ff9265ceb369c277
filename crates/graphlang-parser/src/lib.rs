//! Pratt parser turning graphlang source text into a [`Program`] plus a
//! list of [`Diagnostic`]s.
//!
//! The entry point is [`parse`]: it never panics and never raises on
//! malformed input. A syntax error downgrades the offending statement to a
//! diagnostic and the parser resynchronizes at the next statement
//! boundary, so one typo never costs the rest of the program.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod expr;
mod identifier;
mod literal;
mod precedence;
mod state;
mod statement;

use std::collections::HashSet;

use graphlang_ast::Program;
use graphlang_diagnostics::Diagnostic;
use graphlang_position::envelope;

pub use identifier::build_non_subscripting_set;
use state::ParserState;

/// Parses `source` into a [`Program`] and the diagnostics recorded along
/// the way.
///
/// `non_subscripting` is the set of names that must never be rewritten by
/// the implicit-subscript rule (built once via
/// [`build_non_subscripting_set`] from the host application's registered
/// operator and command names).
#[tracing::instrument(skip(source, non_subscripting), fields(source_len = source.len()))]
pub fn parse(source: &str, non_subscripting: HashSet<String>) -> (Program, Vec<Diagnostic>) {
    let tokens = graphlang_lexer::tokenize(source);
    let mut parser = ParserState::new(tokens, non_subscripting);
    let children = statement::parse_program(&mut parser);
    let pos = envelope(children.iter().map(|s| s.pos()));
    let diagnostics = parser.into_diagnostics().into_records();

    tracing::debug!(statements = children.len(), diagnostics = diagnostics.len(), "parse complete");

    (Program { children, pos }, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_assignment_with_no_diagnostics() {
        let (program, diagnostics) = parse("y = x + 1;", HashSet::new());
        assert_eq!(program.children.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn empty_source_warns_but_does_not_panic() {
        let (program, diagnostics) = parse("", HashSet::new());
        assert!(program.children.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn a_malformed_statement_does_not_take_the_rest_of_the_program_with_it() {
        let (program, diagnostics) = parse("y = ^; z = 2;", HashSet::new());
        assert_eq!(program.children.len(), 1);
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn non_subscripting_set_protects_a_registered_operator_name() {
        let set = build_non_subscripting_set(["max"], std::iter::empty());
        let (program, diagnostics) = parse("max;", set);
        assert!(diagnostics.is_empty());
        assert_eq!(program.children.len(), 1);
    }
}
