//! The statement loop and the rules that turn a bare [`Expression`] into a
//! [`Statement`].
//!
//! A block is just a run of statements separated by `;`, each recovered
//! independently: a fatal error inside one statement discards the rest of
//! it and resumes scanning at the next separator, so one typo never loses
//! the whole program.

use graphlang_ast::{BinaryOp, Expression, ExprStatement, Statement, TextStatement};
use graphlang_diagnostics::PResult;
use graphlang_position::Pos;
use graphlang_token::TokenKind;

use crate::expr::{parse_node, Node};
use crate::precedence as bp;
use crate::state::{span, ParserState};

/// Parses a run of statements. `is_top` distinguishes the program's
/// top-level block (where a stray `}` is a recoverable error, consumed and
/// skipped) from a nested `table`/`folder` body (where `}` closes the
/// block and is left for the caller to consume).
pub(crate) fn parse_statements(state: &mut ParserState, is_top: bool) -> Vec<Statement> {
    let mut statements = Vec::new();

    loop {
        while state.peek().kind == TokenKind::Semi {
            let _ = state.consume(None);
        }

        let next = state.peek();
        if next.lexeme.as_ref() == "}" {
            if is_top {
                state.push_error("Unexpected '}'.", Some(span(&next)));
                let _ = state.consume(None);
                continue;
            }
            return statements;
        }
        if next.kind == TokenKind::Eof {
            return statements;
        }

        match parse_one_statement(state) {
            Ok(stmt) => {
                statements.push(stmt);
                if require_terminator(state).is_err() {
                    state.scan_to_next_statement();
                }
            }
            Err(_fatal) => state.scan_to_next_statement(),
        }
    }
}

fn parse_one_statement(state: &mut ParserState) -> PResult<Statement> {
    match parse_node(state, bp::TOP, true)? {
        Node::Stmt(s) => Ok(s),
        Node::Expr(e) => Ok(finalize_to_statement(e)),
        Node::Mapping(m) => state.fatal("A style mapping cannot stand on its own as a statement.", m.pos),
    }
}

/// A statement is terminated by `;` (consumed here), or left alone for the
/// enclosing block to see `}`/eof. Anything else left dangling is a
/// structural error that resyncs the same way a mid-statement fatal does.
fn require_terminator(state: &mut ParserState) -> PResult<()> {
    let tok = state.peek();
    match tok.kind {
        TokenKind::Semi => {
            state.consume(None)?;
            Ok(())
        }
        TokenKind::Eof => Ok(()),
        _ if tok.lexeme.as_ref() == "}" => Ok(()),
        _ => state.fatal(format!("Expected ';' but got '{}'.", tok.lexeme), Some(span(&tok))),
    }
}

/// Runs [`parse_statements`] for the whole program and applies the two
/// defensive checks that only make sense once, at the top: an empty,
/// diagnostic-free program gets a friendly nudge rather than silence, and
/// (this should be unreachable by construction, since the top-level loop
/// only ever returns at eof) a leftover token is reported rather than
/// silently dropped.
pub(crate) fn parse_program(state: &mut ParserState) -> Vec<Statement> {
    let statements = parse_statements(state, true);
    if statements.is_empty() && state.diagnostics_is_empty() {
        state.push_warning("Program is empty. Try typing: y=x", Some(Pos::new(0, 0)));
    }
    if !state.is_at_end() {
        state.push_error("Didn't reach the end of the input.", None);
    }
    statements
}

/// Turns a bare expression into the statement it denotes.
///
/// A top-level string becomes a note (`Statement::Text`) instead of an
/// inert expression statement. An `identifier = (... ~ ...)` assignment
/// whose right-hand side is a regression is rewritten to drop the
/// assignment and record `residual_variable` instead, so `m = y_1 ~ m x_1`
/// and the bare `y_1 ~ m x_1` read the same way downstream.
pub(crate) fn finalize_to_statement(expr: Expression) -> Statement {
    match expr {
        Expression::String(text) => {
            let pos = text.pos;
            Statement::Text(TextStatement { text, style: None, pos })
        }
        Expression::Binary(b)
            if b.op == BinaryOp::Eq
                && matches!(b.left.as_ref(), Expression::Identifier(_))
                && matches!(b.right.as_ref(), Expression::Binary(inner) if inner.op == BinaryOp::Sim) =>
        {
            let variable = match *b.left {
                Expression::Identifier(id) => id,
                _ => unreachable!("matched above"),
            };
            Statement::ExprStatement(ExprStatement {
                expr: *b.right,
                style: None,
                parameters: None,
                residual_variable: Some(variable),
                pos: b.pos,
            })
        }
        other => {
            let pos = other.pos();
            Statement::ExprStatement(ExprStatement { expr: other, style: None, parameters: None, residual_variable: None, pos })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn parse(source: &str) -> (Vec<Statement>, ParserState) {
        let tokens = graphlang_lexer::tokenize(source);
        let mut state = ParserState::new(tokens, HashSet::new());
        let statements = parse_program(&mut state);
        (statements, state)
    }

    #[test]
    fn plain_assignment_is_an_expr_statement() {
        let (statements, state) = parse("y = x^2;");
        assert_eq!(statements.len(), 1);
        assert!(state.diagnostics_is_empty());
        match &statements[0] {
            Statement::ExprStatement(s) => assert!(s.residual_variable.is_none()),
            _ => panic!("expected an ExprStatement"),
        }
    }

    #[test]
    fn top_level_string_becomes_text() {
        let (statements, _) = parse(r#""hello";"#);
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Statement::Text(_)));
    }

    #[test]
    fn assignment_of_a_regression_sets_residual_variable() {
        let (statements, _) = parse("m = y_1 ~ m*x_1;");
        match &statements[0] {
            Statement::ExprStatement(s) => {
                assert_eq!(s.residual_variable.as_ref().map(|i| i.name.as_str()), Some("m"));
                assert!(matches!(s.expr, Expression::Binary(ref b) if b.op == BinaryOp::Sim));
            }
            _ => panic!("expected an ExprStatement"),
        }
    }

    #[test]
    fn empty_program_warns() {
        let (statements, state) = parse("");
        assert!(statements.is_empty());
        assert!(!state.diagnostics_is_empty());
    }

    #[test]
    fn a_bad_statement_is_skipped_and_parsing_resumes() {
        let (statements, state) = parse("y = *; z = 2;");
        assert_eq!(statements.len(), 1);
        assert!(!state.diagnostics_is_empty());
        match &statements[0] {
            Statement::ExprStatement(s) => assert_eq!(
                match &s.expr {
                    Expression::Identifier(id) => id.name.as_str(),
                    _ => "",
                },
                "z"
            ),
            _ => panic!("expected an ExprStatement"),
        }
    }

    #[test]
    fn stray_closing_brace_at_top_level_is_recoverable() {
        let (statements, state) = parse("y = 1; } z = 2;");
        assert_eq!(statements.len(), 2);
        assert!(!state.diagnostics_is_empty());
    }
}
