//! The Pratt dispatcher: initial parselets (a token that opens an
//! expression) and consequent parselets (a token that extends an
//! already-parsed left operand), plus the handful of mixfix productions
//! (lists, piecewise, style mappings, calls, comparisons, regression
//! parameters, substitution) each of those delegates to.

use graphlang_ast::*;
use graphlang_diagnostics::PResult;
use graphlang_position::{envelope, Pos};
use graphlang_token::{Token, TokenKind};

use crate::precedence as bp;
use crate::precedence::Bp;
use crate::state::{span, ParserState};
use crate::{identifier, literal};
use crate::statement::finalize_to_statement;

/// A node produced by [`parse_node`]: almost always an [`Expression`], but
/// the handful of keyword-initiated productions (`table`, `folder`,
/// `image`, `settings`, `ticker`) and the two meta consequents (`@{`,
/// `#{`) finalize straight to a [`Statement`] instead. Nothing in the
/// grammar applies a further consequent to a `Stmt`, other than `@{`/`#{`
/// themselves, which finalize whatever they're given either way.
pub(crate) enum Node {
    Expr(Expression),
    Stmt(Statement),
    /// A bare `@{ ... }` style-mapping literal with no preceding left
    /// operand to attach to. Grammatically valid as an initial parselet,
    /// but finalization has nothing sensible to turn it into — see
    /// [`crate::statement::finalize_to_statement`]'s caller.
    Mapping(StyleMapping),
}

impl Node {
    pub(crate) fn pos(&self) -> Option<Pos> {
        match self {
            Node::Expr(e) => e.pos(),
            Node::Stmt(s) => s.pos(),
            Node::Mapping(m) => m.pos,
        }
    }
}

/// Parses a pure expression at `min_bp`, rejecting a statement-shaped
/// result. Used everywhere a sub-expression is expected (operands,
/// arguments, conditions, ...) as opposed to the one call site
/// ([`crate::statement::parse_statements`]) that accepts either.
pub(crate) fn parse_expr(state: &mut ParserState, min_bp: Bp) -> PResult<Expression> {
    match parse_node(state, min_bp, false)? {
        Node::Expr(e) => Ok(e),
        Node::Stmt(s) => state.fatal("Expected an expression here, found a statement.", s.pos()),
    }
}

/// The Pratt loop proper. `is_statement_top` is constant for the whole
/// call: it's the property of this one outermost statement-level
/// invocation, not of any single iteration. `=` can be reached at most
/// once per invocation regardless of what (call, member, index, ...)
/// preceded it in the same loop, since once `=` is consumed its own
/// consequent parselet absorbs everything up to `rel`, and anything past
/// that point belongs to a fresh, nested `parse_node` call with
/// `is_statement_top = false`. So `f(x) = a->a+1, b->b+1` gets the same
/// `topLevelEq` treatment as `A = a->a+1, b->b+1`.
pub(crate) fn parse_node(state: &mut ParserState, min_bp: Bp, is_statement_top: bool) -> PResult<Node> {
    let Some(_guard) = state.enter_depth() else {
        return state.fatal("Expression nested too deeply.", None);
    };

    let first = state.consume(None)?;
    let mut left = parse_initial(state, &first)?;

    loop {
        let next = state.peek();
        let op_bp = consequent_bp(&left, &next);
        if op_bp <= min_bp {
            break;
        }
        let tok = state.consume(None)?;
        left = apply_consequent(state, left, &tok, op_bp, is_statement_top)?;
    }

    Ok(left)
}

fn consequent_bp(left: &Node, tok: &Token) -> Bp {
    if matches!(left, Node::Mapping(_)) {
        return bp::TOP;
    }
    if tok.lexeme.as_ref() == "@{" || tok.lexeme.as_ref() == "#{" {
        return bp::META;
    }
    if matches!(left, Node::Stmt(_)) {
        return bp::TOP;
    }
    match tok.lexeme.as_ref() {
        "+" | "-" => bp::ADD,
        "*" | "/" => bp::MUL,
        "^" => bp::POW,
        "(" | "'" => bp::CALL,
        "!" => bp::POSTFIX,
        "." => bp::MEMBER,
        "[" => bp::ACCESS,
        "<" | "<=" | "=" | ">=" | ">" => bp::REL,
        "->" => bp::UPDATE_RULE,
        "," => bp::SEQ,
        "~" => bp::SIM,
        _ if tok.kind == TokenKind::Prime => bp::CALL,
        _ if tok.kind == TokenKind::Keyword && tok.lexeme.as_ref() == "with" => bp::SUBSTITUTION,
        _ => bp::TOP,
    }
}

fn rel_op_from_lexeme(lexeme: &str) -> Option<BinaryOp> {
    match lexeme {
        "<" => Some(BinaryOp::Lt),
        "<=" => Some(BinaryOp::Le),
        "=" => Some(BinaryOp::Eq),
        ">=" => Some(BinaryOp::Ge),
        ">" => Some(BinaryOp::Gt),
        _ => None,
    }
}

fn apply_consequent(
    state: &mut ParserState,
    left: Node,
    tok: &Token,
    op_bp: Bp,
    is_statement_top: bool,
) -> PResult<Node> {
    if tok.lexeme.as_ref() == "@{" {
        return Ok(Node::Stmt(style_attach_consequent(state, left, tok)?));
    }
    if tok.lexeme.as_ref() == "#{" {
        return Ok(Node::Stmt(regression_consequent(state, left, tok)?));
    }

    let Node::Expr(expr) = left else {
        return state.fatal("Unexpected token after a finalized statement.", Some(span(tok)));
    };

    match tok.lexeme.as_ref() {
        "+" => Ok(Node::Expr(binary(expr, BinaryOp::Add, state, bp::ADD)?)),
        "-" => Ok(Node::Expr(binary(expr, BinaryOp::Sub, state, bp::ADD)?)),
        "*" => Ok(Node::Expr(binary(expr, BinaryOp::Mul, state, bp::MUL)?)),
        "/" => Ok(Node::Expr(binary(expr, BinaryOp::Div, state, bp::MUL)?)),
        "^" => Ok(Node::Expr(binary(expr, BinaryOp::Pow, state, bp::POW - 1)?)),
        "~" => Ok(Node::Expr(binary(expr, BinaryOp::Sim, state, bp::SIM)?)),
        "(" => call_consequent(state, expr, tok).map(Node::Expr),
        "'" => prime_consequent(state, expr, tok).map(Node::Expr),
        _ if tok.kind == TokenKind::Prime => prime_consequent(state, expr, tok).map(Node::Expr),
        "!" => {
            let pos = envelope([expr.pos(), Some(span(tok))]);
            Ok(Node::Expr(Expression::Postfix(PostfixExpression { expr: Box::new(expr), pos })))
        }
        "." => member_consequent(state, expr).map(Node::Expr),
        "[" => access_consequent(state, expr, tok).map(Node::Expr),
        "<" | "<=" | "=" | ">=" | ">" => {
            let op1 = rel_op_from_lexeme(tok.lexeme.as_ref()).expect("matched above");
            let right_bp = if is_statement_top && op1 == BinaryOp::Eq { bp::SEQ - 1 } else { bp::REL };
            comparison_consequent(state, expr, op1, right_bp).map(Node::Expr)
        }
        "->" => update_rule_consequent(state, expr).map(Node::Expr),
        "," => seq_consequent(state, expr, tok).map(Node::Expr),
        _ if tok.kind == TokenKind::Keyword && tok.lexeme.as_ref() == "with" => {
            with_consequent(state, expr).map(Node::Expr)
        }
        _ => {
            let _ = op_bp;
            state.fatal(format!("Unexpected token '{}'.", tok.lexeme), Some(span(tok)))
        }
    }
}

fn binary(left: Expression, op: BinaryOp, state: &mut ParserState, right_bp: Bp) -> PResult<Expression> {
    let left_pos = left.pos();
    let right = parse_expr(state, right_bp)?;
    let pos = envelope([left_pos, right.pos()]);
    Ok(Expression::Binary(BinaryExpression { op, left: Box::new(left), right: Box::new(right), pos }))
}

// --- Initial parselets -------------------------------------------------

fn parse_initial(state: &mut ParserState, tok: &Token) -> PResult<Node> {
    match tok.kind {
        TokenKind::Number => Ok(Node::Expr(Expression::Number(NumberLit {
            value: literal::decode_number(&tok.lexeme),
            pos: Some(span(tok)),
        }))),
        TokenKind::String => Ok(Node::Expr(Expression::String(StringLit {
            value: literal::decode_string(&tok.lexeme),
            pos: Some(span(tok)),
        }))),
        TokenKind::Id => {
            let name = identifier::normalize(&tok.lexeme, state.non_subscripting(), state, Some(span(tok)))?;
            Ok(Node::Expr(Expression::Identifier(Identifier { name, pos: Some(span(tok)) })))
        }
        TokenKind::Keyword => parse_keyword_initial(state, tok),
        TokenKind::Punct => parse_punct_initial(state, tok),
        _ => state.fatal(format!("Unexpected text: '{}'.", tok.lexeme), Some(span(tok))),
    }
}

fn parse_punct_initial(state: &mut ParserState, tok: &Token) -> PResult<Node> {
    match tok.lexeme.as_ref() {
        "(" => parse_paren_or_derivative(state, tok).map(Node::Expr),
        "-" => {
            let operand = parse_expr(state, bp::PREFIX)?;
            let pos = envelope([Some(span(tok)), operand.pos()]);
            Ok(Node::Expr(Expression::Prefix(PrefixExpression { expr: Box::new(operand), pos })))
        }
        "[" => parse_bracket_body(state, span(tok)).map(Node::Expr),
        "{" => parse_piecewise(state, span(tok)).map(Node::Expr),
        "@{" => Ok(Node::Mapping(parse_style_mapping(state, span(tok))?)),
        _ => state.fatal(format!("Unexpected text: '{}'.", tok.lexeme), Some(span(tok))),
    }
}

fn parse_paren_or_derivative(state: &mut ParserState, open: &Token) -> PResult<Expression> {
    if state.peek().lexeme.as_ref() == "d/d" {
        state.consume(None)?;
        let var_tok = state.consume_type(TokenKind::Id)?;
        let var_name = identifier::normalize(&var_tok.lexeme, state.non_subscripting(), state, Some(span(&var_tok)))?;
        let variable = Identifier { name: var_name, pos: Some(span(&var_tok)) };
        state.consume(Some(")"))?;
        let body = parse_expr(state, bp::DERIVATIVE)?;
        let pos = envelope([Some(span(open)), body.pos()]);
        return Ok(Expression::Derivative(DerivativeExpression { expr: Box::new(body), variable, pos }));
    }

    let inner = parse_expr(state, bp::TOP)?;
    let close = state.consume(Some(")"))?;
    let outer_pos = envelope([Some(span(open)), Some(span(&close))]);
    match inner {
        Expression::Sequence(mut seq) => {
            seq.paren_wrapped = true;
            seq.pos = outer_pos;
            Ok(Expression::Sequence(seq))
        }
        other => Ok(set_pos(other, outer_pos)),
    }
}

/// Reuses `other`'s node, widening its recorded span to the surrounding
/// parens rather than keeping only the inner span.
fn set_pos(expr: Expression, pos: Option<Pos>) -> Expression {
    match expr {
        Expression::Number(mut n) => { n.pos = pos; Expression::Number(n) }
        Expression::Identifier(mut i) => { i.pos = pos; Expression::Identifier(i) }
        Expression::String(mut s) => { s.pos = pos; Expression::String(s) }
        Expression::Prefix(mut e) => { e.pos = pos; Expression::Prefix(e) }
        Expression::Postfix(mut e) => { e.pos = pos; Expression::Postfix(e) }
        Expression::Binary(mut e) => { e.pos = pos; Expression::Binary(e) }
        Expression::DoubleInequality(mut e) => { e.pos = pos; Expression::DoubleInequality(e) }
        Expression::Sequence(mut e) => { e.pos = pos; Expression::Sequence(e) }
        Expression::Range(mut e) => { e.pos = pos; Expression::Range(e) }
        Expression::List(mut e) => { e.pos = pos; Expression::List(e) }
        Expression::ListComprehension(mut e) => { e.pos = pos; Expression::ListComprehension(e) }
        Expression::ListAccess(mut e) => { e.pos = pos; Expression::ListAccess(e) }
        Expression::Member(mut e) => { e.pos = pos; Expression::Member(e) }
        Expression::Call(mut e) => { e.pos = pos; Expression::Call(e) }
        Expression::Prime(mut e) => { e.pos = pos; Expression::Prime(e) }
        Expression::Derivative(mut e) => { e.pos = pos; Expression::Derivative(e) }
        Expression::Repeated(mut e) => { e.pos = pos; Expression::Repeated(e) }
        Expression::Piecewise(mut e) => { e.pos = pos; Expression::Piecewise(e) }
        Expression::UpdateRule(mut e) => { e.pos = pos; Expression::UpdateRule(e) }
        Expression::Assignment(mut e) => { e.pos = pos; Expression::Assignment(e) }
        Expression::Substitution(mut e) => { e.pos = pos; Expression::Substitution(e) }
    }
}

fn parse_keyword_initial(state: &mut ParserState, tok: &Token) -> PResult<Node> {
    match tok.lexeme.as_ref() {
        "sum" | "product" | "integral" => parse_repeated(state, tok).map(Node::Expr),
        "table" => parse_table(state, tok).map(Node::Stmt),
        "folder" => parse_folder(state, tok).map(Node::Stmt),
        "image" => parse_image(state, tok).map(Node::Stmt),
        "settings" => Ok(Node::Stmt(Statement::Settings(SettingsStatement { style: None, pos: Some(span(tok)) }))),
        "ticker" => parse_ticker(state, tok).map(Node::Stmt),
        _ => state.fatal(format!("Unexpected text: '{}'.", tok.lexeme), Some(span(tok))),
    }
}

fn parse_repeated(state: &mut ParserState, tok: &Token) -> PResult<Expression> {
    let kind = match tok.lexeme.as_ref() {
        "sum" => RepeatedKind::Sum,
        "product" => RepeatedKind::Product,
        "integral" => RepeatedKind::Integral,
        _ => unreachable!("matched in parse_keyword_initial"),
    };
    let index_tok = state.consume_type(TokenKind::Id)?;
    let index_name = identifier::normalize(&index_tok.lexeme, state.non_subscripting(), state, Some(span(&index_tok)))?;
    let index = Identifier { name: index_name, pos: Some(span(&index_tok)) };
    state.consume(Some("="))?;
    state.consume(Some("("))?;
    let start = parse_expr(state, bp::TOP)?;
    state.consume(Some("..."))?;
    let end = parse_expr(state, bp::TOP)?;
    state.consume(Some(")"))?;
    let term = parse_expr(state, bp::ADD)?;
    let pos = envelope([Some(span(tok)), term.pos()]);
    Ok(Expression::Repeated(RepeatedExpression {
        kind,
        index,
        start: Box::new(start),
        end: Box::new(end),
        expr: Box::new(term),
        pos,
    }))
}

fn parse_table(state: &mut ParserState, tok: &Token) -> PResult<Statement> {
    state.consume(Some("{"))?;
    let children = crate::statement::parse_statements(state, false);
    let close = state.consume(Some("}"))?;
    let mut columns = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Statement::ExprStatement(s) => columns.push(s),
            other => {
                state.push_error("Table columns must be plain expressions; dropping this one.", other.pos());
            }
        }
    }
    let pos = envelope([Some(span(tok)), Some(span(&close))]);
    Ok(Statement::Table(TableStatement { columns, style: None, pos }))
}

fn parse_folder(state: &mut ParserState, tok: &Token) -> PResult<Statement> {
    let title_tok = state.consume_type(TokenKind::String)?;
    let title = StringLit { value: literal::decode_string(&title_tok.lexeme), pos: Some(span(&title_tok)) };
    state.consume(Some("{"))?;
    let children = crate::statement::parse_statements(state, false);
    let close = state.consume(Some("}"))?;
    let pos = envelope([Some(span(tok)), Some(span(&close))]);
    Ok(Statement::Folder(FolderStatement { title, children, style: None, pos }))
}

fn parse_image(state: &mut ParserState, tok: &Token) -> PResult<Statement> {
    let name_tok = state.consume_type(TokenKind::String)?;
    let name = StringLit { value: literal::decode_string(&name_tok.lexeme), pos: Some(span(&name_tok)) };
    let pos = envelope([Some(span(tok)), Some(span(&name_tok))]);
    Ok(Statement::Image(ImageStatement { name, style: None, pos }))
}

fn parse_ticker(state: &mut ParserState, tok: &Token) -> PResult<Statement> {
    let handler_expr = parse_expr(state, bp::META)?;
    let Expression::UpdateRule(handler) = handler_expr else {
        return state.fatal("Ticker handler must be 'variable -> expr'.", handler_expr.pos());
    };
    let pos = envelope([Some(span(tok)), handler.pos]);
    Ok(Statement::Ticker(TickerStatement { handler, style: None, pos }))
}

// --- Bare sequences, lists, ranges, comprehensions ---------------------

/// A comma-separated run of expressions with no `SequenceExpression`
/// wrapper, terminated implicitly by whatever non-operator token follows
/// (the caller checks for and consumes that terminator itself).
fn parse_bare_sequence(state: &mut ParserState) -> PResult<Vec<Expression>> {
    let mut items = vec![parse_expr(state, bp::SEQ)?];
    while state.peek().lexeme.as_ref() == "," {
        state.consume(None)?;
        items.push(parse_expr(state, bp::SEQ)?);
    }
    Ok(items)
}

fn split_assignment_shape(expr: Expression, state: &mut ParserState) -> PResult<(Identifier, Expression, Option<Pos>)> {
    match expr {
        Expression::Binary(BinaryExpression { op: BinaryOp::Eq, left, right, pos }) => match *left {
            Expression::Identifier(id) => Ok((id, *right, pos)),
            other => {
                let p = other.pos();
                state.fatal("Expected 'identifier = expression'.", p)
            }
        },
        other => {
            let p = other.pos();
            state.fatal("Expected 'identifier = expression'.", p)
        }
    }
}

fn to_assignment(expr: Expression, state: &mut ParserState) -> PResult<Assignment> {
    let (variable, expr, pos) = split_assignment_shape(expr, state)?;
    Ok(Assignment { variable, expr, pos })
}

fn to_regression_entry(expr: Expression, state: &mut ParserState) -> PResult<RegressionEntry> {
    let (variable, value, pos) = split_assignment_shape(expr, state)?;
    Ok(RegressionEntry { variable, value, pos })
}

/// Parses the body of a `[...]` — shared by the initial `[` parselet and
/// the `[` access consequent (which re-parses its bracket the same way,
/// then unwraps a single-element list down to its one element).
fn parse_bracket_body(state: &mut ParserState, open_pos: Pos) -> PResult<Expression> {
    let start_values = parse_bare_sequence(state)?;
    let next = state.peek();

    if next.lexeme.as_ref() == "..." {
        state.consume(None)?;
        if state.peek().lexeme.as_ref() == "," {
            state.consume(None)?;
        }
        let end_values = parse_bare_sequence(state)?;
        let close = state.consume(Some("]"))?;
        let pos = envelope([Some(open_pos), Some(span(&close))]);
        return Ok(Expression::Range(RangeExpression { start_values, end_values, pos }));
    }

    if next.kind == TokenKind::Keyword && next.lexeme.as_ref() == "for" {
        state.consume(None)?;
        if start_values.len() != 1 {
            return state.fatal("List comprehensions take exactly one expression before 'for'.", Some(open_pos));
        }
        let expr = start_values.into_iter().next().expect("len checked above");
        let raw = parse_bare_sequence(state)?;
        let assignments = raw.into_iter().map(|e| to_assignment(e, state)).collect::<PResult<Vec<_>>>()?;
        let close = state.consume(Some("]"))?;
        let pos = envelope([Some(open_pos), Some(span(&close))]);
        return Ok(Expression::ListComprehension(ListComprehension { expr: Box::new(expr), assignments, pos }));
    }

    if next.lexeme.as_ref() == "]" {
        let close = state.consume(None)?;
        let pos = envelope([Some(open_pos), Some(span(&close))]);
        return Ok(Expression::List(ListExpression { values: start_values, pos }));
    }

    state.fatal("Expected ']'.", Some(span(&next)))
}

// --- Piecewise ----------------------------------------------------------

fn try_as_comparison(expr: Expression) -> Result<Condition, Expression> {
    match expr {
        Expression::DoubleInequality(d) => Ok(Condition::Chained(d)),
        Expression::Binary(b) if b.op.is_comparison() => Ok(Condition::Comparison(b)),
        Expression::Identifier(id) if id.name == "else" => Ok(Condition::Else(id)),
        other => Err(other),
    }
}

fn one_branch(condition: Condition) -> PiecewiseBranch {
    let pos = condition.pos();
    PiecewiseBranch { condition, consequent: Expression::Number(NumberLit { value: 1.0, pos: None }), pos }
}

fn parse_piecewise(state: &mut ParserState, open_pos: Pos) -> PResult<Expression> {
    let mut branches: Vec<PiecewiseBranch> = Vec::new();
    loop {
        let condition_expr = parse_expr(state, bp::SEQ)?;
        let next = state.peek();
        match next.lexeme.as_ref() {
            "}" => {
                state.consume(None)?;
                match try_as_comparison(condition_expr) {
                    Ok(condition) => branches.push(one_branch(condition)),
                    Err(expr) => {
                        if branches.is_empty() {
                            return state.fatal("The first Piecewise branch must be a comparison.", expr.pos());
                        }
                        let epos = expr.pos();
                        let condition = Condition::Else(Identifier { name: "else".to_string(), pos: epos });
                        branches.push(PiecewiseBranch { condition, consequent: expr, pos: epos });
                    }
                }
                break;
            }
            ":" => {
                state.consume(None)?;
                let condition = match try_as_comparison(condition_expr) {
                    Ok(c) => c,
                    Err(expr) => return state.fatal("Expected a comparison before ':'.", expr.pos()),
                };
                let consequent = parse_expr(state, bp::SEQ)?;
                let pos = envelope([condition.pos(), consequent.pos()]);
                branches.push(PiecewiseBranch { condition, consequent, pos });
                if state.peek().lexeme.as_ref() == "," {
                    state.consume(None)?;
                    continue;
                }
                state.consume(Some("}"))?;
                break;
            }
            "," => {
                state.consume(None)?;
                let condition = match try_as_comparison(condition_expr) {
                    Ok(c) => c,
                    Err(expr) => return state.fatal("Expected a comparison before ','.", expr.pos()),
                };
                branches.push(one_branch(condition));
            }
            _ => return state.fatal("Unexpected character in Piecewise.", Some(span(&next))),
        }
    }
    let pos = envelope(std::iter::once(Some(open_pos)).chain(branches.iter().map(|b| b.pos)));
    Ok(Expression::Piecewise(PiecewiseExpression { branches, pos }))
}

// --- Style mappings -------------------------------------------------------

fn parse_style_mapping(state: &mut ParserState, open_pos: Pos) -> PResult<StyleMapping> {
    let mut entries = Vec::new();
    loop {
        if state.peek().lexeme.as_ref() == "}" {
            break;
        }
        let key_tok = state.consume_type(TokenKind::Id)?;
        let property = key_tok.lexeme.to_string();
        state.consume(Some(":"))?;
        let value = parse_mapping_value(state)?;
        let pos = envelope([Some(span(&key_tok)), value.pos()]);
        entries.push(MappingEntry { property, expr: value, pos });
        if state.peek().lexeme.as_ref() == "," {
            state.consume(None)?;
            continue;
        }
        break;
    }
    let close = state.consume(Some("}"))?;
    let pos = envelope([Some(open_pos), Some(span(&close))]);
    Ok(StyleMapping { entries, pos })
}

fn parse_mapping_value(state: &mut ParserState) -> PResult<MappingValue> {
    if state.peek().lexeme.as_ref() == "@{" {
        let open = state.consume(None)?;
        let nested = parse_style_mapping(state, span(&open))?;
        return Ok(MappingValue::Mapping(nested));
    }
    Ok(MappingValue::Expr(parse_expr(state, bp::SEQ)?))
}

fn style_attach_consequent(state: &mut ParserState, left: Node, open_tok: &Token) -> PResult<Statement> {
    let mut stmt = match left {
        Node::Stmt(s) => s,
        Node::Expr(e) => finalize_to_statement(e),
    };
    let mapping = parse_style_mapping(state, span(open_tok))?;
    set_style(&mut stmt, mapping);
    Ok(stmt)
}

pub(crate) fn set_style(stmt: &mut Statement, style: StyleMapping) {
    match stmt {
        Statement::ExprStatement(s) => s.style = Some(style),
        Statement::Text(s) => s.style = Some(style),
        Statement::Table(s) => s.style = Some(style),
        Statement::Image(s) => s.style = Some(style),
        Statement::Folder(s) => s.style = Some(style),
        Statement::Settings(s) => s.style = Some(style),
        Statement::Ticker(s) => s.style = Some(style),
    }
}

// --- Calls and prime notation -------------------------------------------

fn parse_call_args(state: &mut ParserState) -> PResult<(Vec<Expression>, Pos)> {
    if state.peek().lexeme.as_ref() == ")" {
        let close = state.consume(None)?;
        return Ok((Vec::new(), span(&close)));
    }
    let args = parse_bare_sequence(state)?;
    let close = state.consume(Some(")"))?;
    Ok((args, span(&close)))
}

fn call_consequent(state: &mut ParserState, left: Expression, open: &Token) -> PResult<Expression> {
    let left_pos = left.pos();
    let callee = match left {
        Expression::Identifier(id) => Callee::Identifier(id),
        Expression::Member(m) => Callee::Member(m),
        other => {
            let p = other.pos();
            return state.fatal("A call target must be an identifier or member access.", p);
        }
    };
    let _ = open;
    let (arguments, close_pos) = parse_call_args(state)?;
    let pos = envelope([left_pos, Some(close_pos)]);
    Ok(Expression::Call(CallExpression { callee, arguments, pos }))
}

fn prime_consequent(state: &mut ParserState, left: Expression, prime_tok: &Token) -> PResult<Expression> {
    let left_pos = left.pos();
    let Expression::Identifier(id) = left else {
        return state.fatal("Prime notation requires an identifier.", left_pos);
    };
    let order = prime_tok.lexeme.chars().count() as u32;
    state.consume(Some("("))?;
    let callee = Callee::Identifier(id);
    let callee_pos = callee.pos();
    let (arguments, close_pos) = parse_call_args(state)?;
    let call_pos = envelope([callee_pos, Some(close_pos)]);
    let call = CallExpression { callee, arguments, pos: call_pos };
    Ok(Expression::Prime(PrimeExpression { expr: call, order, pos: call_pos }))
}

fn member_consequent(state: &mut ParserState, left: Expression) -> PResult<Expression> {
    let left_pos = left.pos();
    let prop_tok = state.consume_type(TokenKind::Id)?;
    let name = identifier::normalize(&prop_tok.lexeme, state.non_subscripting(), state, Some(span(&prop_tok)))?;
    let property = Identifier { name, pos: Some(span(&prop_tok)) };
    let pos = envelope([left_pos, property.pos]);
    Ok(Expression::Member(MemberExpression { object: Box::new(left), property, pos }))
}

fn access_consequent(state: &mut ParserState, left: Expression, open: &Token) -> PResult<Expression> {
    let left_pos = left.pos();
    let inner = parse_bracket_body(state, span(open))?;
    let close_pos = inner.pos();
    let index = match inner {
        Expression::List(ListExpression { mut values, .. }) if values.len() == 1 => {
            values.pop().expect("len checked above")
        }
        other => other,
    };
    let pos = envelope([left_pos, close_pos]);
    Ok(Expression::ListAccess(ListAccessExpression { expr: Box::new(left), index: Box::new(index), pos }))
}

// --- Comparisons and double inequalities ---------------------------------

fn direction(op: BinaryOp) -> i8 {
    match op {
        BinaryOp::Eq => 0,
        BinaryOp::Lt | BinaryOp::Le => 1,
        BinaryOp::Ge | BinaryOp::Gt => -1,
        _ => unreachable!("direction is only defined for comparison operators"),
    }
}

fn chain_op_from_lexeme(lexeme: &str) -> Option<BinaryOp> {
    match lexeme {
        "<" => Some(BinaryOp::Lt),
        "<=" => Some(BinaryOp::Le),
        ">=" => Some(BinaryOp::Ge),
        ">" => Some(BinaryOp::Gt),
        _ => None,
    }
}

fn comparison_consequent(
    state: &mut ParserState,
    left: Expression,
    op1: BinaryOp,
    right_bp: Bp,
) -> PResult<Expression> {
    let left_pos = left.pos();
    let r1 = parse_expr(state, right_bp)?;
    let next = state.peek();

    if let Some(op2) = chain_op_from_lexeme(next.lexeme.as_ref()) {
        state.consume(None)?;
        let r2 = parse_expr(state, bp::REL)?;
        if direction(op1) == 0 || direction(op1) != direction(op2) {
            let chain_pos = envelope([left_pos, r2.pos()]);
            return state.fatal(format!("Cannot chain {} with {}.", op2.symbol(), op1.symbol()), chain_pos);
        }
        let pos = envelope([left_pos, r2.pos()]);
        return Ok(Expression::DoubleInequality(DoubleInequality {
            left: Box::new(left),
            left_op: op1,
            middle: Box::new(r1),
            right_op: op2,
            right: Box::new(r2),
            pos,
        }));
    }

    let pos = envelope([left_pos, r1.pos()]);
    Ok(Expression::Binary(BinaryExpression { op: op1, left: Box::new(left), right: Box::new(r1), pos }))
}

// --- Update rules, sequences, regression parameters, substitution --------

fn update_rule_consequent(state: &mut ParserState, left: Expression) -> PResult<Expression> {
    let left_pos = left.pos();
    let Expression::Identifier(variable) = left else {
        return state.fatal("The left side of '->' must be an identifier.", left_pos);
    };
    let value = parse_expr(state, bp::UPDATE_RULE)?;
    let pos = envelope([variable.pos, value.pos()]);
    Ok(Expression::UpdateRule(UpdateRule { variable, expr: Box::new(value), pos }))
}

fn seq_consequent(state: &mut ParserState, left: Expression, comma: &Token) -> PResult<Expression> {
    if state.peek().lexeme.as_ref() == "..." {
        let _ = comma;
        return Ok(left);
    }
    let left_pos = left.pos();
    let right = parse_expr(state, bp::SEQ - 1)?;
    let pos = envelope([left_pos, right.pos()]);
    Ok(Expression::Sequence(SequenceExpression { left: Box::new(left), right: Box::new(right), paren_wrapped: false, pos }))
}

fn regression_consequent(state: &mut ParserState, left: Node, open_tok: &Token) -> PResult<Statement> {
    let open_pos = span(open_tok);
    let stmt = match left {
        Node::Stmt(s) => s,
        Node::Expr(e) => finalize_to_statement(e),
    };
    let Statement::ExprStatement(mut expr_stmt) = stmt else {
        return state.fatal("Regression parameters must follow a '~' expression.", Some(open_pos));
    };
    if !matches!(&expr_stmt.expr, Expression::Binary(b) if b.op == BinaryOp::Sim) {
        return state.fatal("Regression parameters must follow a '~' expression.", Some(open_pos));
    }
    let raw = if state.peek().lexeme.as_ref() == "}" { Vec::new() } else { parse_bare_sequence(state)? };
    let entries = raw.into_iter().map(|e| to_regression_entry(e, state)).collect::<PResult<Vec<_>>>()?;
    let close = state.consume(Some("}"))?;
    let pos = envelope([Some(open_pos), Some(span(&close))]);
    expr_stmt.parameters = Some(RegressionParameters { entries, pos });
    Ok(Statement::ExprStatement(expr_stmt))
}

fn with_consequent(state: &mut ParserState, left: Expression) -> PResult<Expression> {
    let left_pos = left.pos();
    let raw = parse_bare_sequence(state)?;
    let assignments = raw.into_iter().map(|e| to_assignment(e, state)).collect::<PResult<Vec<_>>>()?;
    let last_pos = assignments.last().and_then(|a| a.pos);
    let pos = envelope([left_pos, last_pos]);
    Ok(Expression::Substitution(Substitution { body: Box::new(left), assignments, pos }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn parse_ok(source: &str) -> Program {
        let (program, diagnostics) = crate::parse(source, HashSet::new());
        assert!(diagnostics.is_empty(), "expected no diagnostics, got {diagnostics:?}");
        program
    }

    fn only_statement(program: &Program) -> &Statement {
        assert_eq!(program.children.len(), 1);
        &program.children[0]
    }

    fn expr_of(stmt: &Statement) -> &Expression {
        match stmt {
            Statement::ExprStatement(s) => &s.expr,
            other => panic!("expected an ExprStatement, got {other:?}"),
        }
    }

    #[test]
    fn pow_is_right_associative() {
        let program = parse_ok("a^b^c;");
        match expr_of(only_statement(&program)) {
            Expression::Binary(outer) => {
                assert_eq!(outer.op, BinaryOp::Pow);
                assert!(matches!(outer.left.as_ref(), Expression::Identifier(id) if id.name == "a"));
                match outer.right.as_ref() {
                    Expression::Binary(inner) => {
                        assert_eq!(inner.op, BinaryOp::Pow);
                        assert!(matches!(inner.left.as_ref(), Expression::Identifier(id) if id.name == "b"));
                        assert!(matches!(inner.right.as_ref(), Expression::Identifier(id) if id.name == "c"));
                    }
                    other => panic!("expected a nested Binary, got {other:?}"),
                }
            }
            other => panic!("expected a Binary, got {other:?}"),
        }
    }

    #[test]
    fn call_shaped_assignment_gets_top_level_eq_treatment() {
        // `(` is the loop's first consequent, `=` its second; both must see
        // the same `is_statement_top` so the right-hand sequence still
        // parses as a single `,`-joined operand rather than splitting the
        // statement at the comma.
        let program = parse_ok("f(x) = a->a+1, b->b+1;");
        match expr_of(only_statement(&program)) {
            Expression::Binary(assign) => {
                assert_eq!(assign.op, BinaryOp::Eq);
                assert!(matches!(assign.left.as_ref(), Expression::Call(_)));
                assert!(matches!(assign.right.as_ref(), Expression::Sequence(_)));
            }
            other => panic!("expected a Binary assignment, got {other:?}"),
        }
    }

    #[test]
    fn piecewise_with_trailing_else() {
        let program = parse_ok("{x>3:5, x<=0:-1, x};");
        match expr_of(only_statement(&program)) {
            Expression::Piecewise(p) => {
                assert_eq!(p.branches.len(), 3);
                assert!(matches!(p.branches[0].condition, Condition::Comparison(ref b) if b.op == BinaryOp::Gt));
                assert!(matches!(p.branches[1].condition, Condition::Comparison(ref b) if b.op == BinaryOp::Le));
                assert!(matches!(p.branches[2].condition, Condition::Else(_)));
                assert!(matches!(p.branches[2].consequent, Expression::Identifier(ref id) if id.name == "x"));
            }
            other => panic!("expected a Piecewise, got {other:?}"),
        }
    }

    #[test]
    fn list_comprehension_binds_a_range_and_a_list() {
        let program = parse_ok("[a+b for a=[0,5,10], b=[1...5]];");
        match expr_of(only_statement(&program)) {
            Expression::ListComprehension(c) => {
                assert!(matches!(c.expr.as_ref(), Expression::Binary(b) if b.op == BinaryOp::Add));
                assert_eq!(c.assignments.len(), 2);
                assert_eq!(c.assignments[0].variable.name, "a");
                assert!(matches!(c.assignments[0].expr, Expression::List(_)));
                assert_eq!(c.assignments[1].variable.name, "b");
                assert!(matches!(c.assignments[1].expr, Expression::Range(_)));
            }
            other => panic!("expected a ListComprehension, got {other:?}"),
        }
    }

    #[test]
    fn regression_parameters_attach_to_a_sim_expression() {
        let program = parse_ok("y1 ~ m*x1+b #{ m=1.5, b=2.3 };");
        match only_statement(&program) {
            Statement::ExprStatement(s) => {
                assert!(matches!(&s.expr, Expression::Binary(b) if b.op == BinaryOp::Sim));
                let params = s.parameters.as_ref().expect("regression parameters");
                assert_eq!(params.entries.len(), 2);
                assert_eq!(params.entries[0].variable.name, "m");
                assert_eq!(params.entries[1].variable.name, "b");
            }
            other => panic!("expected an ExprStatement, got {other:?}"),
        }
    }

    #[test]
    fn double_inequality_chains_same_direction_operators() {
        let program = parse_ok("1 <= x < -y;");
        match expr_of(only_statement(&program)) {
            Expression::DoubleInequality(d) => {
                assert_eq!(d.left_op, BinaryOp::Le);
                assert_eq!(d.right_op, BinaryOp::Lt);
                assert!(matches!(d.middle.as_ref(), Expression::Identifier(id) if id.name == "x"));
            }
            other => panic!("expected a DoubleInequality, got {other:?}"),
        }
    }

    #[test]
    fn opposite_direction_chain_is_rejected() {
        let (program, diagnostics) = crate::parse("1 < x > y;", HashSet::new());
        assert!(program.children.is_empty());
        assert!(diagnostics.iter().any(|d| d.message.contains("Cannot chain > with <")));
    }

    #[test]
    fn single_part_identifier_gets_implicit_subscript() {
        let program = parse_ok("xyz;");
        assert!(matches!(expr_of(only_statement(&program)), Expression::Identifier(id) if id.name == "x_yz"));
    }

    #[test]
    fn two_part_identifier_passes_through_even_in_the_operator_set() {
        let set = crate::build_non_subscripting_set(["sin"], std::iter::empty());
        let (program, diagnostics) = crate::parse("sin_2;", set);
        assert!(diagnostics.is_empty());
        assert!(matches!(expr_of(only_statement(&program)), Expression::Identifier(id) if id.name == "sin_2"));
    }

    #[test]
    fn runs_of_semicolons_are_absorbed_between_statements() {
        let program = parse_ok("foo; ;; bar=1;");
        assert_eq!(program.children.len(), 2);
    }

    #[test]
    fn prime_notation_reads_order_from_a_merged_multi_quote_token() {
        let program = parse_ok("f''(x);");
        match expr_of(only_statement(&program)) {
            Expression::Prime(p) => {
                assert_eq!(p.order, 2);
                assert_eq!(p.expr.arguments.len(), 1);
            }
            other => panic!("expected a Prime expression, got {other:?}"),
        }
    }
}
