//! Tagged-union AST produced by a successful (or partially successful)
//! parse.
//!
//! Every node carries an `Option<Pos>`: `None` only for a node synthesized
//! without any contributing token (the empty [`Program`] produced by a
//! source with no statements). A composite node's span is the envelope of
//! its children's spans, computed with [`graphlang_position::envelope`].
//!
//! A handful of invariants the grammar guarantees are pushed into the type
//! system here rather than re-checked by every consumer: an
//! [`UpdateRule`]'s left-hand side is an [`Identifier`], not an arbitrary
//! expression; a piecewise branch's condition is a [`Condition`], not any
//! [`Expression`]; a call's callee is a [`Callee`], not any [`Expression`].

use graphlang_position::Pos;

/// Root of a parsed program: the top-level statement list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub children: Vec<Statement>,
    pub pos: Option<Pos>,
}

/// A bare identifier, reused wherever the grammar requires one specifically
/// rather than any expression (assignment targets, update-rule variables,
/// `with`-substitution variables).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identifier {
    pub name: String,
    pub pos: Option<Pos>,
}

/// A decimal number literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumberLit {
    pub value: f64,
    pub pos: Option<Pos>,
}

/// A `"..."` string literal, already decoded from its JSON-string-literal
/// source spelling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StringLit {
    pub value: String,
    pub pos: Option<Pos>,
}

/// A top-level entry in a [`Program`] or [`Statement::Folder`]'s children.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Statement {
    ExprStatement(ExprStatement),
    Text(TextStatement),
    Table(TableStatement),
    Image(ImageStatement),
    Folder(FolderStatement),
    Settings(SettingsStatement),
    Ticker(TickerStatement),
}

impl Statement {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Statement::ExprStatement(s) => s.pos,
            Statement::Text(s) => s.pos,
            Statement::Table(s) => s.pos,
            Statement::Image(s) => s.pos,
            Statement::Folder(s) => s.pos,
            Statement::Settings(s) => s.pos,
            Statement::Ticker(s) => s.pos,
        }
    }
}

/// A bare expression statement: `y = x^2`, `f(x) = 2x + 1`, a regression
/// `y_1 ~ m x_1 + b`, or just a free-standing `3 + 4`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprStatement {
    pub expr: Expression,
    pub style: Option<StyleMapping>,
    pub parameters: Option<RegressionParameters>,
    /// Name a regression solved for, when the statement left exactly one
    /// free variable (see the residual-variable rewriting rule).
    pub residual_variable: Option<Identifier>,
    pub pos: Option<Pos>,
}

/// A standalone note, rendered as text rather than graphed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextStatement {
    pub text: StringLit,
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// A `table` block: one column per expression statement, evaluated
/// side-by-side.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableStatement {
    pub columns: Vec<ExprStatement>,
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// An `image` block referencing an external asset by name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageStatement {
    pub name: StringLit,
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// A `folder` grouping a nested run of statements under a title.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FolderStatement {
    pub title: StringLit,
    pub children: Vec<Statement>,
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// A `settings` block carrying only a style mapping (graph-wide settings).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SettingsStatement {
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// A `ticker` block driving a repeated update rule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickerStatement {
    pub handler: UpdateRule,
    pub style: Option<StyleMapping>,
    pub pos: Option<Pos>,
}

/// Binary operator shared by arithmetic and comparison expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Sim,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl BinaryOp {
    /// True for the five relational operators a [`Condition`] or
    /// [`DoubleInequality`] is built from.
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ge | BinaryOp::Gt)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Sim => "~",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
        }
    }
}

/// The callee of a [`CallExpression`]: either a plain function/command name
/// or a member access used as a namespaced call (`mod.f(x)`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Callee {
    Identifier(Identifier),
    Member(MemberExpression),
}

impl Callee {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Callee::Identifier(i) => i.pos,
            Callee::Member(m) => m.pos,
        }
    }
}

/// The condition half of a [`PiecewiseBranch`]: a single comparison, a
/// chained double inequality, or the reserved `else` identifier marking the
/// catch-all final branch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    Comparison(BinaryExpression),
    Chained(DoubleInequality),
    Else(Identifier),
}

impl Condition {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Condition::Comparison(b) => b.pos,
            Condition::Chained(d) => d.pos,
            Condition::Else(i) => i.pos,
        }
    }
}

/// An `Identifier = expr` pair, the shape every entry in a
/// [`ListComprehension`]'s or [`Substitution`]'s assignment list is
/// required to have.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment {
    pub variable: Identifier,
    pub expr: Expression,
    pub pos: Option<Pos>,
}

/// Every expression-shaped node in the tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expression {
    Number(NumberLit),
    Identifier(Identifier),
    String(StringLit),
    Prefix(PrefixExpression),
    Postfix(PostfixExpression),
    Binary(BinaryExpression),
    DoubleInequality(DoubleInequality),
    Sequence(SequenceExpression),
    Range(RangeExpression),
    List(ListExpression),
    ListComprehension(ListComprehension),
    ListAccess(ListAccessExpression),
    Member(MemberExpression),
    Call(CallExpression),
    Prime(PrimeExpression),
    Derivative(DerivativeExpression),
    Repeated(RepeatedExpression),
    Piecewise(PiecewiseExpression),
    UpdateRule(UpdateRule),
    Assignment(AssignmentExpression),
    Substitution(Substitution),
}

impl Expression {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Expression::Number(n) => n.pos,
            Expression::Identifier(i) => i.pos,
            Expression::String(s) => s.pos,
            Expression::Prefix(e) => e.pos,
            Expression::Postfix(e) => e.pos,
            Expression::Binary(e) => e.pos,
            Expression::DoubleInequality(e) => e.pos,
            Expression::Sequence(e) => e.pos,
            Expression::Range(e) => e.pos,
            Expression::List(e) => e.pos,
            Expression::ListComprehension(e) => e.pos,
            Expression::ListAccess(e) => e.pos,
            Expression::Member(e) => e.pos,
            Expression::Call(e) => e.pos,
            Expression::Prime(e) => e.pos,
            Expression::Derivative(e) => e.pos,
            Expression::Repeated(e) => e.pos,
            Expression::Piecewise(e) => e.pos,
            Expression::UpdateRule(e) => e.pos,
            Expression::Assignment(e) => e.pos,
            Expression::Substitution(e) => e.pos,
        }
    }
}

/// Negation: `-expr`. The grammar has exactly one prefix operator, so it is
/// not carried as a field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefixExpression {
    pub expr: Box<Expression>,
    pub pos: Option<Pos>,
}

/// Factorial: `expr!`. The grammar has exactly one postfix operator, so it
/// is not carried as a field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostfixExpression {
    pub expr: Box<Expression>,
    pub pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub pos: Option<Pos>,
}

/// A chained comparison such as `0 < x <= 10`: two comparison operators
/// sharing a middle operand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DoubleInequality {
    pub left: Box<Expression>,
    pub left_op: BinaryOp,
    pub middle: Box<Expression>,
    pub right_op: BinaryOp,
    pub right: Box<Expression>,
    pub pos: Option<Pos>,
}

/// A comma-joined pair of expressions, either bare (`x, y`, a point written
/// without parens in a context that accepts one) or parenthesized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceExpression {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub paren_wrapped: bool,
    pub pos: Option<Pos>,
}

/// A `[start, ..., end]`-style range literal. Both ends support the
/// multi-value leading form used to give an explicit step (`[0, 2, ..., 10]`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeExpression {
    pub start_values: Vec<Expression>,
    pub end_values: Vec<Expression>,
    pub pos: Option<Pos>,
}

/// A `[a, b, c]` list literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListExpression {
    pub values: Vec<Expression>,
    pub pos: Option<Pos>,
}

/// `[expr for a = list, b = list]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListComprehension {
    pub expr: Box<Expression>,
    pub assignments: Vec<Assignment>,
    pub pos: Option<Pos>,
}

/// `list[index]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListAccessExpression {
    pub expr: Box<Expression>,
    pub index: Box<Expression>,
    pub pos: Option<Pos>,
}

/// `object.property`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: Identifier,
    pub pos: Option<Pos>,
}

/// `callee(arg, ...)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallExpression {
    pub callee: Callee,
    pub arguments: Vec<Expression>,
    pub pos: Option<Pos>,
}

/// `f'(x)`, `f''(x)`, ... — a call with `order` trailing `'` marks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimeExpression {
    pub expr: CallExpression,
    pub order: u32,
    pub pos: Option<Pos>,
}

/// Leibniz-notation derivative: `d/d x (expr)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivativeExpression {
    pub expr: Box<Expression>,
    pub variable: Identifier,
    pub pos: Option<Pos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepeatedKind {
    Sum,
    Product,
    Integral,
}

/// `sum`, `product`, or `integral` over an index from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepeatedExpression {
    pub kind: RepeatedKind,
    pub index: Identifier,
    pub start: Box<Expression>,
    pub end: Box<Expression>,
    pub expr: Box<Expression>,
    pub pos: Option<Pos>,
}

/// One `condition: consequent` arm of a [`PiecewiseExpression`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiecewiseBranch {
    pub condition: Condition,
    pub consequent: Expression,
    pub pos: Option<Pos>,
}

/// `{cond: a, cond: b, c}` — a sequence of guarded branches, the last of
/// which may be an unconditional fallback.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiecewiseExpression {
    pub branches: Vec<PiecewiseBranch>,
    pub pos: Option<Pos>,
}

/// `variable -> expr`, the right-hand action of a ticker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateRule {
    pub variable: Identifier,
    pub expr: Box<Expression>,
    pub pos: Option<Pos>,
}

/// `variable = expr`, a plain assignment (as distinct from an
/// [`ExprStatement`] whose top-level expression happens to be one).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssignmentExpression {
    pub variable: Identifier,
    pub expr: Box<Expression>,
    pub pos: Option<Pos>,
}

/// `expr with a = 1, b = 2` — evaluate `expr` with the given variables bound.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Substitution {
    pub body: Box<Expression>,
    pub assignments: Vec<Assignment>,
    pub pos: Option<Pos>,
}

/// The value side of a [`MappingEntry`]: either a plain expression or a
/// nested mapping (`color: {latex: "red", ...}`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MappingValue {
    Expr(Expression),
    Mapping(StyleMapping),
}

impl MappingValue {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            MappingValue::Expr(e) => e.pos(),
            MappingValue::Mapping(m) => m.pos,
        }
    }
}

/// `property: expr`, one entry of a [`StyleMapping`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MappingEntry {
    pub property: String,
    pub expr: MappingValue,
    pub pos: Option<Pos>,
}

/// `@{color: "red", lineStyle: "dashed"}` — the style-attachment literal
/// usable after any statement or after any item inside a list/table/folder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleMapping {
    pub entries: Vec<MappingEntry>,
    pub pos: Option<Pos>,
}

/// `variable = value`, one entry of [`RegressionParameters`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegressionEntry {
    pub variable: Identifier,
    pub value: Expression,
    pub pos: Option<Pos>,
}

/// `#{m = 1, b = 0}` — initial-value hints attached to a regression
/// statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegressionParameters {
    pub entries: Vec<RegressionEntry>,
    pub pos: Option<Pos>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identifier {
        Identifier { name: name.to_string(), pos: None }
    }

    #[test]
    fn statement_pos_delegates_to_variant() {
        let stmt = Statement::ExprStatement(ExprStatement {
            expr: Expression::Number(NumberLit { value: 1.0, pos: Some(Pos::new(0, 1)) }),
            style: None,
            parameters: None,
            residual_variable: None,
            pos: Some(Pos::new(0, 1)),
        });
        assert_eq!(stmt.pos(), Some(Pos::new(0, 1)));
    }

    #[test]
    fn callee_pos_delegates_to_variant() {
        let callee = Callee::Identifier(Identifier { name: "f".to_string(), pos: Some(Pos::new(2, 3)) });
        assert_eq!(callee.pos(), Some(Pos::new(2, 3)));
    }

    #[test]
    fn condition_else_carries_the_identifier() {
        let cond = Condition::Else(id("else"));
        match &cond {
            Condition::Else(ident) => assert_eq!(ident.name, "else"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn binary_op_symbol_round_trips_comparisons() {
        assert_eq!(BinaryOp::Le.symbol(), "<=");
        assert!(BinaryOp::Le.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }
}
