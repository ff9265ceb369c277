//! Token-stream cursor over an eagerly-lexed source string.
//!
//! graphlang's grammar has no lexer modes, so unlike a hand-rolled
//! context-sensitive scanner there is no benefit to lexing lazily:
//! [`graphlang_lexer::tokenize`] runs once up front and `ParserState` walks
//! the resulting vector, skipping trivia as it goes.

use graphlang_diagnostics::{DepthGuard, Diagnostics, PResult, ParseBudget};
use graphlang_position::Pos;
use graphlang_token::{Token, TokenKind};
use std::collections::HashSet;

/// Byte span covered by `token`.
pub(crate) fn span(token: &Token) -> Pos {
    Pos::new(token.offset, token.end)
}

fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Comment => "comment",
        TokenKind::Number => "number",
        TokenKind::Punct => "punctuation",
        TokenKind::Id => "identifier",
        TokenKind::Keyword => "keyword",
        TokenKind::String => "string",
        TokenKind::Prime => "prime mark",
        TokenKind::Semi => "statement separator",
        TokenKind::Space => "space",
        TokenKind::Invalid => "invalid character",
        TokenKind::Eof => "end of input",
    }
}

pub(crate) struct ParserState {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Diagnostics,
    budget: ParseBudget,
    depth: usize,
    non_subscripting: HashSet<String>,
}

impl ParserState {
    pub(crate) fn new(tokens: Vec<Token>, non_subscripting: HashSet<String>) -> Self {
        let tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect();
        ParserState {
            tokens,
            pos: 0,
            diagnostics: Diagnostics::default(),
            budget: ParseBudget::default(),
            depth: 0,
            non_subscripting,
        }
    }

    pub(crate) fn non_subscripting(&self) -> &HashSet<String> {
        &self.non_subscripting
    }

    pub(crate) fn peek(&self) -> Token {
        self.tokens[self.pos].clone()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// Consumes the next token unconditionally when `expected` is `None`.
    /// When `expected` is some lexeme, skips mismatching tokens (emitting a
    /// recoverable error for each) until it finds a match or reaches eof,
    /// at which point it escalates to a fatal error.
    pub(crate) fn consume(&mut self, expected: Option<&str>) -> PResult<Token> {
        let Some(exp) = expected else {
            return Ok(self.advance());
        };
        loop {
            let tok = self.peek();
            if tok.lexeme.as_ref() == exp {
                return Ok(self.advance());
            }
            if tok.kind == TokenKind::Eof {
                return self.fatal(format!("Expected '{exp}' but reached the end of input."), Some(span(&tok)));
            }
            self.push_error(format!("Expected '{exp}' but got '{}'. Skipping it.", tok.lexeme), Some(span(&tok)));
            self.advance();
        }
    }

    /// Like [`Self::consume`], but matches on token kind rather than lexeme.
    pub(crate) fn consume_type(&mut self, kind: TokenKind) -> PResult<Token> {
        loop {
            let tok = self.peek();
            if tok.kind == kind {
                return Ok(self.advance());
            }
            if tok.kind == TokenKind::Eof {
                return self.fatal(
                    format!("Expected a {} but reached the end of input.", kind_name(kind)),
                    Some(span(&tok)),
                );
            }
            self.push_error(
                format!("Expected a {} but got '{}'. Skipping it.", kind_name(kind), tok.lexeme),
                Some(span(&tok)),
            );
            self.advance();
        }
    }

    /// Discards tokens up to and including the next statement separator, or
    /// up to (but not past) eof, so the statement loop can resume after a
    /// fatal error.
    pub(crate) fn scan_to_next_statement(&mut self) {
        loop {
            let tok = self.peek();
            if tok.kind == TokenKind::Eof {
                return;
            }
            self.advance();
            if tok.kind == TokenKind::Semi {
                return;
            }
        }
    }

    pub(crate) fn push_error(&mut self, message: impl Into<String>, span: Option<Pos>) {
        self.diagnostics.push_error(message, span);
    }

    pub(crate) fn push_warning(&mut self, message: impl Into<String>, span: Option<Pos>) {
        self.diagnostics.push_warning(message, span);
    }

    pub(crate) fn fatal<T>(&mut self, message: impl Into<String>, span: Option<Pos>) -> PResult<T> {
        self.diagnostics.fatal(message, span)
    }

    /// Guards against pathologically deep recursion (e.g. a long run of
    /// nested parens). Returns `None` once the budget is exhausted.
    pub(crate) fn enter_depth(&mut self) -> Option<DepthGuard<'_>> {
        DepthGuard::enter(&mut self.depth, &self.budget)
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn diagnostics_is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub(crate) fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}
