//! Token definitions shared by the graphlang lexer and parser.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::sync::Arc;

/// Token produced by the lexer and consumed by the parser.
///
/// The lexeme text is kept in an `Arc<str>` so the parser's one-token
/// lookahead and statement-recovery scans can clone tokens cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token classification for parser dispatch.
    pub kind: TokenKind,
    /// Exact source text of the token.
    pub lexeme: Arc<str>,
    /// Starting byte offset in the source.
    pub offset: usize,
    /// Ending byte offset in the source (exclusive).
    pub end: usize,
    /// 1-based line number of the token's first byte.
    pub line: u32,
    /// 1-based column number (in `char`s) of the token's first byte.
    pub column: u32,
    /// Number of line breaks contained within the token's lexeme.
    pub line_breaks: u32,
}

impl Token {
    /// Create a new token.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TokenKind,
        lexeme: impl Into<Arc<str>>,
        offset: usize,
        end: usize,
        line: u32,
        column: u32,
        line_breaks: u32,
    ) -> Self {
        Token { kind, lexeme: lexeme.into(), offset, end, line, column, line_breaks }
    }

    /// Synthesize the `eof` token at the given offset (the end of the
    /// previous token, or `0` for an empty source).
    pub fn eof_at(offset: usize, line: u32, column: u32) -> Self {
        Token {
            kind: TokenKind::Eof,
            lexeme: Arc::from(""),
            offset,
            end: offset,
            line,
            column,
            line_breaks: 0,
        }
    }

    /// Byte length of the token.
    pub fn len(&self) -> usize {
        self.end - self.offset
    }

    /// True for a zero-length token (only ever the synthesized `eof`).
    pub fn is_empty(&self) -> bool {
        self.offset == self.end
    }
}

/// Lexical category of a [`Token`].
///
/// `Comment`, `Space`, and `Invalid` tokens are produced by the lexer but
/// are transparently skipped by the parser's `next` primitive; they still
/// flow through the raw token stream so tools other than the parser (a
/// formatter, a gutter highlighter) can see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `// ...` up to but not including the newline.
    Comment,
    /// A decimal literal, optionally with a fractional part and/or an
    /// exponent: `\d+(\.\d+)?([eE][+-]?\d+)?` or `\.\d+(...)?`.
    Number,
    /// One of the fixed punctuation spellings (see [`crate::PUNCTUATION`]).
    Punct,
    /// `[A-Za-z][A-Za-z0-9_]*` that is not a reserved word.
    Id,
    /// An identifier-shaped lexeme promoted because it matches a reserved
    /// word (`table`, `image`, `settings`, `folder`, `ticker`, `for`,
    /// `integral`, `sum`, `product`, `of`, `with`).
    Keyword,
    /// A `"..."` string literal with `\`-escapes.
    String,
    /// One or more `'` characters (derivative/prime notation).
    Prime,
    /// A literal `;`, or a run of whitespace containing two or more
    /// newlines (a paragraph break also terminates a statement).
    Semi,
    /// Any other run of spaces, tabs, or newlines.
    Space,
    /// A single code unit that matched none of the other lexical rules.
    Invalid,
    /// Synthesized once at the end of input.
    Eof,
}

impl TokenKind {
    /// Tokens the parser's `next` primitive skips over without surfacing
    /// them to the Pratt dispatcher.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::Space | TokenKind::Invalid)
    }
}

/// Exact punctuation spellings recognized by the lexer, longest first so a
/// prefix (`<`) never shadows a longer match (`<=`).
pub const PUNCTUATION: &[&str] = &[
    "...", "->", "<=", ">=", "d/d", "@{", "#{", "<", "=", ">", "~", ",", ":", ".", "'", "+", "-",
    "*", "/", "^", "!", "(", ")", "[", "]", "{", "}",
];

/// Reserved words that are lexed as `Id` but promoted to `Keyword`.
pub const KEYWORDS: &[&str] =
    &["table", "image", "settings", "folder", "ticker", "for", "integral", "sum", "product", "of", "with"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_is_checked_longest_first() {
        assert_eq!(PUNCTUATION[0], "...");
        assert!(PUNCTUATION.contains(&"<="));
        assert!(
            PUNCTUATION.iter().position(|p| *p == "<=").unwrap()
                < PUNCTUATION.iter().position(|p| *p == "<").unwrap()
        );
    }

    #[test]
    fn trivia_classification() {
        assert!(TokenKind::Space.is_trivia());
        assert!(TokenKind::Comment.is_trivia());
        assert!(TokenKind::Invalid.is_trivia());
        assert!(!TokenKind::Id.is_trivia());
        assert!(!TokenKind::Eof.is_trivia());
    }

    #[test]
    fn eof_token_is_zero_length() {
        let tok = Token::eof_at(12, 3, 4);
        assert!(tok.is_empty());
        assert_eq!(tok.kind, TokenKind::Eof);
    }
}
