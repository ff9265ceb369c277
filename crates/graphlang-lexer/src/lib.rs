//! Longest-match lexer for graphlang source text.
//!
//! [`tokenize`] runs the full ordered rule set over a source string up
//! front and returns every token, trivia included — the parser's lookahead
//! primitive is the one that skips `comment`/`space`/`invalid` tokens, not
//! the lexer itself, so a formatter or highlighter can still see them.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use graphlang_position::LineIndex;
use graphlang_token::{Token, TokenKind, KEYWORDS, PUNCTUATION};

/// Tokenizes `source` in full, ending with a synthesized `eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let line_index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < source.len() {
        let rest = &source[pos..];
        let (kind, len) = classify(rest);
        debug_assert!(len > 0, "every rule, invalid included, must consume at least one byte");
        let end = pos + len;
        let (line, column) = line_index.line_col(source, pos);
        let line_breaks = LineIndex::count_breaks(source, pos, end);
        let kind = if kind == TokenKind::Id && KEYWORDS.contains(&&rest[..len]) {
            TokenKind::Keyword
        } else {
            kind
        };
        tokens.push(Token::new(kind, &rest[..len], pos, end, line, column, line_breaks));
        pos = end;
    }

    let (line, column) = line_index.line_col(source, pos);
    tokens.push(Token::eof_at(pos, line, column));
    tokens
}

/// Runs every rule against `rest` and returns the longest match, breaking
/// ties in the table order from the specification (`comment, number, punct,
/// id, string, prime, semi, space, invalid`).
fn classify(rest: &str) -> (TokenKind, usize) {
    let candidates = [
        (TokenKind::Comment, match_comment(rest)),
        (TokenKind::Number, match_number(rest)),
        (TokenKind::Punct, match_punct(rest)),
        (TokenKind::Id, match_id(rest)),
        (TokenKind::String, match_string(rest)),
        (TokenKind::Prime, match_prime(rest)),
        (TokenKind::Semi, match_semi(rest)),
        (TokenKind::Space, match_space(rest)),
    ];

    // `max_by_key` keeps the *last* maximum on ties; the rule table instead
    // wants the first-listed rule to win a tie, so fold manually with a
    // strict `>`.
    let mut best: Option<(TokenKind, usize)> = None;
    for (kind, len) in candidates.into_iter().filter_map(|(kind, len)| len.map(|len| (kind, len))) {
        let beats_current = match best {
            Some((_, best_len)) => len > best_len,
            None => true,
        };
        if beats_current {
            best = Some((kind, len));
        }
    }

    match best {
        Some((kind, len)) if len > 0 => (kind, len),
        _ => (TokenKind::Invalid, match_invalid(rest)),
    }
}

fn match_comment(rest: &str) -> Option<usize> {
    if !rest.starts_with("//") {
        return None;
    }
    let len = memchr::memchr(b'\n', rest.as_bytes()).unwrap_or(rest.len());
    Some(len)
}

fn match_number(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut len = 0usize;

    let int_digits = digit_run(bytes);
    if int_digits > 0 {
        len = int_digits;
        if bytes.get(len) == Some(&b'.') && digit_run(&bytes[len + 1..]) > 0 {
            len += 1 + digit_run(&bytes[len + 1..]);
        }
    } else if bytes.first() == Some(&b'.') && digit_run(&bytes[1..]) > 0 {
        len = 1 + digit_run(&bytes[1..]);
    } else {
        return None;
    }

    if let Some(exp_len) = match_exponent(&bytes[len..]) {
        len += exp_len;
    }
    Some(len)
}

fn digit_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn match_exponent(bytes: &[u8]) -> Option<usize> {
    if !matches!(bytes.first(), Some(b'e' | b'E')) {
        return None;
    }
    let mut i = 1;
    if matches!(bytes.get(i), Some(b'+' | b'-')) {
        i += 1;
    }
    let digits = digit_run(&bytes[i..]);
    if digits == 0 {
        return None;
    }
    Some(i + digits)
}

/// Longest [`PUNCTUATION`] spelling that prefixes `rest`.
fn match_punct(rest: &str) -> Option<usize> {
    PUNCTUATION.iter().filter(|p| rest.starts_with(**p)).map(|p| p.len()).max()
}

fn match_id(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let mut end = first.len_utf8();
    for (i, ch) in chars {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            end = i + ch.len_utf8();
        } else {
            break;
        }
    }
    Some(end)
}

/// `"…"` with `\` as an escape character. An input that runs off the end of
/// source before the closing quote still yields a token spanning to `eof`
/// rather than no match at all, so the lexer always makes progress.
fn match_string(rest: &str) -> Option<usize> {
    if !rest.starts_with('"') {
        return None;
    }
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    Some(bytes.len())
}

fn match_prime(rest: &str) -> Option<usize> {
    let len = rest.bytes().take_while(|&b| b == b'\'').count();
    (len > 0).then_some(len)
}

/// A literal `;`, or a run of whitespace containing two or more newlines.
fn match_semi(rest: &str) -> Option<usize> {
    if rest.starts_with(';') {
        return Some(1);
    }
    let len = whitespace_run(rest);
    if rest[..len].bytes().filter(|&b| b == b'\n').count() >= 2 {
        Some(len)
    } else {
        None
    }
}

fn match_space(rest: &str) -> Option<usize> {
    let len = whitespace_run(rest);
    (len > 0).then_some(len)
}

fn whitespace_run(rest: &str) -> usize {
    rest.bytes().take_while(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')).count()
}

fn match_invalid(rest: &str) -> usize {
    rest.chars().next().map(char::len_utf8).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    fn lexemes(source: &str) -> Vec<String> {
        tokenize(source).into_iter().map(|t| t.lexeme.to_string()).collect()
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            kinds("y=x"),
            vec![TokenKind::Id, TokenKind::Punct, TokenKind::Id, TokenKind::Eof]
        );
        assert_eq!(lexemes("y=x"), vec!["y", "=", "x", ""]);
    }

    #[test]
    fn multi_char_punct_beats_its_prefix() {
        assert_eq!(lexemes("a<=b"), vec!["a", "<=", "b", ""]);
        assert_eq!(lexemes("a->b"), vec!["a", "->", "b", ""]);
        assert_eq!(lexemes("[1...5]"), vec!["[", "1", "...", "5", "]", ""]);
    }

    #[test]
    fn derivative_punct_before_id_prefix() {
        assert_eq!(lexemes("d/d x(f)"), vec!["d/d", " ", "x", "(", "f", ")", ""]);
    }

    #[test]
    fn style_and_regression_open_tokens() {
        assert_eq!(kinds("@{")[0], TokenKind::Punct);
        assert_eq!(kinds("#{")[0], TokenKind::Punct);
        assert_eq!(lexemes("@{")[0], "@{");
        assert_eq!(lexemes("#{")[0], "#{");
    }

    #[test]
    fn keyword_promotion() {
        assert_eq!(kinds("table"), vec![TokenKind::Keyword, TokenKind::Eof]);
        assert_eq!(kinds("tablet"), vec![TokenKind::Id, TokenKind::Eof]);
    }

    #[test]
    fn number_forms() {
        assert_eq!(lexemes("3"), vec!["3", ""]);
        assert_eq!(lexemes("3.14"), vec!["3.14", ""]);
        assert_eq!(lexemes(".5"), vec![".5", ""]);
        assert_eq!(lexemes("1e10"), vec!["1e10", ""]);
        assert_eq!(lexemes("1.5e-3"), vec!["1.5e-3", ""]);
        // No digits after 'e': the exponent suffix is not consumed.
        assert_eq!(lexemes("1e"), vec!["1", "e", ""]);
    }

    #[test]
    fn string_literal_with_escapes() {
        let toks = tokenize(r#""a\"b""#);
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].lexeme.as_ref(), r#""a\"b""#);
    }

    #[test]
    fn unterminated_string_runs_to_eof() {
        let toks = tokenize(r#""abc"#);
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].lexeme.as_ref(), r#""abc"#);
        assert_eq!(toks[1].kind, TokenKind::Eof);
    }

    #[test]
    fn single_quote_ties_toward_punct_multiple_ties_toward_prime() {
        assert_eq!(kinds("f'(x)")[1], TokenKind::Punct);
        assert_eq!(kinds("f''(x)")[1], TokenKind::Prime);
        assert_eq!(lexemes("f''(x)")[1], "''");
    }

    #[test]
    fn comment_runs_to_newline_exclusive() {
        let toks = tokenize("// hi\ny");
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].lexeme.as_ref(), "// hi");
    }

    #[test]
    fn blank_line_run_is_semi_single_newline_is_space() {
        assert_eq!(kinds("a\n\n\nb"), vec![TokenKind::Id, TokenKind::Semi, TokenKind::Id, TokenKind::Eof]);
        assert_eq!(kinds("a\nb"), vec![TokenKind::Id, TokenKind::Space, TokenKind::Id, TokenKind::Eof]);
    }

    #[test]
    fn literal_semicolon_and_runs_absorb() {
        assert_eq!(
            kinds("foo; ;; bar=1"),
            vec![
                TokenKind::Id,
                TokenKind::Semi,
                TokenKind::Space,
                TokenKind::Semi,
                TokenKind::Semi,
                TokenKind::Space,
                TokenKind::Id,
                TokenKind::Punct,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn invalid_character_is_its_own_token() {
        let toks = tokenize("a$b");
        assert_eq!(toks[1].kind, TokenKind::Invalid);
        assert_eq!(toks[1].lexeme.as_ref(), "$");
    }

    #[test]
    fn empty_source_yields_only_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn eof_offset_tracks_line_and_column() {
        let toks = tokenize("ab\ncd");
        let eof = toks.last().unwrap();
        assert_eq!(eof.offset, 5);
        assert_eq!(eof.line, 2);
        assert_eq!(eof.column, 3);
    }
}
