//! Decoding of number and string literal lexemes into their runtime values.

/// Parses a number lexeme (already validated by the lexer's `number` rule)
/// into an `f64`. The lexer only ever hands this a well-formed digit run,
/// so a parse failure here would mean the two disagree about the grammar;
/// falling back to `NAN` keeps that disagreement from becoming a panic.
pub(crate) fn decode_number(lexeme: &str) -> f64 {
    lexeme.parse::<f64>().unwrap_or(f64::NAN)
}

/// Decodes a string lexeme (quotes included) using JSON string escape
/// semantics: `\n`, `\t`, `\"`, `\\`, `\uXXXX`, and so on.
pub(crate) fn decode_string(lexeme: &str) -> String {
    serde_json::from_str::<String>(lexeme).unwrap_or_else(|_| lexeme.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_number() {
        assert_eq!(decode_number("3.14"), 3.14);
    }

    #[test]
    fn decodes_escaped_string() {
        assert_eq!(decode_string(r#""a\nb""#), "a\nb");
    }

    #[test]
    fn unterminated_string_falls_back_to_raw_contents() {
        assert_eq!(decode_string(r#""abc"#), "abc");
    }
}
