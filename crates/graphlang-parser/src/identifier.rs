//! Implicit-subscript identifier normalization.
//!
//! Source identifiers are split on a single `_` to decide whether the
//! author meant a literal name (`sin`, `else`) or a subscript (`x1` read as
//! `x_1`, `v_max` kept as-is). The rules below implement that split; the
//! set of names that must never be subscripted is supplied by the caller
//! (auto-operator and auto-command names live outside this crate, plus a
//! handful of names fixed by the grammar itself).

use graphlang_diagnostics::PResult;
use graphlang_position::Pos;
use phf::phf_set;
use std::collections::HashSet;

/// Built-in names whose subscript-unfriendly spelling (mixed case, a
/// trailing digit run that isn't a subscript) would otherwise trip the
/// single-part implicit-subscript rule.
pub static FRAGILE_BUILTINS: phf::Set<&'static str> =
    phf_set! { "polyGamma", "argmin", "argmax", "uniquePerm", "rtxsqpone", "rtxsqmone", "hypot" };

/// Names reserved by the grammar itself that are never subscripted.
pub static FIXED_RESERVED: phf::Set<&'static str> = phf_set! { "index", "dt", "else", "true", "false" };

/// Builds the non-subscripting set for one parse: the union of the
/// externally supplied auto-operator/auto-command names with the fixed
/// names above. Computed once per call to [`crate::parse`] and threaded
/// through by reference rather than kept as global state, since which
/// names are "built-in" depends on the host application's math engine.
pub fn build_non_subscripting_set<I, S>(auto_operator_names: I, auto_command_names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: HashSet<String> = HashSet::new();
    set.extend(auto_operator_names.into_iter().map(Into::into));
    set.extend(auto_command_names.into_iter().map(Into::into));
    set.extend(FRAGILE_BUILTINS.iter().map(|s| (*s).to_string()));
    set.extend(FIXED_RESERVED.iter().map(|s| (*s).to_string()));
    set
}

/// Normalizes a raw identifier lexeme per the implicit-subscript rules.
///
/// Splitting on more than one `_` is recoverable: the diagnostic is
/// recorded but parsing continues with the name `error`. A two-part name
/// with an empty subscript or a digit before the `_` is a structural
/// violation and aborts the current statement, matching the other shape
/// violations (bad callee, bad piecewise condition, ...) this parser treats
/// as fatal.
pub(crate) fn normalize(
    lexeme: &str,
    non_subscripting: &HashSet<String>,
    state: &mut crate::state::ParserState,
    span: Option<Pos>,
) -> PResult<String> {
    let parts: Vec<&str> = lexeme.split('_').collect();
    match parts.as_slice() {
        [_, _, _, ..] => {
            state.push_error(format!("'{lexeme}' has more than one '_'; treating it as 'error'."), span);
            Ok("error".to_string())
        }
        [part] => {
            if part.chars().count() == 1 || non_subscripting.contains(*part) {
                return Ok((*part).to_string());
            }
            let mut chars = part.chars();
            let first = chars.next().unwrap_or_default();
            Ok(format!("{first}_{}", chars.as_str()))
        }
        [main, sub] => {
            if sub.is_empty() {
                return state.fatal(format!("Identifier '{lexeme}' cannot end with '_'."), span);
            }
            if main.chars().any(|c| c.is_ascii_digit()) {
                return state.fatal(format!("Digits are not allowed before '_' in '{lexeme}'."), span);
            }
            Ok(format!("{main}_{sub}"))
        }
        [] => unreachable!("str::split always yields at least one part"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ParserState;

    fn state() -> ParserState {
        ParserState::new(vec![graphlang_token::Token::eof_at(0, 1, 1)], HashSet::new())
    }

    fn set() -> HashSet<String> {
        build_non_subscripting_set::<_, String>(["sin"], [])
    }

    #[test]
    fn single_char_is_unchanged() {
        let mut st = state();
        assert_eq!(normalize("x", &set(), &mut st, None).unwrap(), "x");
    }

    #[test]
    fn multi_char_single_part_gets_implicit_subscript() {
        let mut st = state();
        assert_eq!(normalize("xyz", &set(), &mut st, None).unwrap(), "x_yz");
    }

    #[test]
    fn non_subscripting_member_is_unchanged() {
        let mut st = state();
        assert_eq!(normalize("sin", &set(), &mut st, None).unwrap(), "sin");
    }

    #[test]
    fn two_part_name_passes_through() {
        let mut st = state();
        assert_eq!(normalize("sin_2", &set(), &mut st, None).unwrap(), "sin_2");
        assert_eq!(normalize("v_max", &set(), &mut st, None).unwrap(), "v_max");
    }

    #[test]
    fn three_parts_substitutes_error_but_recovers() {
        let mut st = state();
        assert_eq!(normalize("a_b_c", &set(), &mut st, None).unwrap(), "error");
    }

    #[test]
    fn trailing_underscore_is_fatal() {
        let mut st = state();
        assert!(normalize("ab_", &set(), &mut st, None).is_err());
    }

    #[test]
    fn digit_before_underscore_is_fatal() {
        let mut st = state();
        assert!(normalize("a1_b", &set(), &mut st, None).is_err());
    }
}
