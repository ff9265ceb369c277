//! Diagnostic records and the statement-level recovery signal for the
//! graphlang parser.
//!
//! A parse never aborts on the first error. Instead, a fatal problem is
//! recorded as a [`Diagnostic`] and reported to its caller as `Err(Fatal)`.
//! `Fatal` carries no payload of its own — the diagnostic already describes
//! what went wrong — and is expected to unwind only as far as the
//! statement loop, which resynchronizes on the next statement boundary and
//! keeps going. See [`ParseBudget`] for the bound that keeps a pathological
//! input from turning that loop into an unbounded one.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use graphlang_position::Pos;
use std::fmt;
use thiserror::Error;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    /// A problem that stopped the current statement from parsing fully.
    Error,
    /// A non-fatal observation (currently only the empty-program notice).
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic emitted while parsing.
///
/// Compatible with the `{from, to, severity, message}` shape an editor
/// integration expects; `span` is `None` only for the handful of
/// diagnostics that have no sensible source location (there are none in
/// the current grammar, but the type keeps that option open).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Byte span the diagnostic refers to, if any.
    pub span: Option<Pos>,
}

impl Diagnostic {
    /// Construct an error diagnostic.
    pub fn error(message: impl Into<String>, span: impl Into<Option<Pos>>) -> Self {
        Diagnostic { severity: Severity::Error, message: message.into(), span: span.into() }
    }

    /// Construct a warning diagnostic.
    pub fn warning(message: impl Into<String>, span: impl Into<Option<Pos>>) -> Self {
        Diagnostic { severity: Severity::Warning, message: message.into(), span: span.into() }
    }
}

/// Append-only ordered sink of diagnostics for a single parse.
///
/// A fresh `Diagnostics` is created per call to `parse` and owned
/// exclusively by that call's `ParserState`; nothing about it is shared
/// or reused across parses.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty diagnostics buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error diagnostic. Does not itself signal a fatal abort —
    /// callers that need to unwind to the statement boundary should use
    /// [`Diagnostics::fatal`] instead.
    pub fn push_error(&mut self, message: impl Into<String>, span: impl Into<Option<Pos>>) {
        self.records.push(Diagnostic::error(message, span));
    }

    /// Record a warning diagnostic.
    pub fn push_warning(&mut self, message: impl Into<String>, span: impl Into<Option<Pos>>) {
        self.records.push(Diagnostic::warning(message, span));
    }

    /// Record an error diagnostic and return the [`Fatal`] signal the
    /// caller should propagate with `?` to abort the current statement.
    pub fn fatal<T>(&mut self, message: impl Into<String>, span: impl Into<Option<Pos>>) -> PResult<T> {
        self.push_error(message, span);
        Err(Fatal)
    }

    /// All diagnostics recorded so far, in emission order.
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Consume the buffer, returning its diagnostics in emission order.
    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }

    /// True if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of diagnostics recorded so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Statement-local abort signal.
///
/// A fatal parse error (unexpected `eof`, an unparseable leading token, a
/// structural violation such as a non-identifier call callee) is reported
/// by recording a [`Diagnostic`] and returning `Err(Fatal)`. The only
/// place that is allowed to catch it is the statement loop: it calls
/// `ParserState::scan_to_next_statement` and resumes with the next
/// statement. `Fatal` must never escape `parse`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("fatal parse error (see diagnostics)")]
pub struct Fatal;

/// Result alias used throughout the parser for statement-local fallibility.
pub type PResult<T> = Result<T, Fatal>;

/// Resource bounds for a single parse, defending against pathological
/// input (deeply right-nested parens, an unbroken run of `,` operators)
/// rather than against anything the grammar itself considers invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseBudget {
    /// Maximum Pratt-recursion depth before the parser gives up on the
    /// current statement instead of overflowing the stack.
    pub max_depth: usize,
}

impl Default for ParseBudget {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

/// RAII guard that increments a shared depth counter on construction and
/// decrements it on drop, so an early `?` return can never leave the
/// counter out of sync with the call stack it is meant to track.
pub struct DepthGuard<'a> {
    depth: &'a mut usize,
}

impl<'a> DepthGuard<'a> {
    /// Enter one more level of recursion, failing if `budget.max_depth`
    /// would be exceeded.
    pub fn enter(depth: &'a mut usize, budget: &ParseBudget) -> Option<Self> {
        if *depth >= budget.max_depth {
            return None;
        }
        *depth += 1;
        Some(DepthGuard { depth })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        *self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_pushes_diagnostic_and_returns_err() {
        let mut diags = Diagnostics::new();
        let result: PResult<()> = diags.fatal("boom", Pos::new(0, 1));
        assert!(result.is_err());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.records()[0].severity, Severity::Error);
    }

    #[test]
    fn diagnostics_preserve_emission_order() {
        let mut diags = Diagnostics::new();
        diags.push_error("first", None);
        diags.push_warning("second", None);
        diags.push_error("third", None);
        let messages: Vec<_> = diags.records().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    fn recurse(depth: &mut usize, budget: &ParseBudget, levels_left: usize) -> usize {
        let Some(_guard) = DepthGuard::enter(depth, budget) else {
            return *depth;
        };
        if levels_left == 0 { *depth } else { recurse(depth, budget, levels_left - 1) }
    }

    #[test]
    fn depth_guard_refuses_past_budget() {
        let budget = ParseBudget { max_depth: 2 };
        let mut depth = 0usize;
        let reached = recurse(&mut depth, &budget, 10);
        assert_eq!(reached, 2);
    }

    #[test]
    fn depth_guard_decrements_on_drop() {
        let budget = ParseBudget::default();
        let mut depth = 0usize;
        {
            let _g = DepthGuard::enter(&mut depth, &budget);
            assert_eq!(depth, 1);
        }
        assert_eq!(depth, 0);
    }
}
