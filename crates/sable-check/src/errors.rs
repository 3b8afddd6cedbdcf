//! Diagnostics: the error taxonomy, the sink, and probe scopes.
//!
//! Speculative checks (overload candidates, polymorph trials, constraint
//! clauses) run inside a probe scope. Diagnostics raised during a probe are
//! buffered; a failed probe discards exactly those, never the committed set.

use sable_ast::Span;
use thiserror::Error;

/// Type checking error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckError {
    #[error("Type mismatch: expected '{expected}', found '{found}'")]
    Mismatch { expected: String, found: String },

    #[error("Cannot assign value of type '{found}' to a '{expected}'")]
    AssignMismatch { expected: String, found: String },

    #[error("Expected expression of type 'bool' for condition, got '{found}'")]
    ConditionNotBool { found: String },

    #[error("Binary operator '{op}' not understood for arguments of type '{left}' and '{right}'")]
    BadBinaryOp {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("Cannot compare '{left}' to '{right}'")]
    BadComparison { left: String, right: String },

    #[error("Assignment not valid in expression")]
    AssignmentInExpression,

    #[error("Cannot assign to '{0}'")]
    NotLValue(String),

    #[error("Cannot assign to constant '{0}'")]
    AssignToConstant(String),

    #[error("Cannot take the address of something that is not an l-value ({0})")]
    NotAddressable(&'static str),

    #[error("Cannot dereference non-pointer value")]
    DerefNonPointer,

    #[error("Cannot dereference 'rawptr'. Cast to another pointer type first")]
    DerefRawptr,

    #[error("Cannot operate on a 'rawptr'. Cast it to another pointer type first")]
    RawptrArithmetic,

    #[error("Attempting to call something that is not a function, '{0}'")]
    NotCallable(String),

    #[error("Not all arguments were given a value")]
    MissingArguments,

    #[error("Intrinsic not supported, '{0}'")]
    UnknownIntrinsic(String),

    #[error("Field '{field}' does not exist on '{ty}'{}", .suggestion.as_ref().map(|s| format!(". Did you mean '{s}'?")).unwrap_or_default())]
    UndefinedField {
        field: String,
        ty: String,
        suggestion: Option<String>,
    },

    #[error("Cannot access field '{field}' on '{ty}'. Type is not a struct")]
    FieldOnNonStruct { field: String, ty: String },

    #[error("Multiple cases for values '{0}'")]
    DuplicateCase(i64),

    #[error("Multiple default cases given")]
    DuplicateDefault,

    #[error("Cannot iterate over a '{0}'")]
    BadIterable(String),

    #[error("Cannot iterate by pointer over {0}")]
    BadPointerIteration(&'static str),

    #[error("Returning from non-void function without a value. Expected a value of type '{0}'")]
    MissingReturnValue(String),

    #[error("Expected to return a value of type '{expected}', returning value of type '{found}'")]
    ReturnMismatch { expected: String, found: String },

    #[error("Cannot return a pointer to a literal, as the space reserved for the literal will be freed upon returning")]
    ReturnAddressOfLiteral,

    #[error("Expected this condition to be compile time known")]
    ConditionNotComptime,

    #[error("Top level expressions must be compile time known")]
    NotComptime,

    #[error("Tag expressions are expected to be compile-time known")]
    TagNotComptime,

    #[error("Failed to satisfy constraint where {0}")]
    ConstraintFailed(String),

    #[error("Error solving for polymorphic variable '{0}'")]
    PolymorphSolveFailed(String),

    #[error("Waiting on {0}")]
    WaitingOn(String),

    #[error("Cast error: {0}")]
    BadCast(String),

    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub error: CheckError,
}

/// Marker returned by [`DiagnosticSink::begin_probe`]; passing it back to
/// `end_probe` closes that scope.
#[derive(Debug, Clone, Copy)]
pub struct ProbeMark(usize);

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    probe_starts: Vec<usize>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, span: Span, error: CheckError) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            span,
            error,
        });
    }

    pub fn warning(&mut self, span: Span, error: CheckError) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            span,
            error,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Open a probe scope. Diagnostics raised until the matching
    /// `end_probe` are speculative.
    pub fn begin_probe(&mut self) -> ProbeMark {
        self.probe_starts.push(self.diagnostics.len());
        ProbeMark(self.probe_starts.len() - 1)
    }

    /// Close a probe scope. When `keep` is false every diagnostic raised
    /// inside the scope is discarded.
    pub fn end_probe(&mut self, mark: ProbeMark, keep: bool) {
        debug_assert_eq!(mark.0 + 1, self.probe_starts.len(), "probe scopes must nest");
        let start = self.probe_starts.pop().unwrap_or(0);
        if !keep {
            self.diagnostics.truncate(start);
        }
    }

    pub fn probing(&self) -> bool {
        !self.probe_starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_probe_discards_only_its_diagnostics() {
        let mut sink = DiagnosticSink::new();
        sink.error(Span::default(), CheckError::NotComptime);

        let mark = sink.begin_probe();
        sink.error(Span::default(), CheckError::DerefRawptr);
        sink.error(Span::default(), CheckError::DerefNonPointer);
        sink.end_probe(mark, false);

        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.diagnostics()[0].error, CheckError::NotComptime);
    }

    #[test]
    fn successful_probe_keeps_diagnostics() {
        let mut sink = DiagnosticSink::new();
        let mark = sink.begin_probe();
        sink.error(Span::default(), CheckError::DerefRawptr);
        sink.end_probe(mark, true);
        assert!(sink.has_errors());
    }

    #[test]
    fn nested_probes() {
        let mut sink = DiagnosticSink::new();
        let outer = sink.begin_probe();
        sink.error(Span::default(), CheckError::NotComptime);
        let inner = sink.begin_probe();
        sink.error(Span::default(), CheckError::DerefRawptr);
        sink.end_probe(inner, false);
        sink.end_probe(outer, true);

        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.diagnostics()[0].error, CheckError::NotComptime);
    }
}
