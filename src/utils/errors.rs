//! Error types for the loop transformation framework.
//!
//! Errors are organized by the phase that produces them. None of them is
//! user facing: a failing nest is left untouched and the reason is
//! recorded as a [`Diagnostic`].

use crate::chrec::LoopId;
use std::fmt;
use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum LambdaError {
    /// The loop nest could not be turned into a lambda loopnest
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// The transform could not be applied
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// The transformed nest could not be lowered back to loops
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error during loopnest extraction.
#[derive(Error, Debug, Clone)]
pub struct ExtractError {
    /// The error message
    pub message: String,
    /// The kind of extraction error
    pub kind: ExtractErrorKind,
    /// The loop being extracted (if known)
    pub loop_id: Option<LoopId>,
}

impl ExtractError {
    pub fn new(kind: ExtractErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind, loop_id: None }
    }

    pub fn in_loop(mut self, loop_id: LoopId) -> Self {
        self.loop_id = Some(loop_id);
        self
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loop_id {
            Some(id) => write!(f, "{} in loop {}", self.message, id),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// Loop has no exit test
    NoExitTest,
    /// No header PHI feeds the exit test
    NoInductionVariable,
    /// Induction PHI does not have one entry and one latch argument
    PhiArity,
    /// Scalar evolution could not resolve the induction variable
    UnknownEvolution,
    /// Step is symbolic
    NonConstantStep,
    /// Step is zero
    ZeroStep,
    /// Bound is not a linear expression of outer loops and invariants
    NonAffineBound,
    /// Comparison direction disagrees with the step sign
    InconsistentExitTest,
    /// A loop body holds more than one inner loop
    MultipleInnerLoops,
    /// Statements occur outside the innermost body
    ImperfectNest,
    /// Exit block merges more than one value
    ComplexExitPhi,
}

/// Error during transformation.
#[derive(Error, Debug, Clone)]
pub struct TransformError {
    /// The error message
    pub message: String,
    /// The kind of transformation error
    pub kind: TransformErrorKind,
}

impl TransformError {
    pub fn new(kind: TransformErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// The pass is disabled by configuration
    Disabled,
    /// Matrix and nest depth disagree
    DimensionMismatch,
    /// The transform is not invertible
    Singular,
    /// Transformation would violate dependences
    Illegal,
    /// Nothing to do
    Identity,
}

/// Error during code generation.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// A loop has no bound expression on one side
    BoundGeneration,
    /// The rewritten nest does not match the extracted one
    NestMismatch,
}

/// A diagnostic message with severity level.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Message
    pub message: String,
    /// Outermost loop of the nest concerned
    pub loop_id: Option<LoopId>,
    /// Additional notes
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// The nest was left untouched
    Warning,
    /// Informational message
    Note,
}

impl Diagnostic {
    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            loop_id: None,
            notes: Vec::new(),
        }
    }

    /// Create a new note.
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Note,
            message: message.into(),
            loop_id: None,
            notes: Vec::new(),
        }
    }

    /// Attach the loop the diagnostic is about.
    pub fn with_loop(mut self, loop_id: LoopId) -> Self {
        self.loop_id = Some(loop_id);
        self
    }

    /// Add a note to the diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Note => "note",
        };
        write!(f, "{}: {}", tag, self.message)?;
        if let Some(id) = self.loop_id {
            write!(f, " (loop {})", id)?;
        }
        for note in &self.notes {
            write!(f, "\n  = {}", note)?;
        }
        Ok(())
    }
}

/// Result type using LambdaError.
pub type LambdaResult<T> = Result<T, LambdaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtractError::new(ExtractErrorKind::NonConstantStep, "step is not constant").in_loop(2);
        let s = format!("{}", LambdaError::from(err));
        assert!(s.contains("step is not constant"));
        assert!(s.contains("loop 2"));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warning("won't transform").with_loop(1).with_note("identity");
        let s = d.to_string();
        assert!(s.starts_with("warning: won't transform (loop 1)"));
        assert!(s.contains("= identity"));
    }
}
