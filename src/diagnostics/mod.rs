//! Diagnostics reported by every stage of the validation pipeline.
//!
//! No stage aborts on a bad entity. Problems are collected as [`Diagnostic`]
//! values carrying a severity, a stable [`Code`], a message and the document
//! [`Location`] they refer to, so a single pass reports as many independent
//! problems as possible.

mod location;

pub use location::{Location, Segment};

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::yaml::Position;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks normalization.
    Error,
    /// Reported, never blocks normalization.
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

/// Kind of problem a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    SyntaxError,
    MissingRequiredField,
    TypeMismatch,
    UnknownField,
    DuplicateName,
    DanglingRelationshipReference,
    PossibleSelfReference,
    EmptyModel,
    UnbalancedExpression,
    NonAggregateMetric,
    InvalidSqlExpression,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::SyntaxError => "SYNTAX_ERROR",
            Code::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Code::TypeMismatch => "TYPE_MISMATCH",
            Code::UnknownField => "UNKNOWN_FIELD",
            Code::DuplicateName => "DUPLICATE_NAME",
            Code::DanglingRelationshipReference => "DANGLING_RELATIONSHIP_REFERENCE",
            Code::PossibleSelfReference => "POSSIBLE_SELF_REFERENCE",
            Code::EmptyModel => "EMPTY_MODEL",
            Code::UnbalancedExpression => "UNBALANCED_EXPRESSION",
            Code::NonAggregateMetric => "NON_AGGREGATE_METRIC",
            Code::InvalidSqlExpression => "INVALID_SQL_EXPRESSION",
        }
    }

    /// Severity a diagnostic of this code gets unless a rule overrides it.
    pub fn default_severity(self) -> Severity {
        match self {
            Code::UnknownField
            | Code::PossibleSelfReference
            | Code::EmptyModel
            | Code::InvalidSqlExpression => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic message with its document location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub message: String,
    pub location: Location,
    /// Source position, when the node exists in the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Suggested fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity.
    pub fn new(code: Code, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
            location,
            position: None,
            suggestion: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(code: Code, location: Location, message: impl Into<String>) -> Self {
        Self::new(code, location, message).with_severity(Severity::Error)
    }

    /// Create a warning diagnostic.
    pub fn warning(code: Code, location: Location, message: impl Into<String>) -> Self {
        Self::new(code, location, message).with_severity(Severity::Warning)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_position(mut self, position: impl Into<Option<Position>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Report ordering: location, then severity, then code, then message.
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.location
            .cmp(&other.location)
            .then(self.severity.cmp(&other.severity))
            .then(self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} (at {}",
            self.severity, self.code, self.message, self.location
        )?;
        if let Some(pos) = &self.position {
            write!(f, ", line {}:{}", pos.line, pos.column)?;
        }
        write!(f, ")")?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "; {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Sort diagnostics into report order.
pub fn sort(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.report_order(b));
}

/// Returns true if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Closest candidate within edit distance 2, for "did you mean" hints.
pub(crate) fn closest_match<'a>(
    needle: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (edit_distance(needle, c), c))
        .filter(|(d, _)| *d <= 2)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, c)| c)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b_chars.len() + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        prev = row;
    }
    prev[b_chars.len()]
}
