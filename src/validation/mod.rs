//! Validation of semantic models.
//!
//! Aggregates the diagnostics of every earlier stage, adds the document-wide
//! rules and puts the result into report order.

use serde::Serialize;

use crate::diagnostics::{self, Code, Diagnostic, Location, Severity};
use crate::model::SemanticModel;

/// Outcome of validating a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// False iff any error-severity diagnostic exists.
    pub ok: bool,
    /// All diagnostics, in report order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns only the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Returns only the warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Returns true if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }
}

/// Validate mapped and resolved models, given the diagnostics so far.
pub fn validate(models: &[SemanticModel], mut diagnostics: Vec<Diagnostic>) -> ValidationResult {
    validate_not_empty(models, &mut diagnostics);

    diagnostics::sort(&mut diagnostics);
    let ok = !diagnostics::has_errors(&diagnostics);
    tracing::debug!(ok, diagnostics = diagnostics.len(), "validated document");
    ValidationResult { ok, diagnostics }
}

/// Every document needs a model and every model a dataset.
fn validate_not_empty(models: &[SemanticModel], diagnostics: &mut Vec<Diagnostic>) {
    if models.is_empty() {
        let root = Location::root();
        let list = root.key("semantic_model");
        // A broken or missing root has been reported already.
        let reported = diagnostics
            .iter()
            .any(|d| d.location == root || d.location == list);
        if !reported {
            diagnostics.push(Diagnostic::new(
                Code::EmptyModel,
                list,
                "document defines no semantic models",
            ));
        }
    }

    for model in models {
        if model.datasets.is_empty() {
            diagnostics.push(
                Diagnostic::new(
                    Code::EmptyModel,
                    model.origin.field_location("logical_datasets"),
                    format!("semantic model `{}` has no logical datasets", model.name),
                )
                .with_position(model.origin.field_position("logical_datasets")),
            );
        }
    }
}
