//! End-to-end validation of one document.
//!
//! ```text
//! Source → Parse → Tree → Map → Models → Resolve → Validate → Normalize
//! ```
//!
//! Every stage runs even when an earlier one reported problems, so a single
//! pass reports as many independent problems as possible. The canonical
//! model is produced only when no error remains.
//!
//! # Example
//!
//! ```
//! use osi::config::Settings;
//! use osi::pipeline::validate_source;
//!
//! let source = r#"
//! semantic_model:
//!   - name: sales
//!     logical_datasets:
//!       - name: orders
//!         base_table: warehouse.orders
//!         metrics:
//!           - name: total_revenue
//!             expr: SUM(amount)
//! "#;
//!
//! let report = validate_source(source, &Settings::default());
//! assert!(report.ok());
//! let canonical = report.canonical.unwrap();
//! assert_eq!(canonical.semantic_model[0].logical_datasets[0].metrics[0].name, "total_revenue");
//! ```

use serde::Serialize;

use crate::config::Settings;
use crate::expr::AggregateRule;
use crate::normalize::{self, CanonicalModel};
use crate::validation::{self, ValidationResult};
use crate::{mapper, resolver, yaml};

/// Validation outcome of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub result: ValidationResult,
    /// Present iff validation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<CanonicalModel>,
}

impl Report {
    /// Returns true if the document has no errors.
    pub fn ok(&self) -> bool {
        self.result.ok
    }
}

/// Validate a document with the configured rules.
pub fn validate_source(source: &str, settings: &Settings) -> Report {
    let rule = settings.rules.aggregate_rule();
    validate_source_with(source, settings, &rule)
}

/// Validate a document with a custom aggregate rule.
pub fn validate_source_with(
    source: &str,
    settings: &Settings,
    aggregate: &dyn AggregateRule,
) -> Report {
    // Step 1: Structure
    let parsed = yaml::parse(source);
    let mut diagnostics = parsed.diagnostics;

    // Step 2: Schema
    let mapped = mapper::map(parsed.tree.as_ref());
    diagnostics.extend(mapped.diagnostics);
    let mut models = mapped.models;

    // Step 3: References and expressions
    diagnostics.extend(resolver::resolve_with(&mut models, &settings.rules, aggregate));

    // Step 4: Global rules and ordering
    let result = validation::validate(&models, diagnostics);

    // Step 5: Canonical form
    let canonical = if result.ok {
        match normalize::normalize(&models, &result) {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                tracing::warn!(error = %e, "validated document could not be normalized");
                None
            }
        }
    } else {
        None
    };

    Report { result, canonical }
}
