//! Cross-reference resolution.
//!
//! Links relationship endpoints to datasets, detects duplicate names and
//! runs the expression heuristics. Resolution mutates only the endpoint
//! links; everything else is reported as diagnostics in document order.
//!
//! Name scopes:
//!
//! - semantic models within the document
//! - datasets, model-level metrics and named relationships within a model
//! - dimensions, metrics, facts, filters and fields within a dataset (one
//!   shared namespace)
//!
//! In every scope the first occurrence wins; each later occurrence gets its
//! own `DUPLICATE_NAME`.
//!
//! An expression written as a dialect list is checked entry by entry, each
//! in its own dialect. Unknown dialect names are checked as ANSI SQL; MDX and
//! Tableau text only gets the balance check.

use std::collections::HashMap;

use crate::config::RuleSettings;
use crate::diagnostics::{closest_match, Code, Diagnostic, Location};
use crate::expr::{self, AggregateRule, SqlDialect};
use crate::model::{
    DatasetId, DatasetRef, Field, FieldKind, LogicalDataset, Origin, Relationship, SemanticModel,
};
use crate::yaml::Position;

/// Resolve references using the aggregate rule configured in `settings`.
pub fn resolve(models: &mut [SemanticModel], settings: &RuleSettings) -> Vec<Diagnostic> {
    let rule = settings.aggregate_rule();
    resolve_with(models, settings, &rule)
}

/// Resolve references with a custom aggregate rule.
pub fn resolve_with(
    models: &mut [SemanticModel],
    settings: &RuleSettings,
    aggregate: &dyn AggregateRule,
) -> Vec<Diagnostic> {
    let dialect = match settings.dialect() {
        Ok(dialect) => dialect,
        Err(error) => {
            tracing::warn!(%error, "SQL expression check skipped for an unknown dialect");
            None
        }
    };
    if let Some(dialect) = dialect.filter(|d| !d.is_sql()) {
        tracing::warn!(%dialect, "SQL expression check skipped for a non-SQL dialect");
    }
    let mut resolver = Resolver {
        settings,
        aggregate,
        dialect,
        diagnostics: Vec::new(),
    };

    resolver.check_duplicates(
        models.iter().map(|m| (m.name.as_str(), &m.origin)),
        "semantic model",
        "the document",
    );
    for model in models.iter_mut() {
        resolver.resolve_model(model);
    }

    tracing::debug!(
        models = models.len(),
        diagnostics = resolver.diagnostics.len(),
        "resolved references"
    );
    resolver.diagnostics
}

struct Resolver<'a> {
    settings: &'a RuleSettings,
    aggregate: &'a dyn AggregateRule,
    dialect: Option<SqlDialect>,
    diagnostics: Vec<Diagnostic>,
}

/// One expression text of an entity and where it was written.
struct Variant<'f> {
    text: &'f str,
    location: Location,
    position: Option<Position>,
    /// False for MDX and Tableau text.
    sql: bool,
    /// Dialect for the SQL syntax check, `None` when the check is off.
    check: Option<SqlDialect>,
}

fn at_line(position: Option<Position>) -> String {
    match position {
        Some(p) => format!(" at line {}", p.line),
        None => String::new(),
    }
}

impl<'a> Resolver<'a> {
    /// Report second and later occurrences of each name. Items must be in
    /// document order; empty names were already reported by the mapper.
    fn check_duplicates<'n>(
        &mut self,
        items: impl IntoIterator<Item = (&'n str, &'n Origin)>,
        what: &str,
        scope: &str,
    ) {
        let mut first: HashMap<&str, &Origin> = HashMap::new();
        for (name, origin) in items {
            if name.trim().is_empty() {
                continue;
            }
            match first.get(name) {
                Some(original) => self.diagnostics.push(
                    Diagnostic::new(
                        Code::DuplicateName,
                        origin.field_location("name"),
                        format!(
                            "duplicate {} name `{}` in {}; first defined{}",
                            what,
                            name,
                            scope,
                            at_line(original.field_position("name"))
                        ),
                    )
                    .with_position(origin.field_position("name")),
                ),
                None => {
                    first.insert(name, origin);
                }
            }
        }
    }

    fn resolve_model(&mut self, model: &mut SemanticModel) {
        let scope = format!("semantic model `{}`", model.name);
        self.check_duplicates(
            model.datasets.iter().map(|d| (d.name.as_str(), &d.origin)),
            "logical dataset",
            &scope,
        );
        self.check_duplicates(
            model.metrics.iter().map(|m| (m.name.as_str(), &m.origin)),
            "metric",
            &scope,
        );
        self.check_duplicates(
            model
                .relationships
                .iter()
                .filter_map(|r| r.name.as_deref().map(|n| (n, &r.origin))),
            "relationship",
            &scope,
        );

        for dataset in &model.datasets {
            self.check_dataset(dataset);
        }
        for metric in &model.metrics {
            self.check_expression(metric, &model.metrics, &model.metrics);
        }

        let view: &SemanticModel = model;
        let links: Vec<(Option<DatasetId>, Option<DatasetId>)> = view
            .relationships
            .iter()
            .map(|r| {
                (
                    self.link(view, r, "from", &r.from),
                    self.link(view, r, "to", &r.to),
                )
            })
            .collect();
        for (relationship, (from, to)) in model.relationships.iter_mut().zip(links) {
            relationship.from.resolved = from;
            relationship.to.resolved = to;
        }
    }

    /// Look up one relationship endpoint, reporting a dangling reference.
    fn link(
        &mut self,
        model: &SemanticModel,
        relationship: &Relationship,
        field: &str,
        endpoint: &DatasetRef,
    ) -> Option<DatasetId> {
        if endpoint.name.trim().is_empty() {
            return None;
        }
        let found = model.find_dataset(&endpoint.name);
        if found.is_some() {
            return found;
        }

        let mut diagnostic = Diagnostic::new(
            Code::DanglingRelationshipReference,
            relationship.origin.field_location(field),
            format!(
                "relationship `{}` references unknown dataset `{}` in `{}`",
                relationship.label(),
                endpoint.name,
                field
            ),
        )
        .with_position(relationship.origin.field_position(field));
        let names = model
            .datasets
            .iter()
            .map(|d| d.name.as_str())
            .filter(|n| !n.is_empty());
        if let Some(candidate) = closest_match(&endpoint.name, names) {
            diagnostic = diagnostic.with_suggestion(format!("did you mean `{}`?", candidate));
        }
        self.diagnostics.push(diagnostic);
        None
    }

    fn check_dataset(&mut self, dataset: &LogicalDataset) {
        // All kinds share a namespace; order by source position so the
        // first occurrence in the document wins.
        let mut fields: Vec<&Field> = dataset.entities().collect();
        fields.sort_by_key(|f| f.origin.position.map(|p| p.offset));

        let mut first: HashMap<&str, &Field> = HashMap::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                continue;
            }
            match first.get(field.name.as_str()) {
                Some(original) => self.diagnostics.push(
                    Diagnostic::new(
                        Code::DuplicateName,
                        field.origin.field_location("name"),
                        format!(
                            "duplicate name `{}` in dataset `{}`; already used by {}{}",
                            field.name,
                            dataset.name,
                            original.kind,
                            at_line(original.origin.field_position("name"))
                        ),
                    )
                    .with_position(field.origin.field_position("name")),
                ),
                None => {
                    first.insert(field.name.as_str(), *field);
                }
            }
        }

        for field in dataset.entities() {
            self.check_expression(field, dataset.fields_of(field.kind), &dataset.metrics);
        }
    }

    /// The expression texts of an entity: the plain `expr`, or one per
    /// dialect entry.
    fn variants<'f>(&self, field: &'f Field) -> Vec<Variant<'f>> {
        if field.dialects.is_empty() {
            return vec![Variant {
                text: field.expr.trim(),
                location: field.origin.field_location("expr"),
                position: field.origin.field_position("expr"),
                sql: true,
                check: self.dialect.filter(|d| d.is_sql()),
            }];
        }
        field
            .dialects
            .iter()
            .map(|entry| {
                let dialect = entry.dialect.parse::<SqlDialect>().unwrap_or_else(|_| {
                    tracing::debug!(dialect = %entry.dialect, "unknown dialect checked as ANSI SQL");
                    SqlDialect::Ansi
                });
                Variant {
                    text: entry.expr.trim(),
                    location: entry.origin.field_location("expression"),
                    position: entry.origin.field_position("expression"),
                    sql: dialect.is_sql(),
                    check: Some(dialect)
                        .filter(|d| d.is_sql() && self.settings.check_dialect_expressions),
                }
            })
            .collect()
    }

    /// Run the expression heuristics on one entity. `siblings` are the
    /// entities of the same kind and scope, `metrics` the metrics a derived
    /// metric may combine.
    fn check_expression(&mut self, field: &Field, siblings: &[Field], metrics: &[Field]) {
        let variants: Vec<Variant<'_>> = self
            .variants(field)
            .into_iter()
            .filter(|v| !v.text.is_empty())
            .collect();
        let Some(primary) = variants.first() else {
            return;
        };

        if self.settings.check_balanced_expressions {
            for variant in &variants {
                if let Err(imbalance) = expr::check_balanced(variant.text) {
                    self.diagnostics.push(
                        Diagnostic::new(
                            Code::UnbalancedExpression,
                            variant.location.clone(),
                            format!(
                                "expression of {} `{}` does not balance: {}",
                                field.kind, field.name, imbalance
                            ),
                        )
                        .with_position(variant.position),
                    );
                }
            }
        }

        if self.settings.self_reference {
            if let Some(other) = siblings
                .iter()
                .find(|o| o.name != field.name && o.name == primary.text)
            {
                self.diagnostics.push(
                    Diagnostic::new(
                        Code::PossibleSelfReference,
                        primary.location.clone(),
                        format!(
                            "expression of {} `{}` is exactly the name of {} `{}`",
                            field.kind, field.name, other.kind, other.name
                        ),
                    )
                    .with_position(primary.position)
                    .with_suggestion(format!("reference the underlying column instead of `{}`", other.name)),
                );
            }
        }

        if field.kind == FieldKind::Metric {
            self.check_aggregate(field, &variants, metrics);
        }

        for variant in &variants {
            let Some(dialect) = variant.check else {
                continue;
            };
            if let Err(error) = expr::check_sql(variant.text, dialect) {
                self.diagnostics.push(
                    Diagnostic::new(
                        Code::InvalidSqlExpression,
                        variant.location.clone(),
                        format!(
                            "expression of {} `{}` is not valid {} SQL: {}",
                            field.kind, field.name, dialect, error
                        ),
                    )
                    .with_position(variant.position),
                );
            }
        }
    }

    /// A metric aggregates when any of its SQL texts does.
    fn check_aggregate(&mut self, metric: &Field, variants: &[Variant<'_>], metrics: &[Field]) {
        let Some(severity) = self.settings.non_aggregate_metric.severity() else {
            return;
        };
        let sql: Vec<&Variant<'_>> = variants.iter().filter(|v| v.sql).collect();
        let Some(first) = sql.first() else {
            return;
        };
        // Derived metrics combine other metrics of the same scope.
        let derived = |text: &str| {
            expr::identifiers(text)
                .iter()
                .any(|name| *name != metric.name && metrics.iter().any(|m| m.name == *name))
        };
        if sql
            .iter()
            .any(|v| self.aggregate.is_aggregate(v.text) || derived(v.text))
        {
            return;
        }

        self.diagnostics.push(
            Diagnostic::new(
                Code::NonAggregateMetric,
                first.location.clone(),
                format!(
                    "metric `{}` does not aggregate: `{}` calls none of the aggregate functions",
                    metric.name, first.text
                ),
            )
            .with_severity(severity)
            .with_position(first.position)
            .with_suggestion(format!("wrap the expression in one of: {}", self.aggregate.describe())),
        );
    }
}
