// src/model/dataset.rs
use std::fmt;

use super::{Opaque, Origin};

/// The entity kinds a dataset owns. They share one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Dimension,
    Metric,
    Fact,
    Filter,
    /// A plain column under `fields`.
    Field,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Dimension,
        FieldKind::Metric,
        FieldKind::Fact,
        FieldKind::Filter,
        FieldKind::Field,
    ];

    /// The dataset key holding entities of this kind.
    pub fn key(self) -> &'static str {
        match self {
            FieldKind::Dimension => "dimensions",
            FieldKind::Metric => "metrics",
            FieldKind::Fact => "facts",
            FieldKind::Filter => "filters",
            FieldKind::Field => "fields",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Dimension => "dimension",
            FieldKind::Metric => "metric",
            FieldKind::Fact => "fact",
            FieldKind::Filter => "filter",
            FieldKind::Field => "field",
        };
        f.write_str(name)
    }
}

/// One entry of an `expression: {dialects: [...]}` list.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectExpression {
    /// Dialect name as written, `ANSI_SQL` when absent.
    pub dialect: String,
    pub expr: String,
    pub origin: Origin,
}

/// A named entity with an expression: a dimension, metric, fact, filter or
/// plain field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub kind: FieldKind,
    pub name: String,
    /// Expression text, opaque apart from the resolver heuristics. For the
    /// dialect list form this is the first entry's expression.
    pub expr: String,
    /// Per-dialect expressions, empty for a plain `expr` string.
    pub dialects: Vec<DialectExpression>,
    pub description: Option<String>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
    pub origin: Origin,
}

/// A logical dataset over one physical table.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDataset {
    pub name: String,
    pub description: Option<String>,
    /// Physical table identifier, opaque.
    pub base_table: String,
    pub unique_keys: Vec<String>,
    pub dimensions: Vec<Field>,
    pub metrics: Vec<Field>,
    pub facts: Vec<Field>,
    pub filters: Vec<Field>,
    pub fields: Vec<Field>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
    pub origin: Origin,
}

impl LogicalDataset {
    /// Entities of one kind.
    pub fn fields_of(&self, kind: FieldKind) -> &[Field] {
        match kind {
            FieldKind::Dimension => &self.dimensions,
            FieldKind::Metric => &self.metrics,
            FieldKind::Fact => &self.facts,
            FieldKind::Filter => &self.filters,
            FieldKind::Field => &self.fields,
        }
    }

    /// All entities, kind by kind.
    pub fn entities(&self) -> impl Iterator<Item = &Field> {
        FieldKind::ALL
            .into_iter()
            .flat_map(move |kind| self.fields_of(kind).iter())
    }
}
