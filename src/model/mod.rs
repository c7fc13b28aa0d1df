//! Typed semantic model entities.
//!
//! The mapper builds these from the document tree; the resolver then links
//! relationship endpoints to datasets. Every entity keeps an [`Origin`] so
//! later stages can point diagnostics at the exact field that caused them.

pub mod dataset;
pub mod relationship;

pub use dataset::{DialectExpression, Field, FieldKind, LogicalDataset};
pub use relationship::{DatasetId, DatasetRef, Relationship, RelationshipKind};

use serde::Serialize;

use crate::diagnostics::Location;
use crate::yaml::Position;

/// An opaque payload (`ai_context`, `extension`), kept in document order and
/// never inspected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Opaque(pub serde_yaml::Value);

/// Where an entity and its fields came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Origin {
    /// Location of the entity itself.
    pub location: Location,
    /// Source position of the entity, if it exists in the source.
    pub position: Option<Position>,
    /// (canonical field, key as written, position of the key)
    fields: Vec<(&'static str, String, Position)>,
}

impl Origin {
    pub fn new(location: Location, position: Option<Position>) -> Self {
        Self {
            location,
            position,
            fields: Vec::new(),
        }
    }

    /// Record the key a field was written under, which may be an alias.
    pub fn record(&mut self, field: &'static str, key: impl Into<String>, position: Position) {
        self.fields.push((field, key.into(), position));
    }

    /// Location of a field. Falls back to the canonical key when the field
    /// was not written.
    pub fn field_location(&self, field: &str) -> Location {
        match self.fields.iter().find(|(f, _, _)| *f == field) {
            Some((_, key, _)) => self.location.key(key.clone()),
            None => self.location.key(field),
        }
    }

    /// Position of a field's key, falling back to the entity position.
    pub fn field_position(&self, field: &str) -> Option<Position> {
        self.fields
            .iter()
            .find(|(f, _, _)| *f == field)
            .map(|(_, _, p)| *p)
            .or(self.position)
    }
}

/// A top-level semantic model.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticModel {
    pub name: String,
    pub description: Option<String>,
    pub datasets: Vec<LogicalDataset>,
    /// Model-level metrics, which may combine fields of several datasets.
    pub metrics: Vec<Field>,
    pub relationships: Vec<Relationship>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
    pub origin: Origin,
}

impl SemanticModel {
    /// First dataset with the given name.
    pub fn find_dataset(&self, name: &str) -> Option<DatasetId> {
        self.datasets
            .iter()
            .position(|d| d.name == name)
            .map(DatasetId)
    }
}
