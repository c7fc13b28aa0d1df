// src/model/relationship.rs
use std::fmt;

use serde::{Serialize, Serializer};

use super::{Opaque, Origin};

/// Index of a dataset in its model's dataset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DatasetId(pub usize);

/// A relationship endpoint: the dataset name as written, and the dataset it
/// resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRef {
    pub name: String,
    pub resolved: Option<DatasetId>,
}

impl DatasetRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
        }
    }
}

/// Relationship kind. The vocabulary is open: unrecognised kinds are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// One-to-one relationship
    OneToOne,
    /// One-to-many relationship
    OneToMany,
    /// Many-to-one relationship
    ManyToOne,
    /// Many-to-many relationship
    ManyToMany,
    Other(String),
}

impl RelationshipKind {
    /// Parse a kind, accepting any case and `-` or `_` separators.
    pub fn parse(text: &str) -> Self {
        let normalized = text.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "one_to_one" => RelationshipKind::OneToOne,
            "one_to_many" => RelationshipKind::OneToMany,
            "many_to_one" => RelationshipKind::ManyToOne,
            "many_to_many" => RelationshipKind::ManyToMany,
            _ => RelationshipKind::Other(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RelationshipKind::OneToOne => "one_to_one",
            RelationshipKind::OneToMany => "one_to_many",
            RelationshipKind::ManyToOne => "many_to_one",
            RelationshipKind::ManyToMany => "many_to_many",
            RelationshipKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RelationshipKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A directed link between two datasets of the same model.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: Option<String>,
    pub from: DatasetRef,
    pub to: DatasetRef,
    pub kind: Option<RelationshipKind>,
    pub description: Option<String>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
    pub origin: Origin,
}

impl Relationship {
    /// Both endpoints resolved.
    pub fn is_resolved(&self) -> bool {
        self.from.resolved.is_some() && self.to.resolved.is_some()
    }

    /// Name for messages: the relationship name, or `from -> to`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} -> {}", self.from.name, self.to.name),
        }
    }
}
