//! Canonical form of a validated document.
//!
//! Normalization sorts every collection by name, de-duplicates unique keys
//! and re-points relationship endpoints at the sorted dataset list. The
//! canonical model is only produced for documents without errors, and
//! normalizing its own YAML output yields the same canonical model again.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::model::{
    DatasetId, Field, LogicalDataset, Opaque, Relationship, RelationshipKind, SemanticModel,
};
use crate::validation::ValidationResult;

/// Error type for normalization.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Document has {errors} validation error(s); refusing to normalize")]
    NotValidated { errors: usize },

    #[error("Relationship '{0}' has an unresolved endpoint")]
    UnresolvedRelationship(String),

    #[error("Failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A canonical, deterministically ordered document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalModel {
    pub semantic_model: Vec<CanonicalSemanticModel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSemanticModel {
    pub name: String,
    pub description: Option<String>,
    pub logical_datasets: Vec<CanonicalDataset>,
    pub metrics: Vec<CanonicalField>,
    pub relationships: Vec<CanonicalRelationship>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalDataset {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub base_table: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unique_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<CanonicalField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<CanonicalField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<CanonicalField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<CanonicalField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<CanonicalField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<Opaque>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Opaque>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub expr: CanonicalExpression,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<Opaque>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Opaque>,
}

/// A plain expression string, or the per-dialect list in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalExpression {
    Plain(String),
    Dialects {
        dialects: Vec<CanonicalDialectExpression>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalDialectExpression {
    pub dialect: String,
    pub expression: String,
}

/// A relationship whose endpoints index the canonical dataset list.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRelationship {
    pub name: Option<String>,
    pub from: DatasetId,
    pub to: DatasetId,
    pub kind: Option<RelationshipKind>,
    pub description: Option<String>,
    pub ai_context: Option<Opaque>,
    pub extension: Option<Opaque>,
}

impl CanonicalModel {
    /// Serialize to YAML with the canonical key order.
    pub fn to_yaml(&self) -> Result<String, NormalizeError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, NormalizeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl CanonicalSemanticModel {
    pub fn dataset(&self, id: DatasetId) -> Option<&CanonicalDataset> {
        self.logical_datasets.get(id.0)
    }

    fn dataset_name(&self, id: DatasetId) -> &str {
        self.dataset(id).map(|d| d.name.as_str()).unwrap_or_default()
    }
}

/// Build the canonical model. Refuses unless `result.ok`.
pub fn normalize(
    models: &[SemanticModel],
    result: &ValidationResult,
) -> Result<CanonicalModel, NormalizeError> {
    if !result.ok {
        return Err(NormalizeError::NotValidated {
            errors: result.error_count(),
        });
    }

    let mut semantic_model = models
        .iter()
        .map(normalize_model)
        .collect::<Result<Vec<_>, _>>()?;
    semantic_model.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!(models = semantic_model.len(), "normalized document");
    Ok(CanonicalModel { semantic_model })
}

fn normalize_model(model: &SemanticModel) -> Result<CanonicalSemanticModel, NormalizeError> {
    // Sorted order of the source datasets, and each source index's new id.
    let mut order: Vec<usize> = (0..model.datasets.len()).collect();
    order.sort_by(|&a, &b| model.datasets[a].name.cmp(&model.datasets[b].name));
    let mut new_id = vec![DatasetId(0); model.datasets.len()];
    for (new, &old) in order.iter().enumerate() {
        new_id[old] = DatasetId(new);
    }

    let logical_datasets = order
        .iter()
        .map(|&i| normalize_dataset(&model.datasets[i]))
        .collect();

    let endpoint = |relationship: &Relationship, id: Option<DatasetId>| {
        id.and_then(|id| new_id.get(id.0).copied())
            .ok_or_else(|| NormalizeError::UnresolvedRelationship(relationship.label()))
    };
    let mut relationships = Vec::with_capacity(model.relationships.len());
    for relationship in &model.relationships {
        relationships.push(CanonicalRelationship {
            name: relationship.name.clone(),
            from: endpoint(relationship, relationship.from.resolved)?,
            to: endpoint(relationship, relationship.to.resolved)?,
            kind: relationship.kind.clone(),
            description: relationship.description.clone(),
            ai_context: relationship.ai_context.clone(),
            extension: relationship.extension.clone(),
        });
    }

    let mut canonical = CanonicalSemanticModel {
        name: model.name.clone(),
        description: model.description.clone(),
        logical_datasets,
        metrics: normalize_fields(&model.metrics),
        relationships: Vec::new(),
        ai_context: model.ai_context.clone(),
        extension: model.extension.clone(),
    };
    relationships.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| canonical.dataset_name(a.from).cmp(canonical.dataset_name(b.from)))
            .then_with(|| canonical.dataset_name(a.to).cmp(canonical.dataset_name(b.to)))
            .then_with(|| {
                let kind = |r: &CanonicalRelationship| r.kind.as_ref().map(|k| k.as_str().to_string());
                kind(a).cmp(&kind(b))
            })
    });
    canonical.relationships = relationships;
    Ok(canonical)
}

fn normalize_dataset(dataset: &LogicalDataset) -> CanonicalDataset {
    let mut unique_keys = dataset.unique_keys.clone();
    unique_keys.sort();
    unique_keys.dedup();

    CanonicalDataset {
        name: dataset.name.clone(),
        description: dataset.description.clone(),
        base_table: dataset.base_table.clone(),
        unique_keys,
        dimensions: normalize_fields(&dataset.dimensions),
        metrics: normalize_fields(&dataset.metrics),
        facts: normalize_fields(&dataset.facts),
        filters: normalize_fields(&dataset.filters),
        fields: normalize_fields(&dataset.fields),
        ai_context: dataset.ai_context.clone(),
        extension: dataset.extension.clone(),
    }
}

fn normalize_fields(fields: &[Field]) -> Vec<CanonicalField> {
    let mut canonical: Vec<CanonicalField> = fields
        .iter()
        .map(|f| CanonicalField {
            name: f.name.clone(),
            description: f.description.clone(),
            expr: normalize_expression(f),
            ai_context: f.ai_context.clone(),
            extension: f.extension.clone(),
        })
        .collect();
    canonical.sort_by(|a, b| a.name.cmp(&b.name));
    canonical
}

fn normalize_expression(field: &Field) -> CanonicalExpression {
    if field.dialects.is_empty() {
        return CanonicalExpression::Plain(field.expr.clone());
    }
    CanonicalExpression::Dialects {
        dialects: field
            .dialects
            .iter()
            .map(|d| CanonicalDialectExpression {
                dialect: d.dialect.clone(),
                expression: d.expr.clone(),
            })
            .collect(),
    }
}

// ============================================================================
// Serialization
// ============================================================================

impl Serialize for CanonicalSemanticModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if !self.logical_datasets.is_empty() {
            map.serialize_entry("logical_datasets", &self.logical_datasets)?;
        }
        if !self.metrics.is_empty() {
            map.serialize_entry("metrics", &self.metrics)?;
        }
        if !self.relationships.is_empty() {
            let views: Vec<RelationshipView<'_>> = self
                .relationships
                .iter()
                .map(|relationship| RelationshipView {
                    relationship,
                    model: self,
                })
                .collect();
            map.serialize_entry("relationships", &views)?;
        }
        if let Some(ai_context) = &self.ai_context {
            map.serialize_entry("ai_context", ai_context)?;
        }
        if let Some(extension) = &self.extension {
            map.serialize_entry("extension", extension)?;
        }
        map.end()
    }
}

/// Writes relationship endpoints as dataset names.
struct RelationshipView<'a> {
    relationship: &'a CanonicalRelationship,
    model: &'a CanonicalSemanticModel,
}

impl Serialize for RelationshipView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let r = self.relationship;
        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = &r.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(description) = &r.description {
            map.serialize_entry("description", description)?;
        }
        map.serialize_entry("from", self.model.dataset_name(r.from))?;
        map.serialize_entry("to", self.model.dataset_name(r.to))?;
        if let Some(kind) = &r.kind {
            map.serialize_entry("kind", kind)?;
        }
        if let Some(ai_context) = &r.ai_context {
            map.serialize_entry("ai_context", ai_context)?;
        }
        if let Some(extension) = &r.extension {
            map.serialize_entry("extension", extension)?;
        }
        map.end()
    }
}
