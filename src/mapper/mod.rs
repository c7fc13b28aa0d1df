//! Schema mapper: document tree to typed semantic model entities.
//!
//! The mapper walks the generic [`Node`] tree against the semantic model
//! shapes. It never stops at a bad entity: a missing or mistyped field is
//! reported and replaced by a sentinel (an empty string or an empty list),
//! so the resolver still sees every entity that has a usable shape.
//!
//! Accepted aliases: `tables` and `datasets` for `logical_datasets`, and
//! `expression` for `expr`. Null values count as absent. Non-null scalars of
//! any type are accepted where a string is expected and keep their source
//! text.
//!
//! An expression is either a string or a per-dialect list:
//!
//! ```yaml
//! expression:
//!   dialects:
//!     - dialect: ANSI_SQL
//!       expression: SUM(ss_sales_price)
//! ```
//!
//! A dialect entry without `dialect` is `ANSI_SQL`.

use crate::diagnostics::{closest_match, Code, Diagnostic, Location};
use crate::model::{
    DatasetRef, DialectExpression, Field, FieldKind, LogicalDataset, Opaque, Origin, Relationship,
    RelationshipKind, SemanticModel,
};
use crate::yaml::{Entry, Node, NodeKind};

const ROOT_FIELDS: &[&str] = &["semantic_model"];

const MODEL_FIELDS: &[&str] = &[
    "name",
    "description",
    "logical_datasets",
    "tables",
    "datasets",
    "metrics",
    "relationships",
    "ai_context",
    "extension",
];

const DATASET_FIELDS: &[&str] = &[
    "name",
    "description",
    "base_table",
    "unique_keys",
    "dimensions",
    "metrics",
    "facts",
    "filters",
    "fields",
    "ai_context",
    "extension",
];

const ENTITY_FIELDS: &[&str] = &[
    "name",
    "expr",
    "expression",
    "description",
    "ai_context",
    "extension",
];

const RELATIONSHIP_FIELDS: &[&str] = &[
    "name",
    "from",
    "to",
    "kind",
    "description",
    "ai_context",
    "extension",
];

const EXPRESSION_FIELDS: &[&str] = &["dialects"];

const DIALECT_FIELDS: &[&str] = &["dialect", "expression"];

const DATASET_ALIASES: &[&str] = &["tables", "datasets"];
const EXPR_ALIASES: &[&str] = &["expression"];

const DEFAULT_DIALECT: &str = "ANSI_SQL";

/// Result of mapping a document tree.
#[derive(Debug, Default)]
pub struct MapResult {
    pub models: Vec<SemanticModel>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Map a parsed document onto semantic models.
pub fn map(root: Option<&Node>) -> MapResult {
    let mut mapper = Mapper::default();
    let models = mapper.map_document(root);
    tracing::debug!(
        models = models.len(),
        diagnostics = mapper.diagnostics.len(),
        "mapped document"
    );
    MapResult {
        models,
        diagnostics: mapper.diagnostics,
    }
}

/// A mapping being read as one entity.
struct Scope<'n> {
    entries: &'n [Entry],
    origin: Origin,
    what: &'static str,
}

#[derive(Default)]
struct Mapper {
    diagnostics: Vec<Diagnostic>,
}

fn describe(node: &Node) -> &'static str {
    match node.kind_name() {
        "null" => "null",
        "boolean" => "a boolean",
        "number" => "a number",
        "sequence" => "a sequence",
        "mapping" => "a mapping",
        _ => "a string",
    }
}

impl Mapper {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn type_mismatch(&mut self, node: &Node, location: Location, expected: &str) {
        self.push(
            Diagnostic::new(
                Code::TypeMismatch,
                location,
                format!("expected {}, found {}", expected, describe(node)),
            )
            .with_position(node.position),
        );
    }

    // ========================================================================
    // Document
    // ========================================================================

    fn map_document(&mut self, root: Option<&Node>) -> Vec<SemanticModel> {
        let root_location = Location::root();
        let models_location = root_location.key("semantic_model");

        let Some(root) = root.filter(|r| !r.is_null()) else {
            self.push(Diagnostic::new(
                Code::MissingRequiredField,
                models_location,
                "document is empty; expected a `semantic_model` list",
            ));
            return Vec::new();
        };
        let Some(mut scope) = self.scope(root, root_location, "document", ROOT_FIELDS) else {
            return Vec::new();
        };

        let Some(entry) = self.lookup(&mut scope, "semantic_model", &[]) else {
            self.missing(&scope, "semantic_model");
            return Vec::new();
        };
        let NodeKind::Sequence(items) = &entry.value.kind else {
            self.type_mismatch(&entry.value, models_location, "a sequence of semantic models");
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.map_model(item, models_location.index(i)))
            .collect()
    }

    fn map_model(&mut self, node: &Node, location: Location) -> Option<SemanticModel> {
        let mut scope = self.scope(node, location, "semantic model", MODEL_FIELDS)?;

        let name = self.required_string(&mut scope, "name", &[]);
        let description = self.optional_string(&mut scope, "description");
        let datasets = self
            .sequence(&mut scope, "logical_datasets", DATASET_ALIASES)
            .into_iter()
            .filter_map(|(loc, item)| self.map_dataset(item, loc))
            .collect();
        let metrics = self
            .sequence(&mut scope, "metrics", &[])
            .into_iter()
            .filter_map(|(loc, item)| self.map_field(item, loc, FieldKind::Metric))
            .collect();
        let relationships = self
            .sequence(&mut scope, "relationships", &[])
            .into_iter()
            .filter_map(|(loc, item)| self.map_relationship(item, loc))
            .collect();
        let ai_context = self.opaque(&mut scope, "ai_context");
        let extension = self.opaque(&mut scope, "extension");

        Some(SemanticModel {
            name,
            description,
            datasets,
            metrics,
            relationships,
            ai_context,
            extension,
            origin: scope.origin,
        })
    }

    fn map_dataset(&mut self, node: &Node, location: Location) -> Option<LogicalDataset> {
        let mut scope = self.scope(node, location, "logical dataset", DATASET_FIELDS)?;

        let name = self.required_string(&mut scope, "name", &[]);
        let description = self.optional_string(&mut scope, "description");
        let base_table = self.required_string(&mut scope, "base_table", &[]);
        let unique_keys = self.string_list(&mut scope, "unique_keys");

        let mut fields: [Vec<Field>; 5] = Default::default();
        for (slot, kind) in fields.iter_mut().zip(FieldKind::ALL) {
            *slot = self
                .sequence(&mut scope, kind.key(), &[])
                .into_iter()
                .filter_map(|(loc, item)| self.map_field(item, loc, kind))
                .collect();
        }
        let [dimensions, metrics, facts, filters, fields] = fields;

        let ai_context = self.opaque(&mut scope, "ai_context");
        let extension = self.opaque(&mut scope, "extension");

        Some(LogicalDataset {
            name,
            description,
            base_table,
            unique_keys,
            dimensions,
            metrics,
            facts,
            filters,
            fields,
            ai_context,
            extension,
            origin: scope.origin,
        })
    }

    fn map_field(&mut self, node: &Node, location: Location, kind: FieldKind) -> Option<Field> {
        let what = match kind {
            FieldKind::Dimension => "dimension",
            FieldKind::Metric => "metric",
            FieldKind::Fact => "fact",
            FieldKind::Filter => "filter",
            FieldKind::Field => "field",
        };
        let mut scope = self.scope(node, location, what, ENTITY_FIELDS)?;

        let name = self.required_string(&mut scope, "name", &[]);
        let (expr, dialects) = self.expression(&mut scope);
        let description = self.optional_string(&mut scope, "description");
        let ai_context = self.opaque(&mut scope, "ai_context");
        let extension = self.opaque(&mut scope, "extension");

        Some(Field {
            kind,
            name,
            expr,
            dialects,
            description,
            ai_context,
            extension,
            origin: scope.origin,
        })
    }

    /// The `expr` of an entity: a string, or a mapping with a `dialects`
    /// list. The text is the first dialect's expression for the list form.
    fn expression(&mut self, scope: &mut Scope<'_>) -> (String, Vec<DialectExpression>) {
        let Some(entry) = self.lookup(scope, "expr", EXPR_ALIASES) else {
            self.missing(scope, "expr");
            return (String::new(), Vec::new());
        };
        let location = scope.origin.field_location("expr");
        if entry.value.as_mapping().is_none() {
            return (self.non_empty_text(entry, location, scope.what), Vec::new());
        }
        let Some(mut inner) = self.scope(&entry.value, location, "expression", EXPRESSION_FIELDS) else {
            return (String::new(), Vec::new());
        };

        let entries = inner.entries;
        let declared = entries
            .iter()
            .find(|e| e.key == "dialects")
            .map(|e| &e.value)
            .filter(|v| !v.is_null());
        let items = self.sequence(&mut inner, "dialects", &[]);
        if items.is_empty() {
            match declared {
                None => self.missing(&inner, "dialects"),
                Some(node) if node.as_sequence().is_some() => self.push(
                    Diagnostic::new(
                        Code::MissingRequiredField,
                        inner.origin.field_location("dialects"),
                        format!("expression of {} lists no dialects", scope.what),
                    )
                    .with_position(node.position),
                ),
                // a type mismatch was reported
                Some(_) => {}
            }
            return (String::new(), Vec::new());
        }

        let mut dialects = Vec::with_capacity(items.len());
        for (location, item) in items {
            let Some(mut variant) = self.scope(item, location, "dialect expression", DIALECT_FIELDS) else {
                continue;
            };
            let dialect = self
                .optional_string(&mut variant, "dialect")
                .unwrap_or_else(|| DEFAULT_DIALECT.to_string());
            let expr = self.required_string(&mut variant, "expression", &[]);
            dialects.push(DialectExpression {
                dialect,
                expr,
                origin: variant.origin,
            });
        }
        let expr = dialects.first().map(|d| d.expr.clone()).unwrap_or_default();
        (expr, dialects)
    }

    fn map_relationship(&mut self, node: &Node, location: Location) -> Option<Relationship> {
        let mut scope = self.scope(node, location, "relationship", RELATIONSHIP_FIELDS)?;

        let name = self.optional_string(&mut scope, "name");
        let from = self.required_string(&mut scope, "from", &[]);
        let to = self.required_string(&mut scope, "to", &[]);
        let kind = self
            .optional_string(&mut scope, "kind")
            .map(|k| RelationshipKind::parse(&k));
        let description = self.optional_string(&mut scope, "description");
        let ai_context = self.opaque(&mut scope, "ai_context");
        let extension = self.opaque(&mut scope, "extension");

        Some(Relationship {
            name,
            from: DatasetRef::unresolved(from),
            to: DatasetRef::unresolved(to),
            kind,
            description,
            ai_context,
            extension,
            origin: scope.origin,
        })
    }

    // ========================================================================
    // Field access
    // ========================================================================

    /// Open a mapping as an entity scope, reporting unknown keys.
    fn scope<'n>(
        &mut self,
        node: &'n Node,
        location: Location,
        what: &'static str,
        known: &[&str],
    ) -> Option<Scope<'n>> {
        let Some(entries) = node.as_mapping() else {
            self.type_mismatch(node, location, &format!("a mapping for {}", what));
            return None;
        };

        for entry in entries {
            if known.contains(&entry.key.as_str()) {
                continue;
            }
            let mut diagnostic = Diagnostic::new(
                Code::UnknownField,
                location.key(entry.key.clone()),
                format!("unknown field `{}` in {}", entry.key, what),
            )
            .with_position(entry.key_position);
            if let Some(candidate) = closest_match(&entry.key, known.iter().copied()) {
                diagnostic = diagnostic.with_suggestion(format!("did you mean `{}`?", candidate));
            }
            self.push(diagnostic);
        }

        Some(Scope {
            entries,
            origin: Origin::new(location, Some(node.position)),
            what,
        })
    }

    /// Find a field by its canonical key or an alias. The first key present
    /// wins; later aliases are reported and ignored. Null counts as absent.
    fn lookup<'n>(
        &mut self,
        scope: &mut Scope<'n>,
        field: &'static str,
        aliases: &[&str],
    ) -> Option<&'n Entry> {
        let mut found: Option<&'n Entry> = None;
        let entries = scope.entries;
        for entry in entries
            .iter()
            .filter(|e| e.key == field || aliases.contains(&e.key.as_str()))
        {
            match found {
                None => {
                    scope.origin.record(field, entry.key.clone(), entry.key_position);
                    found = Some(entry);
                }
                Some(first) => self.push(
                    Diagnostic::new(
                        Code::UnknownField,
                        scope.origin.location.key(entry.key.clone()),
                        format!(
                            "`{}` repeats `{}` already given in {}; ignored",
                            entry.key, first.key, scope.what
                        ),
                    )
                    .with_position(entry.key_position),
                ),
            }
        }
        found.filter(|e| !e.value.is_null())
    }

    fn missing(&mut self, scope: &Scope<'_>, field: &str) {
        self.push(
            Diagnostic::new(
                Code::MissingRequiredField,
                scope.origin.field_location(field),
                format!("{} is missing required field `{}`", scope.what, field),
            )
            .with_position(scope.origin.field_position(field)),
        );
    }

    fn scalar_text(&mut self, entry: &Entry, location: Location) -> Option<String> {
        match &entry.value.kind {
            NodeKind::Scalar { text, .. } => Some(text.clone()),
            _ => {
                self.type_mismatch(&entry.value, location, &format!("a string for `{}`", entry.key));
                None
            }
        }
    }

    /// A required, non-empty string. Returns an empty sentinel on failure.
    fn required_string(&mut self, scope: &mut Scope<'_>, field: &'static str, aliases: &[&str]) -> String {
        let Some(entry) = self.lookup(scope, field, aliases) else {
            self.missing(scope, field);
            return String::new();
        };
        let location = scope.origin.field_location(field);
        self.non_empty_text(entry, location, scope.what)
    }

    /// Scalar text that must not be blank.
    fn non_empty_text(&mut self, entry: &Entry, location: Location, what: &str) -> String {
        let Some(text) = self.scalar_text(entry, location.clone()) else {
            return String::new();
        };
        if text.trim().is_empty() {
            self.push(
                Diagnostic::new(
                    Code::MissingRequiredField,
                    location,
                    format!("`{}` of {} must not be empty", entry.key, what),
                )
                .with_position(entry.value.position),
            );
        }
        text
    }

    fn optional_string(&mut self, scope: &mut Scope<'_>, field: &'static str) -> Option<String> {
        let entry = self.lookup(scope, field, &[])?;
        let location = scope.origin.field_location(field);
        self.scalar_text(entry, location)
    }

    /// Items of a sequence field with their locations. Absent is empty.
    fn sequence<'n>(
        &mut self,
        scope: &mut Scope<'n>,
        field: &'static str,
        aliases: &[&str],
    ) -> Vec<(Location, &'n Node)> {
        let Some(entry) = self.lookup(scope, field, aliases) else {
            return Vec::new();
        };
        let location = scope.origin.field_location(field);
        match &entry.value.kind {
            NodeKind::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (location.index(i), item))
                .collect(),
            _ => {
                self.type_mismatch(&entry.value, location, &format!("a sequence for `{}`", entry.key));
                Vec::new()
            }
        }
    }

    /// A list of strings; a single string is a one-element list.
    fn string_list(&mut self, scope: &mut Scope<'_>, field: &'static str) -> Vec<String> {
        let Some(entry) = self.lookup(scope, field, &[]) else {
            return Vec::new();
        };
        let location = scope.origin.field_location(field);
        match &entry.value.kind {
            NodeKind::Scalar { text, .. } => vec![text.clone()],
            NodeKind::Sequence(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(text) => values.push(text.to_string()),
                        None => self.type_mismatch(item, location.index(i), "a column name"),
                    }
                }
                values
            }
            NodeKind::Mapping(_) => {
                self.type_mismatch(&entry.value, location, &format!("a sequence for `{}`", field));
                Vec::new()
            }
        }
    }

    fn opaque(&mut self, scope: &mut Scope<'_>, field: &'static str) -> Option<Opaque> {
        self.lookup(scope, field, &[])
            .map(|entry| Opaque(entry.value.to_value()))
    }
}
