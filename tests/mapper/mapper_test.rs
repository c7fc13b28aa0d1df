use osi::mapper::{self, MapResult};
use osi::model::{FieldKind, RelationshipKind};
use osi::{yaml, Code, Severity};

fn map_source(source: &str) -> MapResult {
    let parsed = yaml::parse(source);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    mapper::map(parsed.tree.as_ref())
}

fn rendered(result: &MapResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .map(|d| format!("{} {}", d.location, d.code))
        .collect()
}

#[test]
fn test_maps_relationships() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
      - name: customers
        base_table: customers
    relationships:
      - name: orders_customers
        from: orders
        to: customers
        kind: many-to-one
      - from: customers
        to: orders
        kind: lookup
"#,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let relationships = &result.models[0].relationships;
    assert_eq!(relationships.len(), 2);

    let first = &relationships[0];
    assert_eq!(first.name.as_deref(), Some("orders_customers"));
    assert_eq!(first.from.name, "orders");
    assert_eq!(first.to.name, "customers");
    assert_eq!(first.kind, Some(RelationshipKind::ManyToOne));
    // Endpoints are linked by the resolver, not the mapper.
    assert!(!first.is_resolved());

    let second = &relationships[1];
    assert_eq!(second.name, None);
    assert_eq!(second.label(), "customers -> orders");
    assert_eq!(second.kind, Some(RelationshipKind::Other("lookup".to_string())));
}

#[test]
fn test_all_entity_kinds() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        dimensions:
          - name: region
            expr: region
        metrics:
          - name: revenue
            expr: SUM(amount)
        facts:
          - name: amount
            expr: amount
        filters:
          - name: recent
            expr: order_date > '2024-01-01'
"#,
    );
    assert!(result.diagnostics.is_empty());
    let orders = &result.models[0].datasets[0];
    let names: Vec<&str> = orders.entities().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["region", "revenue", "amount", "recent"]);
    assert_eq!(orders.filters[0].expr, "order_date > '2024-01-01'");
}

#[test]
fn test_one_pass_reports_every_problem() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        dimensions:
          - name: region
      - base_table: customers
        colour: blue
"#,
    );
    assert_eq!(
        rendered(&result),
        vec![
            "semantic_model[0].logical_datasets[0].base_table MISSING_REQUIRED_FIELD",
            "semantic_model[0].logical_datasets[0].dimensions[0].expr MISSING_REQUIRED_FIELD",
            "semantic_model[0].logical_datasets[1].colour UNKNOWN_FIELD",
            "semantic_model[0].logical_datasets[1].name MISSING_REQUIRED_FIELD",
        ]
    );
    // Both datasets survive with sentinels.
    assert_eq!(result.models[0].datasets.len(), 2);
    assert_eq!(result.models[0].datasets[1].name, "");
}

#[test]
fn test_unknown_field_is_a_warning() {
    let result = map_source("semantic_model: []\nversion: 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, Code::UnknownField);
    assert_eq!(diag.severity, Severity::Warning);
    assert_eq!(diag.location.to_string(), "version");
}

#[test]
fn test_null_counts_as_absent() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    description: ~
    logical_datasets:
      - name:
        base_table: orders
"#,
    );
    assert_eq!(
        rendered(&result),
        vec!["semantic_model[0].logical_datasets[0].name MISSING_REQUIRED_FIELD"]
    );
    assert_eq!(result.models[0].description, None);
}

#[test]
fn test_empty_string_is_missing() {
    let result = map_source(
        r#"
semantic_model:
  - name: ""
"#,
    );
    assert_eq!(rendered(&result), vec!["semantic_model[0].name MISSING_REQUIRED_FIELD"]);
}

#[test]
fn test_scalars_coerce_to_strings() {
    let result = map_source(
        r#"
semantic_model:
  - name: 2024
    logical_datasets:
      - name: orders
        base_table: orders
        facts:
          - name: flag
            expr: true
"#,
    );
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.models[0].name, "2024");
    assert_eq!(result.models[0].datasets[0].facts[0].expr, "true");
}

#[test]
fn test_non_mapping_entities_are_dropped() {
    let result = map_source(
        r#"
semantic_model:
  - just a string
  - name: sales
"#,
    );
    assert_eq!(rendered(&result), vec!["semantic_model[0] TYPE_MISMATCH"]);
    assert_eq!(result.models.len(), 1);
    assert_eq!(result.models[0].name, "sales");
    assert!(result.diagnostics[0].message.contains("found a string"));
}

#[test]
fn test_root_must_hold_a_model_list() {
    let result = map_source("semantic_model:\n  name: sales\n");
    assert_eq!(rendered(&result), vec!["semantic_model TYPE_MISMATCH"]);
    assert!(result.models.is_empty());

    let result = map_source("other: 1\n");
    assert_eq!(
        rendered(&result),
        vec!["other UNKNOWN_FIELD", "semantic_model MISSING_REQUIRED_FIELD"]
    );
}

#[test]
fn test_alias_locations_use_written_key() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    tables:
      - name: orders
"#,
    );
    assert_eq!(
        rendered(&result),
        vec!["semantic_model[0].tables[0].base_table MISSING_REQUIRED_FIELD"]
    );
}

#[test]
fn test_repeated_alias_is_ignored() {
    let result = map_source(
        r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
    datasets:
      - name: ignored
        base_table: ignored
"#,
    );
    assert_eq!(rendered(&result), vec!["semantic_model[0].datasets UNKNOWN_FIELD"]);
    let datasets = &result.models[0].datasets;
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].name, "orders");
}

#[test]
fn test_positions_point_at_fields() {
    let result = map_source("semantic_model:\n  - name: sales\n    logical_datasets:\n      - name: orders\n");
    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, Code::MissingRequiredField);
    // Missing fields point at the entity that lacks them.
    let position = diag.position.unwrap();
    assert_eq!((position.line, position.column), (4, 9));
}

#[test]
fn test_maps_fields_and_model_metrics() {
    let result = map_source(
        r#"
semantic_model:
  - name: tpcds
    datasets:
      - name: store_sales
        base_table: tpcds.store_sales
        fields:
          - name: ss_item_sk
            expression:
              dialects:
                - dialect: ANSI_SQL
                  expression: ss_item_sk
          - name: ss_sales_price
            expression:
              dialects:
                - expression: ss_sales_price
                - dialect: SNOWFLAKE
                  expression: ss_sales_price::number
    metrics:
      - name: total_sales
        expression:
          dialects:
            - dialect: ANSI_SQL
              expression: SUM(store_sales.ss_sales_price)
"#,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", rendered(&result));
    let model = &result.models[0];
    let sales = &model.datasets[0];
    assert_eq!(sales.fields.len(), 2);
    assert_eq!(sales.fields[0].kind, FieldKind::Field);

    let price = &sales.fields[1];
    assert_eq!(price.expr, "ss_sales_price");
    let dialects: Vec<(&str, &str)> = price
        .dialects
        .iter()
        .map(|d| (d.dialect.as_str(), d.expr.as_str()))
        .collect();
    assert_eq!(
        dialects,
        vec![
            ("ANSI_SQL", "ss_sales_price"),
            ("SNOWFLAKE", "ss_sales_price::number"),
        ]
    );
    assert_eq!(
        price.dialects[1].origin.field_location("expression").to_string(),
        "semantic_model[0].datasets[0].fields[1].expression.dialects[1].expression"
    );

    assert_eq!(model.metrics.len(), 1);
    assert_eq!(model.metrics[0].kind, FieldKind::Metric);
    assert_eq!(model.metrics[0].expr, "SUM(store_sales.ss_sales_price)");
}

#[test]
fn test_malformed_dialect_lists() {
    let result = map_source(
        r#"
semantic_model:
  - name: tpcds
    datasets:
      - name: store_sales
        base_table: tpcds.store_sales
        fields:
          - name: a
            expression:
              dialects: []
          - name: b
            expression: {}
          - name: c
            expression:
              dialects:
                - dialect: ANSI_SQL
              flavor: sql
"#,
    );
    let base = "semantic_model[0].datasets[0]";
    assert_eq!(
        rendered(&result),
        vec![
            format!("{}.fields[0].expression.dialects MISSING_REQUIRED_FIELD", base),
            format!("{}.fields[1].expression.dialects MISSING_REQUIRED_FIELD", base),
            format!("{}.fields[2].expression.flavor UNKNOWN_FIELD", base),
            format!("{}.fields[2].expression.dialects[0].expression MISSING_REQUIRED_FIELD", base),
        ]
    );
    assert!(result.diagnostics[0].message.contains("lists no dialects"));
    assert!(result.models[0].datasets[0].fields.iter().all(|f| f.expr.is_empty()));
}
