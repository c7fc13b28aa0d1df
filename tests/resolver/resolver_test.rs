use osi::config::RuleSettings;
use osi::expr::AggregateRule;
use osi::model::{DatasetId, SemanticModel};
use osi::{mapper, resolver, yaml, Code, Diagnostic};

fn resolve_source(source: &str, settings: &RuleSettings) -> (Vec<SemanticModel>, Vec<Diagnostic>) {
    let parsed = yaml::parse(source);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let mapped = mapper::map(parsed.tree.as_ref());
    assert!(mapped.diagnostics.is_empty(), "{:?}", mapped.diagnostics);
    let mut models = mapped.models;
    let diagnostics = resolver::resolve(&mut models, settings);
    (models, diagnostics)
}

fn duplicate_locations(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| d.code == Code::DuplicateName)
        .map(|d| d.location.to_string())
        .collect()
}

#[test]
fn test_dangling_relationship_scenario() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
    relationships:
      - name: orders_customers
        from: orders
        to: customers
"#;
    let (models, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag.code, Code::DanglingRelationshipReference);
    assert!(diag.is_error());
    assert!(diag.message.contains("customers"));
    assert_eq!(diag.location.to_string(), "semantic_model[0].relationships[0].to");
    assert_eq!(diag.position.map(|p| p.line), Some(10));

    let relationship = &models[0].relationships[0];
    assert_eq!(relationship.from.resolved, Some(DatasetId(0)));
    assert_eq!(relationship.to.resolved, None);
}

#[test]
fn test_dangling_reference_suggests_close_name() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
      - name: customers
        base_table: customers
    relationships:
      - from: order
        to: customers
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].location.to_string(),
        "semantic_model[0].relationships[0].from"
    );
    assert_eq!(diagnostics[0].suggestion.as_deref(), Some("did you mean `orders`?"));
    assert!(diagnostics[0].message.contains("order -> customers"));
}

#[test]
fn test_duplicate_dimension_scenario() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        dimensions:
          - name: region
            expr: region
          - name: region
            expr: sales_region
"#;
    let (models, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        duplicate_locations(&diagnostics),
        vec!["semantic_model[0].logical_datasets[0].dimensions[1].name"]
    );
    assert!(diagnostics[0].message.contains("line 8"));
    // Duplicates are reported, not removed.
    assert_eq!(models[0].datasets[0].dimensions.len(), 2);
}

#[test]
fn test_n_duplicates_give_n_minus_one_diagnostics() {
    for n in 2..=5 {
        let mut source = String::from("semantic_model:\n  - name: sales\n    logical_datasets:\n");
        for _ in 0..n {
            source.push_str("      - name: orders\n        base_table: orders\n");
        }
        let (_, diagnostics) = resolve_source(&source, &RuleSettings::default());
        let locations = duplicate_locations(&diagnostics);
        assert_eq!(locations.len(), n - 1);
        // The first occurrence survives.
        assert!(!locations.contains(&"semantic_model[0].logical_datasets[0].name".to_string()));
    }
}

#[test]
fn test_duplicate_models() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    // Dataset names are scoped to their model.
    assert_eq!(duplicate_locations(&diagnostics), vec!["semantic_model[1].name"]);
}

#[test]
fn test_unnamed_relationships_never_collide() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
      - name: customers
        base_table: customers
    relationships:
      - from: orders
        to: customers
      - from: orders
        to: customers
      - name: link
        from: orders
        to: customers
      - name: link
        from: customers
        to: orders
"#;
    let (models, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(duplicate_locations(&diagnostics), vec!["semantic_model[0].relationships[3].name"]);
    assert!(models[0].relationships.iter().all(|r| r.is_resolved()));
}

#[test]
fn test_first_occurrence_wins_by_source_order() {
    // The fact is written before the dimension of the same name.
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        facts:
          - name: amount
            expr: amount
        dimensions:
          - name: amount
            expr: amount
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(
        duplicate_locations(&diagnostics),
        vec!["semantic_model[0].logical_datasets[0].dimensions[0].name"]
    );
    assert!(diagnostics[0].message.contains("fact"));
}

#[test]
fn test_derived_metrics_are_aggregates() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        metrics:
          - name: revenue
            expr: SUM(amount)
          - name: cost
            expr: SUM(unit_cost * quantity)
          - name: margin
            expr: revenue - cost
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_extra_aggregate_functions() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        metrics:
          - name: customers
            expr: APPROX_COUNT_DISTINCT(customer_id)
          - name: middle
            expr: median(amount)
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    let codes: Vec<Code> = diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![Code::NonAggregateMetric, Code::NonAggregateMetric]);

    let settings = RuleSettings {
        extra_aggregate_functions: vec!["approx_*".to_string(), "median".to_string()],
        ..RuleSettings::default()
    };
    let (_, diagnostics) = resolve_source(source, &settings);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[derive(Debug)]
struct NothingAggregates;

impl AggregateRule for NothingAggregates {
    fn is_aggregate(&self, _expr: &str) -> bool {
        false
    }

    fn describe(&self) -> String {
        "nothing".to_string()
    }
}

#[test]
fn test_custom_aggregate_rule() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        metrics:
          - name: revenue
            expr: SUM(amount)
"#;
    let parsed = yaml::parse(source);
    let mut models = mapper::map(parsed.tree.as_ref()).models;
    let diagnostics =
        resolver::resolve_with(&mut models, &RuleSettings::default(), &NothingAggregates);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, Code::NonAggregateMetric);
    assert_eq!(
        diagnostics[0].suggestion.as_deref(),
        Some("wrap the expression in one of: nothing")
    );
}

#[test]
fn test_expression_named_like_itself_is_not_self_reference() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        dimensions:
          - name: region
            expr: region
        facts:
          - name: amount
            expr: region
"#;
    // `amount` names a dimension, not another fact.
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

fn rendered(diagnostics: &[Diagnostic]) -> Vec<String> {
    let mut lines: Vec<String> = diagnostics
        .iter()
        .map(|d| format!("{} {} {}", d.location, d.code, d.severity))
        .collect();
    lines.sort();
    lines
}

const TPCDS_PROBLEMS: &str = r#"
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
          - name: ss_item_sk
            expression:
              dialects:
                - dialect: ANSI_SQL
                  expression: ss_item_sk +
    metrics:
      - name: total_sales
        expression:
          dialects:
            - dialect: ANSI_SQL
              expression: SUM(store_sales.ss_sales_price)
      - name: total_sales
        expression:
          dialects:
            - dialect: ANSI_SQL
              expression: SUM(
"#;

#[test]
fn test_fields_and_model_metrics_are_checked() {
    let settings = RuleSettings {
        sql_dialect: Some("ansi".to_string()),
        ..RuleSettings::default()
    };
    let (_, diagnostics) = resolve_source(TPCDS_PROBLEMS, &settings);
    assert_eq!(
        rendered(&diagnostics),
        vec![
            "semantic_model[0].datasets[0].fields[1].expression.dialects[0].expression INVALID_SQL_EXPRESSION warning",
            "semantic_model[0].datasets[0].fields[1].name DUPLICATE_NAME error",
            "semantic_model[0].metrics[1].expression.dialects[0].expression INVALID_SQL_EXPRESSION warning",
            "semantic_model[0].metrics[1].expression.dialects[0].expression UNBALANCED_EXPRESSION error",
            "semantic_model[0].metrics[1].name DUPLICATE_NAME error",
        ]
    );
    let metric = diagnostics
        .iter()
        .find(|d| d.code == Code::DuplicateName && d.location.to_string().contains("metrics"))
        .unwrap();
    assert!(metric.message.contains("duplicate metric name `total_sales`"));
}

#[test]
fn test_each_dialect_is_checked_in_its_own_dialect() {
    let source = r#"
semantic_model:
  - name: tpcds
    datasets:
      - name: store_sales
        base_table: tpcds.store_sales
        fields:
          - name: price
            expression:
              dialects:
                - dialect: SNOWFLAKE
                  expression: ss_sales_price::number
                - dialect: MDX
                  expression: "[Measures].[Sales Price] WITH MEMBER"
                - dialect: TABLEAU
                  expression: "{FIXED : SUM([Sales])}"
                - dialect: ORACLE
                  expression: ss_sales_price = = 1
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    let located: Vec<String> = diagnostics.iter().map(|d| d.location.to_string()).collect();
    assert_eq!(
        located,
        vec!["semantic_model[0].datasets[0].fields[0].expression.dialects[3].expression"]
    );
    assert_eq!(diagnostics[0].code, Code::InvalidSqlExpression);
    assert!(diagnostics[0].message.contains("not valid ansi SQL"));

    let settings = RuleSettings {
        check_dialect_expressions: false,
        ..RuleSettings::default()
    };
    let (_, diagnostics) = resolve_source(source, &settings);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_model_metric_aggregates_in_some_dialect() {
    let source = r#"
semantic_model:
  - name: tpcds
    datasets:
      - name: store_sales
        base_table: tpcds.store_sales
    metrics:
      - name: total_sales
        expression:
          dialects:
            - dialect: MDX
              expression: "[Measures].[Sales]"
            - dialect: ANSI_SQL
              expression: SUM(ss_sales_price)
      - name: price
        expression:
          dialects:
            - dialect: ANSI_SQL
              expression: ss_sales_price
      - name: average_sale
        expression:
          dialects:
            - expression: total_sales / ticket_count
"#;
    let (_, diagnostics) = resolve_source(source, &RuleSettings::default());
    let located: Vec<String> = diagnostics.iter().map(|d| d.location.to_string()).collect();
    assert_eq!(
        located,
        vec!["semantic_model[0].metrics[1].expression.dialects[0].expression"]
    );
    assert_eq!(diagnostics[0].code, Code::NonAggregateMetric);
}

#[test]
fn test_misspelled_dialect_turns_the_sql_check_off() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders
        filters:
          - name: eu_only
            expr: region = = 'EU'
"#;
    let settings = RuleSettings {
        sql_dialect: Some("snowflak".to_string()),
        ..RuleSettings::default()
    };
    let (_, diagnostics) = resolve_source(source, &settings);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_endpoints_link_to_first_dataset_of_a_name() {
    let source = r#"
semantic_model:
  - name: sales
    logical_datasets:
      - name: orders
        base_table: orders_v1
      - name: orders
        base_table: orders_v2
      - name: customers
        base_table: customers
    relationships:
      - from: orders
        to: customers
"#;
    let (models, diagnostics) = resolve_source(source, &RuleSettings::default());
    assert_eq!(duplicate_locations(&diagnostics).len(), 1);
    let relationship = &models[0].relationships[0];
    assert_eq!(relationship.from.resolved, Some(DatasetId(0)));
    assert_eq!(relationship.to.resolved, Some(DatasetId(2)));
}
