use osi::yaml::{self, Node, NodeKind, Position, ScalarStyle, ScalarValue};
use osi::Code;

fn parse_ok(source: &str) -> Node {
    let result = yaml::parse(source);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    result.tree.expect("document should not be empty")
}

fn value<'a>(node: &'a Node, key: &str) -> &'a Node {
    &node.get(key).unwrap_or_else(|| panic!("missing key {}", key)).value
}

fn messages(source: &str) -> Vec<String> {
    yaml::parse(source)
        .diagnostics
        .iter()
        .map(|d| {
            assert_eq!(d.code, Code::SyntaxError);
            d.message.clone()
        })
        .collect()
}

// ============================================================================
// Block collections
// ============================================================================

#[test]
fn test_nested_mapping_and_sequence() {
    let root = parse_ok("semantic_model:\n  - name: sales\n    description: Sales model\n");
    let models = value(&root, "semantic_model");
    let items = models.as_sequence().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(value(&items[0], "name").as_str(), Some("sales"));
    assert_eq!(value(&items[0], "description").as_str(), Some("Sales model"));
}

#[test]
fn test_positions() {
    let root = parse_ok("semantic_model:\n  - name: sales\n");
    assert_eq!(root.position, Position::new(1, 1, 0));

    let models = value(&root, "semantic_model");
    // Sequences start at their first dash.
    assert_eq!(models.position, Position::new(2, 3, 18));

    let model = &models.as_sequence().unwrap()[0];
    let name = model.get("name").unwrap();
    assert_eq!(name.key_position, Position::new(2, 5, 20));
    assert_eq!(name.value.position, Position::new(2, 11, 26));
}

#[test]
fn test_sequence_at_key_indentation() {
    let root = parse_ok("items:\n- a\n- b\nnext: 1\n");
    let items: Vec<&str> = value(&root, "items")
        .as_sequence()
        .unwrap()
        .iter()
        .map(|n| n.as_str().unwrap())
        .collect();
    assert_eq!(items, vec!["a", "b"]);
    assert_eq!(value(&root, "next").resolve(), Some(ScalarValue::Int(1)));
}

#[test]
fn test_null_values() {
    let root = parse_ok("a:\nb: ~\nc: null\n");
    assert!(value(&root, "a").is_null());
    assert!(value(&root, "b").is_null());
    assert!(value(&root, "c").is_null());
}

#[test]
fn test_comments_are_ignored() {
    let root = parse_ok("# header\na: 1 # trailing\n\n# between\nb: 'x # not a comment'\n");
    assert_eq!(value(&root, "a").as_str(), Some("1"));
    assert_eq!(value(&root, "b").as_str(), Some("x # not a comment"));
}

#[test]
fn test_document_start_marker_and_bom() {
    let root = parse_ok("---\na: 1\n");
    assert!(root.get("a").is_some());

    let root = parse_ok("\u{feff}a: 1\n");
    let entry = root.get("a").unwrap();
    assert_eq!(entry.key_position.offset, 3);
    assert_eq!(entry.key_position.column, 1);
}

#[test]
fn test_empty_document() {
    let result = yaml::parse("");
    assert!(result.tree.is_none());
    assert!(result.diagnostics.is_empty());

    let result = yaml::parse("# nothing here\n\n");
    assert!(result.tree.is_none());
    assert!(result.diagnostics.is_empty());
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_quoted_scalars() {
    let root = parse_ok("a: \"tab\\there\"\nb: 'it''s'\nc: \"42\"\n");
    assert_eq!(value(&root, "a").as_str(), Some("tab\there"));
    assert_eq!(value(&root, "b").as_str(), Some("it's"));
    let c = value(&root, "c");
    assert_eq!(c.resolve(), Some(ScalarValue::Str("42")));
    assert!(matches!(
        c.kind,
        NodeKind::Scalar {
            style: ScalarStyle::DoubleQuoted,
            ..
        }
    ));
}

#[test]
fn test_multi_line_plain_scalar() {
    let root = parse_ok("expr: SUM(a)\n  + SUM(b)\nnext: x\n");
    assert_eq!(value(&root, "expr").as_str(), Some("SUM(a) + SUM(b)"));
    assert_eq!(value(&root, "next").as_str(), Some("x"));
}

#[test]
fn test_literal_block_scalar() {
    let root = parse_ok("description: |\n  line one\n  line two\nother: x\n");
    assert_eq!(value(&root, "description").as_str(), Some("line one\nline two\n"));
    assert_eq!(value(&root, "other").as_str(), Some("x"));
}

#[test]
fn test_folded_block_scalar_with_strip() {
    let root = parse_ok("description: >-\n  first\n  second\n\n  third\n");
    assert_eq!(value(&root, "description").as_str(), Some("first second\nthird"));
}

#[test]
fn test_keep_chomping() {
    let root = parse_ok("text: |+\n  kept\n\nnext: 1\n");
    assert_eq!(value(&root, "text").as_str(), Some("kept\n\n"));
}

#[test]
fn test_flow_collections() {
    let root = parse_ok("keys: [id, \"order id\"]\nmeta: {owner: finance, tags: [a, b]}\n");
    let keys: Vec<&str> = value(&root, "keys")
        .as_sequence()
        .unwrap()
        .iter()
        .map(|n| n.as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["id", "order id"]);

    let meta = value(&root, "meta");
    assert_eq!(value(meta, "owner").as_str(), Some("finance"));
    assert_eq!(value(meta, "tags").as_sequence().unwrap().len(), 2);
}

#[test]
fn test_empty_flow_collections() {
    let root = parse_ok("a: []\nb: {}\n");
    assert_eq!(value(&root, "a").as_sequence().unwrap().len(), 0);
    assert_eq!(value(&root, "b").as_mapping().unwrap().len(), 0);
}

// ============================================================================
// Errors and recovery
// ============================================================================

#[test]
fn test_recovers_after_broken_line() {
    let result = yaml::parse("a: 1\nthis is broken\nb: 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, Code::SyntaxError);
    assert_eq!(diag.position.map(|p| p.line), Some(2));

    let root = result.tree.unwrap();
    assert!(root.get("a").is_some());
    assert!(root.get("b").is_some());
}

#[test]
fn test_reports_every_independent_error() {
    let source = "a: 1\nbroken one\nb: 2\nbroken two\nc: 3\n";
    assert_eq!(messages(source).len(), 2);
}

#[test]
fn test_duplicate_key_keeps_first() {
    let result = yaml::parse("a: 1\na: 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert!(diag.message.contains("duplicate key `a`"));
    assert_eq!(diag.location.to_string(), "a");
    assert_eq!(diag.position.map(|p| p.line), Some(2));

    let root = result.tree.unwrap();
    assert_eq!(value(&root, "a").as_str(), Some("1"));
}

#[test]
fn test_tab_indentation() {
    let messages = messages("a:\n\tb: 1\n");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("tab"));
}

#[test]
fn test_unexpected_indentation() {
    let result = yaml::parse("a: 1\n    b: 2\nc: 3\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("indentation"));
    assert!(result.tree.unwrap().get("c").is_some());
}

#[test]
fn test_multiple_documents_rejected() {
    let result = yaml::parse("a: 1\n---\nb: 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("multiple documents"));
    let root = result.tree.unwrap();
    assert!(root.get("a").is_some());
    assert!(root.get("b").is_none());
}

#[test]
fn test_anchors_and_tags_rejected() {
    let messages = messages("a: &anchor 1\nb: !tag x\n");
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.contains("not supported")));
}

#[test]
fn test_unterminated_quote_recovers() {
    let result = yaml::parse("a: \"abc\nb: 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("unterminated"));
    let root = result.tree.unwrap();
    assert!(value(&root, "a").is_null());
    assert!(root.get("b").is_some());
}

#[test]
fn test_unterminated_flow_sequence() {
    let result = yaml::parse("keys: [a, b\nnext: 1\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("unterminated flow sequence"));
    assert!(result.tree.unwrap().get("next").is_some());
}

#[test]
fn test_syntax_error_locations() {
    let result = yaml::parse("semantic_model:\n  - name: sales\n    oops\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].location.to_string(), "semantic_model[0]");
}

#[test]
fn test_flow_mapping_keeps_colons_inside_values() {
    let root = parse_ok("link: {url: http://x.io/a, note: 'a: b'}\n");
    let link = value(&root, "link");
    assert_eq!(value(link, "url").as_str(), Some("http://x.io/a"));
    assert_eq!(value(link, "note").as_str(), Some("a: b"));
}

#[test]
fn test_flow_mapping_duplicate_key() {
    let result = yaml::parse("meta: {a: 1, a: 2}\n");
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert!(diag.message.contains("duplicate key `a`"));
    assert_eq!(diag.location.to_string(), "meta.a");
    assert_eq!(diag.position.map(|p| p.column), Some(14));
    assert_eq!(value(value(&result.tree.unwrap(), "meta"), "a").as_str(), Some("1"));
}

#[test]
fn test_flow_errors_point_at_the_token() {
    let result = yaml::parse("keys: [a {b}]\nnext: 1\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("expected `,` or `]`"));
    assert_eq!(result.diagnostics[0].position.map(|p| p.column), Some(10));

    let result = yaml::parse("keys: [\"\\q\"]\n");
    assert!(result.diagnostics[0].message.contains("invalid escape sequence"));

    let result = yaml::parse("keys: [a] extra\n");
    assert!(result.diagnostics[0].message.contains("after flow collection"));
}
