//! Generic positioned document tree.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static INT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?(?:[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$").unwrap());

static FLOAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?$").unwrap()
});

/// A position in the source text. Lines and columns are 1-based and count
/// characters; `offset` is the byte offset from the start of the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

/// How a scalar was written. Only plain scalars are subject to type
/// resolution; quoted and block scalars are always strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// A scalar resolved with the YAML core schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
}

/// A tree node with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar { text: String, style: ScalarStyle },
    Sequence(Vec<Node>),
    Mapping(Vec<Entry>),
}

/// A mapping entry. Keys are always strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub key_position: Position,
    pub value: Node,
}

impl Node {
    pub fn scalar(text: impl Into<String>, style: ScalarStyle, position: Position) -> Self {
        Self {
            kind: NodeKind::Scalar {
                text: text.into(),
                style,
            },
            position,
        }
    }

    /// An empty plain scalar, i.e. null.
    pub fn null(position: Position) -> Self {
        Self::scalar("", ScalarStyle::Plain, position)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.resolve(), Some(ScalarValue::Null))
    }

    /// Human-readable kind, used in type mismatch messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar { .. } => match self.resolve() {
                Some(ScalarValue::Null) => "null",
                Some(ScalarValue::Bool(_)) => "boolean",
                Some(ScalarValue::Int(_)) | Some(ScalarValue::Float(_)) => "number",
                _ => "string",
            },
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
        }
    }

    /// Resolve a scalar node with the core schema. Returns `None` for
    /// collections.
    pub fn resolve(&self) -> Option<ScalarValue<'_>> {
        let NodeKind::Scalar { text, style } = &self.kind else {
            return None;
        };
        if *style != ScalarStyle::Plain {
            return Some(ScalarValue::Str(text));
        }
        Some(resolve_plain(text))
    }

    /// Text of a non-null scalar.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { text, .. } if !self.is_null() => Some(text),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[Entry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a mapping entry by key.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.as_mapping()?.iter().find(|e| e.key == key)
    }

    /// Convert into an order-preserving `serde_yaml::Value`, discarding
    /// positions.
    pub fn to_value(&self) -> serde_yaml::Value {
        use serde_yaml::Value;

        match &self.kind {
            NodeKind::Scalar { text, .. } => match self.resolve() {
                Some(ScalarValue::Null) => Value::Null,
                Some(ScalarValue::Bool(b)) => Value::Bool(b),
                Some(ScalarValue::Int(i)) => Value::Number(i.into()),
                Some(ScalarValue::Float(f)) => Value::Number(f.into()),
                _ => Value::String(text.clone()),
            },
            NodeKind::Sequence(items) => Value::Sequence(items.iter().map(Node::to_value).collect()),
            NodeKind::Mapping(entries) => {
                let mut mapping = serde_yaml::Mapping::new();
                for entry in entries {
                    mapping.insert(Value::String(entry.key.clone()), entry.value.to_value());
                }
                Value::Mapping(mapping)
            }
        }
    }
}

fn resolve_plain(text: &str) -> ScalarValue<'_> {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return ScalarValue::Null,
        "true" | "True" | "TRUE" => return ScalarValue::Bool(true),
        "false" | "False" | "FALSE" => return ScalarValue::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return ScalarValue::Float(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return ScalarValue::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return ScalarValue::Float(f64::NAN),
        _ => {}
    }
    if INT_PATTERN.is_match(text) {
        if let Some(value) = parse_int(text) {
            return ScalarValue::Int(value);
        }
        // Out of i64 range: keep the digits as a string rather than lose them.
        return ScalarValue::Str(text);
    }
    if FLOAT_PATTERN.is_match(text) {
        if let Ok(value) = text.parse::<f64>() {
            return ScalarValue::Float(value);
        }
    }
    ScalarValue::Str(text)
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = if let Some(oct) = digits.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}
