//! Document paths used to locate diagnostics.
//!
//! A [`Location`] is the dotted path from the document root to the node a
//! diagnostic refers to, e.g. `semantic_model[0].logical_datasets[2].metrics[1].expr`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
}

/// Rank of a key in the canonical presentation order.
///
/// Keys that share a rank (aliases) order alphabetically; unknown keys come
/// last. Report order must not depend on the key order in the source.
fn key_rank(key: &str) -> u8 {
    match key {
        "semantic_model" => 0,
        "name" => 1,
        "description" => 2,
        "base_table" => 3,
        "unique_keys" => 4,
        "logical_datasets" | "tables" | "datasets" => 5,
        "dimensions" => 6,
        "metrics" => 7,
        "facts" => 8,
        "filters" => 9,
        "fields" => 10,
        "relationships" => 11,
        "from" => 12,
        "to" => 13,
        "kind" => 14,
        "expr" | "expression" => 15,
        "dialects" => 16,
        "dialect" => 17,
        "ai_context" => 20,
        "extension" => 21,
        _ => 30,
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Index(a), Segment::Index(b)) => a.cmp(b),
            (Segment::Key(a), Segment::Key(b)) => key_rank(a)
                .cmp(&key_rank(b))
                .then_with(|| a.cmp(b)),
            (Segment::Index(_), Segment::Key(_)) => Ordering::Less,
            (Segment::Key(_), Segment::Index(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A path from the document root. A path sorts before every path it prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    segments: Vec<Segment>,
}

impl Location {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Child location under a mapping key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// Child location at a sequence index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true for the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &Location) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
