//! Structural parser for semantic model documents.
//!
//! Parses the block subset of YAML used by semantic model files into a
//! generic positioned tree ([`Node`]). The parser never fails outright:
//! malformed lines become `SYNTAX_ERROR` diagnostics and parsing resumes at
//! the next line of the enclosing mapping, so the tree is a best-effort
//! partial result whenever errors were reported.
//!
//! Supported syntax:
//!
//! - **Block collections**: mappings and sequences, including sequences
//!   written at the same indentation as their parent key
//! - **Scalars**: plain, single-quoted, double-quoted (multi-line allowed),
//!   literal (`|`) and folded (`>`) block scalars with chomping indicators
//! - **Flow collections**: `[a, b]` and `{k: v}` on a single line
//! - **Comments** and a leading `---` document marker
//!
//! Anchors, aliases, tags and multi-document streams are rejected with a
//! `SYNTAX_ERROR`.
//!
//! # Example
//!
//! ```
//! use osi::yaml;
//!
//! let result = yaml::parse("semantic_model:\n  - name: sales\n");
//! assert!(result.is_ok());
//! let root = result.tree.unwrap();
//! assert!(root.get("semantic_model").is_some());
//! ```

mod lexer;
mod node;
mod parser;
mod scanner;

pub use node::{Entry, Node, NodeKind, Position, ScalarStyle, ScalarValue};

use crate::diagnostics::{Diagnostic, Severity};

/// Result of parsing a document.
#[derive(Debug)]
pub struct ParseResult {
    /// The parsed tree, `None` for an empty document.
    pub tree: Option<Node>,
    /// Syntax diagnostics, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Returns true if parsing produced a tree without errors.
    pub fn is_ok(&self) -> bool {
        self.tree.is_some() && !self.has_errors()
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns only the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

/// Parse a document.
pub fn parse(source: &str) -> ParseResult {
    let (tree, diagnostics) = parser::Parser::new(source).parse();
    tracing::debug!(
        lines = source.lines().count(),
        diagnostics = diagnostics.len(),
        "parsed document"
    );
    ParseResult { tree, diagnostics }
}
