//! # OSI
//!
//! Validator and normalizer for Open Semantic Interchange semantic models.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 YAML Source (one document)               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [yaml]
//! ┌─────────────────────────────────────────────────────────┐
//! │           Positioned Tree + SYNTAX_ERROR diagnostics     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [mapper]
//! ┌─────────────────────────────────────────────────────────┐
//! │      SemanticModel / LogicalDataset / Relationship       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolver + expr]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Resolved endpoints, duplicate and expression checks  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │          ValidationResult (ok + ordered diagnostics)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [normalize]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    CanonicalModel                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`pipeline::validate_source`] runs every stage for one document;
//! [`batch::validate_batch`] runs many documents concurrently.

pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod expr;
pub mod mapper;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod validation;
pub mod yaml;

pub use diagnostics::{Code, Diagnostic, Location, Severity};
pub use pipeline::{validate_source, Report};
