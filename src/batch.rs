//! Concurrent validation of many documents.
//!
//! Each document is validated on its own blocking worker, with at most
//! `batch.max_workers` running at once. Documents never share state, so the
//! per-document diagnostic ordering guarantees hold unchanged. Cancellation
//! is checked before a worker starts a document; a document that has started
//! always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Settings;
use crate::pipeline::{validate_source, Report};

/// Error type for batch validation.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Invalid batch settings: {0}")]
    InvalidSettings(String),
}

/// A named document to validate.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub source: String,
}

impl Document {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// What happened to one document of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed { name: String, report: Report },
    Cancelled { name: String },
    Failed { name: String, error: String },
}

impl BatchOutcome {
    pub fn name(&self) -> &str {
        match self {
            BatchOutcome::Completed { name, .. }
            | BatchOutcome::Cancelled { name }
            | BatchOutcome::Failed { name, .. } => name,
        }
    }

    /// Returns true if the document was validated without errors.
    pub fn is_ok(&self) -> bool {
        matches!(self, BatchOutcome::Completed { report, .. } if report.ok())
    }
}

/// Cooperative cancellation flag shared by a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents not yet started will be reported as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Validate documents concurrently. Outcomes are returned in input order.
pub async fn validate_batch(
    documents: Vec<Document>,
    settings: Arc<Settings>,
    cancel: CancelToken,
) -> Result<Vec<BatchOutcome>, BatchError> {
    let workers = settings.batch.max_workers;
    if workers == 0 {
        return Err(BatchError::InvalidSettings(
            "max_workers must be at least 1".to_string(),
        ));
    }

    let semaphore = Arc::new(Semaphore::new(workers));
    let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
    let mut tasks = JoinSet::new();

    for (index, document) in documents.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let settings = Arc::clone(&settings);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let name = document.name.clone();
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let error = e.to_string();
                    return (index, BatchOutcome::Failed { name, error });
                }
            };
            if cancel.is_cancelled() {
                tracing::debug!(document = %name, "cancelled before start");
                return (index, BatchOutcome::Cancelled { name });
            }

            let joined =
                tokio::task::spawn_blocking(move || validate_source(&document.source, &settings))
                    .await;
            let outcome = match joined {
                Ok(report) => {
                    tracing::info!(
                        document = %name,
                        ok = report.ok(),
                        diagnostics = report.result.diagnostics.len(),
                        "validated document"
                    );
                    BatchOutcome::Completed { name, report }
                }
                Err(e) => {
                    tracing::error!(document = %name, error = %e, "validation worker failed");
                    BatchOutcome::Failed {
                        name,
                        error: e.to_string(),
                    }
                }
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<BatchOutcome>> = names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "batch task failed"),
        }
    }

    Ok(slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| BatchOutcome::Failed {
                name,
                error: "worker did not report a result".to_string(),
            })
        })
        .collect())
}
