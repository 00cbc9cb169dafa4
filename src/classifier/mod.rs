//! Text → hazard category inference behind a narrow trait.
//!
//! The resolver only depends on [`Classifier`]. Two implementations ship with
//! the crate: [`ExampleClassifier`] scores input against labeled examples in
//! process, and [`CommandClassifier`] hands the text to an external model
//! process with a bounded run time.

pub mod command;
pub mod examples;

use crate::catalog::HazardCategory;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub use command::CommandClassifier;
pub use examples::{ExampleClassifier, MAX_INPUT_TOKENS};

/// A category assignment for one input text.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub category: HazardCategory,
    /// Classifier-specific score in `[0, 1]`, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Classification {
    pub fn new(category: HazardCategory) -> Self {
        Self {
            category,
            confidence: None,
        }
    }

    pub fn with_confidence(category: HazardCategory, confidence: f32) -> Self {
        Self {
            category,
            confidence: Some(confidence.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("input text is empty")]
    EmptyInput,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("inference timed out after {0:?}")]
    TimedOut(Duration),
    #[error("classifier produced unusable output: {0}")]
    InvalidOutput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability that maps free text to a hazard category.
///
/// Implementations are constructed once per process and shared across
/// requests, so `classify` takes `&self` and must not keep per-call state.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification, ClassificationError>;

    /// The closed set of categories this classifier can emit. An empty list
    /// means the backend does not declare its range.
    fn declared_categories(&self) -> Vec<HazardCategory> {
        Vec::new()
    }

    /// Short name used in logs.
    fn name(&self) -> &str;
}
