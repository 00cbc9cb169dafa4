//! Labeled example sets used to build the example classifier.
//!
//! The file format is a label mapping plus a list of `{"prompt", "label"}`
//! pairs. Labels are symbolic on disk and resolved to hazard categories at
//! load time; an example with an unmapped label is a load error.

use crate::catalog::HazardCategory;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub prompt: String,
    pub label: String,
}

#[derive(Clone, Debug, Deserialize)]
struct TrainingFile {
    #[serde(default)]
    labels: Option<BTreeMap<String, HazardCategory>>,
    examples: Vec<LabeledExample>,
}

/// Label mapping plus examples, with every label already resolved.
#[derive(Clone, Debug)]
pub struct TrainingSet {
    labels: BTreeMap<String, HazardCategory>,
    examples: Vec<(LabeledExample, HazardCategory)>,
}

/// Label mapping the model was fine-tuned with.
pub fn default_label_mapping() -> BTreeMap<String, HazardCategory> {
    BTreeMap::from([
        ("PROCESS".to_string(), HazardCategory(0)),
        ("TOOL_FAILURE".to_string(), HazardCategory(1)),
        ("COLLISION".to_string(), HazardCategory(2)),
        ("OPERATIONAL_ERROR".to_string(), HazardCategory(3)),
    ])
}

impl TrainingSet {
    pub fn new(
        labels: BTreeMap<String, HazardCategory>,
        examples: impl IntoIterator<Item = LabeledExample>,
    ) -> Result<Self> {
        if labels.is_empty() {
            bail!("label mapping must not be empty");
        }
        let mut resolved = Vec::new();
        for (idx, example) in examples.into_iter().enumerate() {
            if example.prompt.trim().is_empty() {
                bail!("example {} has an empty prompt", idx + 1);
            }
            let Some(category) = labels.get(&example.label).copied() else {
                bail!(
                    "example {} uses unknown label '{}' (expected one of {:?})",
                    idx + 1,
                    example.label,
                    labels.keys().collect::<Vec<_>>()
                );
            };
            resolved.push((example, category));
        }
        if resolved.is_empty() {
            bail!("training set contains no examples");
        }
        Ok(Self {
            labels,
            examples: resolved,
        })
    }

    /// Read a training file; a missing `labels` table falls back to
    /// [`default_label_mapping`].
    pub fn load(path: &Path) -> Result<Self> {
        let data =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let file: TrainingFile = serde_json::from_str(&data)
            .with_context(|| format!("parsing training data {}", path.display()))?;
        let labels = file.labels.unwrap_or_else(default_label_mapping);
        Self::new(labels, file.examples)
            .with_context(|| format!("validating training data {}", path.display()))
    }

    pub fn labels(&self) -> &BTreeMap<String, HazardCategory> {
        &self.labels
    }

    pub fn examples(&self) -> impl Iterator<Item = (&LabeledExample, HazardCategory)> {
        self.examples
            .iter()
            .map(|(example, category)| (example, *category))
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Every category the mapping can produce.
    pub fn declared_categories(&self) -> BTreeSet<HazardCategory> {
        self.labels.values().copied().collect()
    }
}
