//! Deserializable representation of `config/mitigations.json`.
//!
//! The types mirror the catalog schema so helpers and tests can reason about
//! mitigation content without ad-hoc JSON handling. Use `MitigationCatalog`
//! for validation and lookup; use these structs when the raw file surface is
//! required (metadata, labels).

use crate::catalog::identity::{CatalogKey, HazardCategory};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Title of the canonical record returned when no mitigation applies.
pub const UNDEFINED_MITIGATION_TITLE: &str = "Mitigation step not defined for this hazard";

#[derive(Clone, Debug, Deserialize)]
/// Full mitigation catalog as stored on disk.
pub struct CatalogFile {
    pub schema_version: String,
    pub catalog: CatalogMetadata,
    pub categories: Vec<CategoryEntry>,
}

#[derive(Clone, Debug, Deserialize)]
/// Identifies the catalog snapshot.
pub struct CatalogMetadata {
    pub key: CatalogKey,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
/// One hazard category and the mitigation served for it.
pub struct CategoryEntry {
    pub id: HazardCategory,
    #[serde(default)]
    pub label: Option<String>,
    pub mitigation: MitigationRecord,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// Structured remediation content for one hazard category.
///
/// Records are never rewritten after load; display formatting lives in
/// [`crate::render`].
pub struct MitigationRecord {
    pub title: String,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl MitigationRecord {
    pub fn new(title: impl Into<String>, risks: Vec<String>, actions: Vec<String>) -> Self {
        Self {
            title: title.into(),
            risks,
            actions,
        }
    }

    /// The canonical fallback record.
    pub fn undefined() -> Self {
        Self::new(UNDEFINED_MITIGATION_TITLE, Vec::new(), Vec::new())
    }

    pub fn is_undefined(&self) -> bool {
        self.title == UNDEFINED_MITIGATION_TITLE && self.risks.is_empty() && self.actions.is_empty()
    }
}

/// Read and parse a mitigation catalog from disk without additional validation.
pub fn load_catalog_from_path(path: &Path) -> Result<CatalogFile> {
    let data = fs::read_to_string(path)?;
    let catalog: CatalogFile = serde_json::from_str(&data)?;
    Ok(catalog)
}
