//! Validated, read-only view of a mitigation catalog.
//!
//! The catalog enforces the expected schema version and provides total lookup
//! by hazard category. It is strict about duplicates and blank content so a
//! misconfigured file fails at startup rather than producing empty advice at
//! request time.

use crate::catalog::identity::{CatalogKey, HazardCategory};
use crate::catalog::model::{CatalogFile, CategoryEntry, MitigationRecord, load_catalog_from_path};
use crate::schema_loader::{is_identifier, load_json_schema, validate_instance};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// The only catalog layout this crate understands.
pub const CATALOG_SCHEMA_VERSION: &str = "hazard_catalog_v1";

const CATALOG_SCHEMA_RELATIVE_PATH: &str = "schema/mitigation_catalog.schema.json";

#[derive(Debug)]
/// Mitigation records keyed by hazard category, plus the undefined fallback.
pub struct MitigationCatalog {
    key: CatalogKey,
    title: String,
    records: BTreeMap<HazardCategory, MitigationRecord>,
    labels: BTreeMap<HazardCategory, String>,
    undefined: MitigationRecord,
}

impl MitigationCatalog {
    /// Load and validate the catalog from disk.
    ///
    /// Validates against the JSON schema first, then applies the structural
    /// checks the schema cannot express (unique ids and labels, no blank
    /// lines).
    pub fn load(path: &Path) -> Result<Self> {
        validate_against_schema(path)?;

        let file =
            load_catalog_from_path(path).with_context(|| format!("loading {}", path.display()))?;
        let catalog = Self::from_file(file)?;
        log::info!(
            "loaded mitigation catalog {} ({} categories) from {}",
            catalog.key.0,
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Build a catalog from an already parsed file.
    pub fn from_file(file: CatalogFile) -> Result<Self> {
        validate_schema_version(&file.schema_version)?;
        if !is_identifier(&file.catalog.key.0) {
            bail!(
                "catalog.key must match ^[A-Za-z0-9_.-]+$, got '{}'",
                file.catalog.key.0
            );
        }
        if file.catalog.title.trim().is_empty() {
            bail!("catalog.title must not be empty");
        }
        Self::build(file.catalog.key, file.catalog.title, file.categories)
    }

    /// Build a catalog in code, e.g. for embedding or tests.
    pub fn from_entries(
        key: CatalogKey,
        title: impl Into<String>,
        entries: impl IntoIterator<Item = CategoryEntry>,
    ) -> Result<Self> {
        Self::build(key, title.into(), entries.into_iter().collect())
    }

    fn build(key: CatalogKey, title: String, entries: Vec<CategoryEntry>) -> Result<Self> {
        if entries.is_empty() {
            bail!("catalog contains no categories");
        }

        let mut records = BTreeMap::new();
        let mut labels = BTreeMap::new();
        let mut seen_labels = BTreeSet::new();
        for entry in entries {
            if records.contains_key(&entry.id) {
                bail!("duplicate category id {}", entry.id);
            }
            validate_record(entry.id, &entry.mitigation)?;
            if let Some(label) = entry.label {
                let label = label.trim().to_string();
                if label.is_empty() {
                    bail!("category {} has an empty label", entry.id);
                }
                if !seen_labels.insert(label.clone()) {
                    bail!("duplicate category label {label}");
                }
                labels.insert(entry.id, label);
            }
            records.insert(entry.id, entry.mitigation);
        }

        Ok(Self {
            key,
            title,
            records,
            labels,
            undefined: MitigationRecord::undefined(),
        })
    }

    /// The catalog key declared in the loaded file.
    pub fn key(&self) -> &CatalogKey {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Resolve a category, returning `None` for ids without an entry.
    pub fn get(&self, category: HazardCategory) -> Option<&MitigationRecord> {
        self.records.get(&category)
    }

    /// Total lookup: ids without an entry map to the undefined record.
    pub fn lookup(&self, category: HazardCategory) -> &MitigationRecord {
        self.get(category).unwrap_or(&self.undefined)
    }

    /// The canonical record served when no mitigation applies.
    pub fn undefined(&self) -> &MitigationRecord {
        &self.undefined
    }

    pub fn label(&self, category: HazardCategory) -> Option<&str> {
        self.labels.get(&category).map(String::as_str)
    }

    /// Reverse lookup from a symbolic label (case-insensitive).
    pub fn category_for_label(&self, label: &str) -> Option<HazardCategory> {
        let wanted = label.trim();
        self.labels
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(wanted))
            .map(|(category, _)| *category)
    }

    /// Iterates category ids in stable order.
    pub fn categories(&self) -> impl Iterator<Item = HazardCategory> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Declared classifier outputs that have no catalog entry.
    ///
    /// A non-empty result is a configuration defect; the resolver still
    /// answers those ids with the undefined record.
    pub fn coverage_gaps<I>(&self, declared: I) -> Vec<HazardCategory>
    where
        I: IntoIterator<Item = HazardCategory>,
    {
        declared
            .into_iter()
            .filter(|category| !self.records.contains_key(category))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn validate_schema_version(schema_version: &str) -> Result<()> {
    if schema_version.is_empty() {
        bail!("schema_version must not be empty");
    }
    if schema_version != CATALOG_SCHEMA_VERSION {
        bail!(
            "schema_version '{}' not supported (expected {})",
            schema_version,
            CATALOG_SCHEMA_VERSION
        );
    }
    Ok(())
}

fn validate_record(category: HazardCategory, record: &MitigationRecord) -> Result<()> {
    if record.title.trim().is_empty() {
        bail!("category {category} has an empty mitigation title");
    }
    if record.risks.iter().any(|risk| risk.trim().is_empty()) {
        bail!("category {category} lists an empty risk statement");
    }
    if record.actions.iter().any(|action| action.trim().is_empty()) {
        bail!("category {category} lists an empty mitigation action");
    }
    Ok(())
}

fn validate_against_schema(catalog_path: &Path) -> Result<()> {
    let catalog_file = File::open(catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;
    let catalog_value: Value = serde_json::from_reader(BufReader::new(catalog_file))
        .with_context(|| format!("parsing catalog {}", catalog_path.display()))?;

    let schema_path = resolve_catalog_schema_path(catalog_path);
    let allowed = BTreeSet::from([CATALOG_SCHEMA_VERSION.to_string()]);
    let schema = load_json_schema(&schema_path, Some(&allowed))
        .with_context(|| format!("loading catalog schema {}", schema_path.display()))?;

    if let Err(details) = validate_instance(&schema.compiled, &catalog_value) {
        bail!(
            "mitigation catalog {} failed schema validation:\n{}",
            catalog_path.display(),
            details
        );
    }
    log::debug!(
        "{} validated against {} ({})",
        catalog_path.display(),
        schema_path.display(),
        schema.schema_version
    );
    Ok(())
}

/// Prefer a schema shipped next to the catalog's config directory, then the
/// copy in this crate.
fn resolve_catalog_schema_path(catalog_path: &Path) -> PathBuf {
    if let Some(base) = catalog_path.parent().and_then(|p| p.parent()) {
        let candidate = base.join(CATALOG_SCHEMA_RELATIVE_PATH);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(CATALOG_SCHEMA_RELATIVE_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn entry(id: u32, label: Option<&str>, title: &str) -> CategoryEntry {
        CategoryEntry {
            id: HazardCategory(id),
            label: label.map(str::to_string),
            mitigation: MitigationRecord::new(title, vec![], vec![]),
        }
    }

    fn sample() -> MitigationCatalog {
        MitigationCatalog::from_entries(
            CatalogKey("test_v1".into()),
            "test",
            [
                entry(0, Some("PROCESS"), "Process failure"),
                entry(1, Some("TOOL_FAILURE"), "Gripper failure"),
            ],
        )
        .unwrap()
    }

    fn write_catalog(dir: &TempDir, value: &Value) -> PathBuf {
        let path = dir.path().join("mitigations.json");
        fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn lookup_is_total() {
        let catalog = sample();
        assert_eq!(catalog.lookup(HazardCategory(1)).title, "Gripper failure");
        assert!(catalog.get(HazardCategory(99)).is_none());
        assert!(catalog.lookup(HazardCategory(99)).is_undefined());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn labels_resolve_both_ways() {
        let catalog = sample();
        assert_eq!(catalog.label(HazardCategory(0)), Some("PROCESS"));
        assert_eq!(
            catalog.category_for_label("tool_failure"),
            Some(HazardCategory(1))
        );
        assert_eq!(catalog.category_for_label("FIRE"), None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = MitigationCatalog::from_entries(
            CatalogKey("dup".into()),
            "dup",
            [entry(2, None, "a"), entry(2, None, "b")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate category id 2"));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = MitigationCatalog::from_entries(
            CatalogKey("dup".into()),
            "dup",
            [entry(0, Some("FIRE"), "a"), entry(1, Some("FIRE"), "b")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate category label FIRE"));
    }

    #[test]
    fn blank_lines_are_rejected() {
        let bad = CategoryEntry {
            id: HazardCategory(0),
            label: None,
            mitigation: MitigationRecord::new("title", vec!["  ".into()], vec![]),
        };
        let err =
            MitigationCatalog::from_entries(CatalogKey("k".into()), "t", [bad]).unwrap_err();
        assert!(err.to_string().contains("empty risk statement"));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = MitigationCatalog::from_entries(CatalogKey("k".into()), "t", Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("no categories"));
    }

    #[test]
    fn coverage_gaps_report_missing_outputs() {
        let catalog = sample();
        let gaps = catalog.coverage_gaps([3, 0, 1, 2, 3].map(HazardCategory));
        assert_eq!(gaps, vec![HazardCategory(2), HazardCategory(3)]);
        assert!(catalog.coverage_gaps([HazardCategory(0)]).is_empty());
    }

    #[test]
    fn load_validates_against_schema() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            &json!({
                "schema_version": CATALOG_SCHEMA_VERSION,
                "catalog": {"key": "tmp_v1", "title": "tmp"},
                "categories": [
                    {"id": 0, "label": "PROCESS", "mitigation": {"title": "Process failure"}}
                ]
            }),
        );
        let catalog = MitigationCatalog::load(&path).unwrap();
        assert_eq!(catalog.key().0, "tmp_v1");
        assert_eq!(catalog.lookup(HazardCategory(0)).title, "Process failure");

        let bad_path = write_catalog(
            &dir,
            &json!({
                "schema_version": CATALOG_SCHEMA_VERSION,
                "catalog": {"key": "tmp_v1", "title": "tmp"},
                "categories": [{"id": -4, "mitigation": {"title": "x"}}]
            }),
        );
        let err = MitigationCatalog::load(&bad_path).unwrap_err();
        assert!(format!("{err:#}").contains("failed schema validation"));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let file: CatalogFile = serde_json::from_value(json!({
            "schema_version": "hazard_catalog_v0",
            "catalog": {"key": "k", "title": "t"},
            "categories": [{"id": 0, "mitigation": {"title": "x"}}]
        }))
        .unwrap();
        let err = MitigationCatalog::from_file(file).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
