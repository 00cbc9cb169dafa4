//! Mitigation catalog wiring.
//!
//! This module wraps the JSON catalog under `config/mitigations.json` so
//! helpers can load a validated snapshot and expose consistent identifiers.
//! Types in `model` mirror the schema fields; callers use
//! `MitigationCatalog` for total lookups.

pub mod identity;
pub mod index;
pub mod model;

pub use identity::{CatalogKey, HazardCategory};
pub use index::{CATALOG_SCHEMA_VERSION, MitigationCatalog};
pub use model::{
    CatalogFile, CatalogMetadata, CategoryEntry, MitigationRecord, UNDEFINED_MITIGATION_TITLE,
    load_catalog_from_path,
};
